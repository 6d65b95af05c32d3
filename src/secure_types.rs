//! Secure Types Module
//!
//! Bind credentials whose password is zeroed from memory when dropped and
//! never appears in `Debug` or `Display` output.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret string that automatically zeros its contents when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Temporarily exposes the secret. Use immediately; do not store.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

/// Simple-bind credentials for the directory.
///
/// An empty username means an anonymous bind.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: SecureString,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password: SecureString::new(password),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Temporarily exposes the password for a bind.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("Credentials(anonymous)")
        } else {
            write!(f, "Credentials(username: {}, password: [REDACTED])", self.username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_accessors() {
        let creds = Credentials::new("CORP\\svc-audit".to_string(), "s3cret".to_string());
        assert_eq!(creds.username(), "CORP\\svc-audit");
        assert_eq!(creds.password(), "s3cret");
        assert!(!creds.is_anonymous());
        assert!(Credentials::anonymous().is_anonymous());
    }

    #[test]
    fn test_credentials_never_print_password() {
        let creds = Credentials::new("admin".to_string(), "password123".to_string());
        let debug_output = format!("{:?}", creds);
        let display_output = format!("{}", creds);
        for output in [debug_output, display_output] {
            assert!(output.contains("admin"));
            assert!(output.contains("[REDACTED]"));
            assert!(!output.contains("password123"));
        }
    }

    #[test]
    fn test_secure_string_debug() {
        let secret = SecureString::new("hunter2".to_string());
        assert_eq!(format!("{:?}", secret), "SecureString([REDACTED])");
        assert!(!secret.is_empty());
    }
}
