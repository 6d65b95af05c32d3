//! Error handling module
//!
//! Structured error types for last-logon resolution. Per-server failures are
//! recoverable and reported; enumeration and connection failures abort the run.

use thiserror::Error;

/// Main error type for directory operations
#[derive(Error, Debug)]
pub enum LastLogonError {
    /// The account could not be found by the existence check
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Querying one domain controller failed
    #[error("Query against server {server} failed: {reason}")]
    ServerQueryFailed { server: String, reason: String },

    /// Domain controllers could not be enumerated
    #[error("Failed to enumerate domain controllers: {0}")]
    EnumerationFailed(String),

    /// LDAP connection error
    #[error("LDAP connection failed: {0}")]
    ConnectionError(String),

    /// LDAP query/search error
    #[error("LDAP query failed: {0}")]
    QueryError(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Input validation error
    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Parse error
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LastLogonError {
    /// Attach a server name to an error raised while talking to that server.
    pub fn on_server(self, server: &str) -> Self {
        match self {
            LastLogonError::ServerQueryFailed { .. } => self,
            other => LastLogonError::ServerQueryFailed {
                server: server.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<ldap3::LdapError> for LastLogonError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => match result.rc {
                // 49 = Invalid credentials
                49 => LastLogonError::AuthError(format!("Invalid credentials: {}", result.text)),
                // 32 = No such object
                32 => LastLogonError::AccountNotFound(format!("Object not found: {}", result.text)),
                // 50 = Insufficient access rights
                50 => LastLogonError::PermissionDenied(format!(
                    "Insufficient access rights: {}",
                    result.text
                )),
                // 51 = Busy
                51 => LastLogonError::Timeout(format!("Server is busy: {}", result.text)),
                // 52 = Unavailable
                52 => LastLogonError::ConnectionError(format!(
                    "Server unavailable: {}",
                    result.text
                )),
                // 53 = Unwilling to perform
                53 => LastLogonError::PermissionDenied(format!(
                    "Server unwilling to perform operation: {}",
                    result.text
                )),
                _ => LastLogonError::QueryError(format!(
                    "LDAP error code {}: {}",
                    result.rc, result.text
                )),
            },
            ldap3::LdapError::EndOfStream => {
                LastLogonError::ConnectionError("Connection closed unexpectedly".to_string())
            }
            ldap3::LdapError::Io { source } => {
                LastLogonError::ConnectionError(format!("I/O error: {}", source))
            }
            ldap3::LdapError::Timeout { elapsed: _ } => {
                LastLogonError::Timeout("LDAP operation timed out".to_string())
            }
            _ => LastLogonError::QueryError(format!("LDAP error: {}", err)),
        }
    }
}

impl From<std::io::Error> for LastLogonError {
    fn from(err: std::io::Error) -> Self {
        LastLogonError::ConnectionError(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for LastLogonError {
    fn from(err: serde_json::Error) -> Self {
        LastLogonError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for LastLogonError {
    fn from(err: tokio::task::JoinError) -> Self {
        LastLogonError::QueryError(format!("Task join error: {}", err))
    }
}

/// Result type alias for last-logon operations
pub type Result<T> = std::result::Result<T, LastLogonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LastLogonError::AccountNotFound("alice".to_string());
        assert_eq!(err.to_string(), "Account not found: alice");

        let err = LastLogonError::ServerQueryFailed {
            server: "dc1.corp.local".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "Query against server dc1.corp.local failed: refused");

        let err = LastLogonError::EnumerationFailed("no rootDSE".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to enumerate domain controllers: no rootDSE"
        );
    }

    #[test]
    fn test_on_server_wraps_once() {
        let err = LastLogonError::ConnectionError("refused".to_string()).on_server("DC1");
        match &err {
            LastLogonError::ServerQueryFailed { server, reason } => {
                assert_eq!(server, "DC1");
                assert!(reason.contains("refused"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        let rewrapped = err.on_server("DC2");
        assert!(matches!(
            rewrapped,
            LastLogonError::ServerQueryFailed { ref server, .. } if server == "DC1"
        ));
    }

    #[tokio::test]
    async fn test_ldap_timeout_maps_to_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::ZERO,
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        let err: LastLogonError = ldap3::LdapError::Timeout { elapsed }.into();
        assert!(matches!(err, LastLogonError::Timeout(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: LastLogonError = io_err.into();
        assert!(matches!(err, LastLogonError::ConnectionError(_)));
    }
}
