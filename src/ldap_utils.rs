//! LDAP Utilities
//!
//! RFC 4515 filter escaping plus the helpers used to build account and
//! domain controller searches.

use crate::models::{AccountIdentifier, IdentifierKind};

/// userAccountControl bit set on domain controller computer accounts
pub const SERVER_TRUST_ACCOUNT: u32 = 0x2000;

/// Bitwise-AND matching rule (LDAP_MATCHING_RULE_BIT_AND)
pub const MATCHING_RULE_BIT_AND: &str = "1.2.840.113556.1.4.803";

/// Escapes a string for safe use in an LDAP search filter (RFC 4515).
///
/// The following characters are escaped:
/// - `*` (asterisk) -> `\2a`
/// - `(` (left parenthesis) -> `\28`
/// - `)` (right parenthesis) -> `\29`
/// - `\` (backslash) -> `\5c`
/// - `\0` (NUL) -> `\00`
pub fn escape_ldap_filter(input: &str) -> String {
    input.chars().fold(String::new(), |mut acc, c| {
        match c {
            '*' => acc.push_str("\\2a"),
            '(' => acc.push_str("\\28"),
            ')' => acc.push_str("\\29"),
            '\\' => acc.push_str("\\5c"),
            '\0' => acc.push_str("\\00"),
            _ => acc.push(c),
        }
        acc
    })
}

/// Convert a DNS domain name to an LDAP base DN
/// e.g., "corp.example.com" -> "DC=corp,DC=example,DC=com"
pub fn domain_to_base_dn(domain: &str) -> String {
    domain
        .trim_matches('.')
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| format!("DC={}", part))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter matching a single user account by sAMAccountName or UPN.
///
/// Distinguished names are looked up with a base search instead and get a
/// plain object-class filter.
pub fn account_filter(identifier: &AccountIdentifier) -> String {
    let escaped = escape_ldap_filter(identifier.as_str());
    match identifier.kind() {
        IdentifierKind::DistinguishedName => "(objectClass=user)".to_string(),
        IdentifierKind::UserPrincipalName => format!(
            "(&(objectCategory=person)(objectClass=user)(userPrincipalName={}))",
            escaped
        ),
        IdentifierKind::SamAccountName => format!(
            "(&(objectCategory=person)(objectClass=user)(sAMAccountName={}))",
            escaped
        ),
    }
}

/// Filter matching every domain controller computer object.
pub fn domain_controller_filter() -> String {
    format!(
        "(&(objectCategory=computer)(userAccountControl:{}:={}))",
        MATCHING_RULE_BIT_AND, SERVER_TRUST_ACCOUNT
    )
}

/// Build an `ldap://` or `ldaps://` URL for a host, keeping an explicit port.
pub fn ldap_url(server: &str, use_ldaps: bool) -> String {
    let host = server
        .trim_start_matches("ldaps://")
        .trim_start_matches("ldap://")
        .trim_end_matches('/');
    if use_ldaps {
        format!("ldaps://{}", host)
    } else {
        format!("ldap://{}", host)
    }
}
