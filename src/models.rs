//! Request-scoped data model: identifiers, per-server observations and the
//! reduced per-account result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{LastLogonError, Result};
use crate::filetime::RawLogonValue;

/// Marker rendered in place of a timestamp when no logon is confirmed
pub const UNKNOWN_LOGON: &str = "unknown";

/// Account identifier as supplied by the caller (sAMAccountName, UPN or DN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIdentifier(String);

impl AccountIdentifier {
    /// Trim the raw value and reject blank input.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LastLogonError::ValidationError(
                "account identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// How the identifier should be matched in the directory.
    pub fn kind(&self) -> IdentifierKind {
        let value = self.0.as_str();
        if value.contains('=') && value.contains(',') {
            IdentifierKind::DistinguishedName
        } else if value.contains('@') {
            IdentifierKind::UserPrincipalName
        } else {
            IdentifierKind::SamAccountName
        }
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    DistinguishedName,
    UserPrincipalName,
    SamAccountName,
}

/// An account that passed the existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLocator {
    pub identifier: AccountIdentifier,
    pub distinguished_name: String,
}

/// Attributes requested from each domain controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeSet {
    /// Also request `description` and `whenCreated`
    pub include_extended: bool,
}

impl AttributeSet {
    pub fn ldap_attributes(&self) -> Vec<&'static str> {
        let mut attrs = vec!["displayName", "sAMAccountName", "lastLogon"];
        if self.include_extended {
            attrs.extend(["description", "whenCreated"]);
        }
        attrs
    }
}

/// One domain controller's view of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerObservation {
    pub account: AccountIdentifier,
    pub server_name: String,
    pub display_name: Option<String>,
    pub sam_account_name: Option<String>,
    pub raw_last_logon: RawLogonValue,
    pub description: Option<String>,
    pub when_created: Option<DateTime<Utc>>,
}

impl ServerObservation {
    /// The observed logon time, `None` for the "never" sentinel.
    pub fn last_logon(&self) -> Option<DateTime<Utc>> {
        self.raw_last_logon.to_datetime()
    }
}

/// The resolved last logon for one input account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLastLogonResult {
    pub display_name: Option<String>,
    pub account_identifier: AccountIdentifier,
    pub sam_account_name: Option<String>,
    pub source_server_name: Option<String>,
    #[serde(with = "last_logon_format")]
    pub last_logon: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub when_created: Option<DateTime<Utc>>,
}

impl AccountLastLogonResult {
    /// A result with no observation to take descriptive fields from.
    pub fn unknown(account: AccountIdentifier) -> Self {
        Self {
            display_name: None,
            account_identifier: account,
            sam_account_name: None,
            source_server_name: None,
            last_logon: None,
            description: None,
            when_created: None,
        }
    }

    /// `lastLogon` as shown to users: RFC 3339 or `unknown`.
    pub fn last_logon_display(&self) -> String {
        match self.last_logon {
            Some(dt) => dt.to_rfc3339(),
            None => UNKNOWN_LOGON.to_string(),
        }
    }
}

/// A server that contributed nothing for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFailure {
    pub account_identifier: AccountIdentifier,
    pub server_name: String,
    pub reason: String,
}

/// An input identifier that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAccount {
    pub input: String,
    pub reason: String,
}

/// `Option<DateTime<Utc>>` as RFC 3339, with `None` written as `"unknown"`.
mod last_logon_format {
    use super::UNKNOWN_LOGON;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_str(UNKNOWN_LOGON),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some(UNKNOWN_LOGON) => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identifier_trims_and_rejects_blank() {
        assert_eq!(AccountIdentifier::parse("  alice \n").unwrap().as_str(), "alice");
        assert!(matches!(
            AccountIdentifier::parse("   "),
            Err(LastLogonError::ValidationError(_))
        ));
    }

    #[test]
    fn test_identifier_kind() {
        let id = AccountIdentifier::parse("CN=Alice,OU=Users,DC=corp,DC=local").unwrap();
        assert_eq!(id.kind(), IdentifierKind::DistinguishedName);
        let id = AccountIdentifier::parse("alice@corp.local").unwrap();
        assert_eq!(id.kind(), IdentifierKind::UserPrincipalName);
        let id = AccountIdentifier::parse("alice").unwrap();
        assert_eq!(id.kind(), IdentifierKind::SamAccountName);
    }

    #[test]
    fn test_attribute_set() {
        assert_eq!(
            AttributeSet::default().ldap_attributes(),
            vec!["displayName", "sAMAccountName", "lastLogon"]
        );
        let extended = AttributeSet { include_extended: true }.ldap_attributes();
        assert!(extended.contains(&"description"));
        assert!(extended.contains(&"whenCreated"));
    }

    #[test]
    fn test_unknown_last_logon_serializes_as_marker() {
        let result = AccountLastLogonResult::unknown(AccountIdentifier::parse("bob").unwrap());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["lastLogon"], "unknown");
        assert_eq!(json["accountIdentifier"], "bob");
        assert!(json.get("description").is_none());
        assert!(!json.to_string().contains("1601"));
    }

    #[test]
    fn test_known_last_logon_serializes_rfc3339() {
        let mut result = AccountLastLogonResult::unknown(AccountIdentifier::parse("alice").unwrap());
        result.last_logon = Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"lastLogon\":\"2024-03-01T08:00:00+00:00\""));

        let back: AccountLastLogonResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
