//! LDAP Helper Utilities
//!
//! Extension trait for pulling typed values out of `SearchEntry` results.

use chrono::{DateTime, Utc};
use ldap3::SearchEntry;

use crate::filetime::{parse_generalized_time, RawLogonValue};

/// Extension trait for SearchEntry to simplify attribute extraction
pub trait SearchEntryExt {
    /// Get an optional string attribute (returns None if missing or blank)
    fn get_optional_attr(&self, name: &str) -> Option<String>;

    /// Get a FILETIME attribute; a missing attribute reads as the "never" sentinel
    fn get_filetime_attr(&self, name: &str) -> RawLogonValue;

    /// Get a generalized-time attribute such as `whenCreated`
    fn get_generalized_time_attr(&self, name: &str) -> Option<DateTime<Utc>>;

    /// Get the distinguished name, falling back to the `distinguishedName` attribute
    fn get_dn(&self) -> String;
}

impl SearchEntryExt for SearchEntry {
    fn get_optional_attr(&self, name: &str) -> Option<String> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn get_filetime_attr(&self, name: &str) -> RawLogonValue {
        RawLogonValue::from_attr(self.attrs.get(name).and_then(|v| v.first()).map(String::as_str))
    }

    fn get_generalized_time_attr(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .and_then(|v| parse_generalized_time(v))
    }

    fn get_dn(&self) -> String {
        if !self.dn.is_empty() {
            return self.dn.clone();
        }
        self.get_optional_attr("distinguishedName").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(dn: &str, attrs: &[(&str, &str)]) -> SearchEntry {
        let attrs: HashMap<String, Vec<String>> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect();
        SearchEntry {
            dn: dn.to_string(),
            attrs,
            bin_attrs: HashMap::new(),
        }
    }

    #[test]
    fn test_optional_attr() {
        let e = entry("CN=Alice", &[("displayName", "Alice"), ("description", "  ")]);
        assert_eq!(e.get_optional_attr("displayName").as_deref(), Some("Alice"));
        assert_eq!(e.get_optional_attr("description"), None);
        assert_eq!(e.get_optional_attr("mail"), None);
    }

    #[test]
    fn test_filetime_attr() {
        let e = entry("CN=Alice", &[("lastLogon", "133497504000000000")]);
        assert_eq!(e.get_filetime_attr("lastLogon"), RawLogonValue(133_497_504_000_000_000));
        assert!(e.get_filetime_attr("lastLogonTimestamp").is_never());
    }

    #[test]
    fn test_generalized_time_attr() {
        let e = entry("CN=Alice", &[("whenCreated", "20200101000000.0Z")]);
        let created = e.get_generalized_time_attr("whenCreated").unwrap();
        assert_eq!(created.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_dn_fallback() {
        let e = entry("", &[("distinguishedName", "CN=Bob,DC=corp")]);
        assert_eq!(e.get_dn(), "CN=Bob,DC=corp");
        let e = entry("CN=Alice,DC=corp", &[]);
        assert_eq!(e.get_dn(), "CN=Alice,DC=corp");
    }
}
