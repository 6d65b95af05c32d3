//! Windows FILETIME and generalized-time conversion
//!
//! `lastLogon` is stored per domain controller as a FILETIME: the number of
//! 100-nanosecond intervals since 1601-01-01 UTC. A value of `0` means the
//! controller has never authenticated the account.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

/// 100-ns intervals between 1601-01-01 and 1970-01-01
pub const WINDOWS_EPOCH_DIFF: i64 = 116_444_736_000_000_000;

/// FILETIME ticks per second
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Sentinel meaning "no logon recorded on this server"
pub const NEVER_LOGGED_ON: i64 = 0;

/// Raw `lastLogon` value as reported by one domain controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawLogonValue(pub i64);

impl RawLogonValue {
    /// Parse the attribute text; a missing attribute is the sentinel.
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => match v.parse::<i64>() {
                Ok(ticks) => RawLogonValue(ticks),
                Err(_) => {
                    debug!("Unparseable lastLogon value {:?}, treating as never", v);
                    RawLogonValue(NEVER_LOGGED_ON)
                }
            },
            _ => RawLogonValue(NEVER_LOGGED_ON),
        }
    }

    /// True for the sentinel (and for any value at or before the 1601 epoch).
    pub fn is_never(&self) -> bool {
        self.0 <= NEVER_LOGGED_ON
    }

    /// Convert to a UTC timestamp, or `None` for the sentinel.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_never() {
            return None;
        }
        filetime_to_datetime(self.0)
    }
}

impl From<DateTime<Utc>> for RawLogonValue {
    fn from(dt: DateTime<Utc>) -> Self {
        RawLogonValue(datetime_to_filetime(dt))
    }
}

/// Convert a FILETIME to a UTC timestamp with 100-ns precision.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 {
        return None;
    }
    let unix_100ns = filetime.checked_sub(WINDOWS_EPOCH_DIFF)?;
    let secs = unix_100ns.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix_100ns.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Convert a UTC timestamp back to a FILETIME (sub-tick precision is dropped).
pub fn datetime_to_filetime(dt: DateTime<Utc>) -> i64 {
    dt.timestamp() * TICKS_PER_SECOND
        + i64::from(dt.timestamp_subsec_nanos() / 100)
        + WINDOWS_EPOCH_DIFF
}

/// Parse an LDAP generalized time such as `20230115103000.0Z`.
pub fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.len() < 14 || !value.is_char_boundary(14) {
        return None;
    }
    NaiveDateTime::parse_from_str(&value[..14], "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}
