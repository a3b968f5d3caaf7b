//! Timestamp conversion for API responses.
//!
//! SQLite stores `datetime('now')` values as `YYYY-MM-DD HH:MM:SS` in UTC.

use chrono::{NaiveDateTime, TimeZone, Utc};

const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert a database timestamp to RFC 3339. Unparsable input is returned
/// unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    match NaiveDateTime::parse_from_str(datetime_str, SQLITE_FORMAT) {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        Err(_) => datetime_str.to_string(),
    }
}

/// `to_rfc3339` for nullable columns.
pub fn to_rfc3339_opt(datetime_str: Option<&str>) -> Option<String> {
    datetime_str.map(to_rfc3339)
}

/// SQLite timestamp `days` from now, for expiry columns.
pub fn sqlite_after_days(days: u64) -> String {
    (Utc::now() + chrono::Duration::days(days as i64))
        .format(SQLITE_FORMAT)
        .to_string()
}
