//! Time utility functions

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time as seconds since Unix epoch
pub fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Convert seconds since Unix epoch to an RFC 3339 UTC string (seconds precision)
pub fn unix_seconds_to_rfc3339(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_else(|| {
            tracing::warn!(secs, "Invalid timestamp, using epoch");
            DateTime::UNIX_EPOCH
        })
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp into whole seconds since Unix epoch.
///
/// Sub-second precision is truncated. Returns `None` for unparseable input.
pub fn rfc3339_to_unix_seconds(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc).timestamp())
        .ok()
}
