use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a timestamp the way it is stored: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 (any offset, converted to UTC), SQLite's
/// `datetime('now')` output (`YYYY-MM-DD HH:MM:SS`, taken as UTC), and bare
/// dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// True when `ts` lies no further than `window` before `now`.
/// Timestamps ahead of `now` (clock skew) count as inside every window.
pub fn within_window(now: DateTime<Utc>, ts: DateTime<Utc>, window: Duration) -> bool {
    now - ts <= window
}
