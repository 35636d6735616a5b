//! Time utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC time
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a datetime string in ISO 8601 format
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// End of a cooldown that started at `granted_at` and lasts `days`.
/// Zero or negative day counts mean no cooldown.
pub fn cooldown_until(granted_at: DateTime<Utc>, days: i32) -> Option<DateTime<Utc>> {
    if days > 0 {
        Some(granted_at + Duration::days(days as i64))
    } else {
        None
    }
}

/// Whether a cooldown that started at `granted_at` with `days` duration has
/// elapsed by `at`.
pub fn cooldown_elapsed(granted_at: DateTime<Utc>, days: i32, at: DateTime<Utc>) -> bool {
    match cooldown_until(granted_at, days) {
        Some(until) => until <= at,
        None => true,
    }
}
