//! Timestamp parsing for the forwarder attribution window.
//!
//! Chat exports render timestamps in several locale-dependent ways. Only the
//! incremental resolver needs real instants; the batch resolver keeps timestamps
//! as opaque strings.

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};

/// Date-time renderings tried in order
const DATE_TIME_FORMATS: &[&str] = &[
    "%H:%M, %d/%m/%Y",
    "%H:%M:%S, %d/%m/%Y",
    "%d/%m/%Y, %H:%M",
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%H:%M, %d/%m/%y",
    "%d/%m/%y, %H:%M",
];

/// Time-only renderings; these yield milliseconds since midnight
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// Parse a chat timestamp into epoch milliseconds
///
/// Returns `None` when no known rendering matches. A bare time of day is
/// interpreted as milliseconds since midnight so that stamps within one export
/// still compare correctly.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    let upper = raw.to_uppercase();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, format) {
            return Some(i64::from(time.num_seconds_from_midnight()) * 1000);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_renderings() {
        let a = parse_timestamp_ms("09:15, 18/10/2026").unwrap();
        let b = parse_timestamp_ms("18/10/2026, 09:20").unwrap();
        assert_eq!(b - a, 5 * 60 * 1000);
    }

    #[test]
    fn test_iso_and_rfc3339() {
        let a = parse_timestamp_ms("2026-10-18 09:15:00").unwrap();
        let b = parse_timestamp_ms("2026-10-18T09:15:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(parse_timestamp_ms("00:01"), Some(60_000));
        assert_eq!(parse_timestamp_ms("1:00 pm"), Some(13 * 3600 * 1000));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_timestamp_ms(""), None);
        assert_eq!(parse_timestamp_ms("yesterday"), None);
    }
}
