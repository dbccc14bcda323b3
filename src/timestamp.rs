//! Timestamp parsing helpers
//!
//! Records carry `updated_at` values in several shapes: RFC 3339 strings,
//! space-separated SQL-style strings with or without an offset, and bare epoch
//! numbers. Everything is normalised to UTC here.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DATETIME_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|z|[+-]\d{2}:?\d{2})?$")
        .expect("valid datetime regex")
});

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a datetime string into UTC
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Parse a JSON value (string or epoch seconds) into UTC
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Parse a JSON value into Unix seconds
pub fn to_epoch(value: &Value) -> Option<i64> {
    parse_timestamp(value).map(|dt| dt.timestamp())
}

/// Whether a string looks like a date-time (date plus clock time) and parses
pub fn looks_like_datetime(s: &str) -> bool {
    DATETIME_SHAPE.is_match(s.trim()) && parse_datetime(s).is_some()
}

/// Monday 00:00:00 UTC of the week containing `now`
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_monday = i64::from(now.weekday().num_days_from_monday());
    let monday = now.date_naive() - Duration::days(days_since_monday);
    Utc.from_utc_datetime(&monday.and_time(chrono::NaiveTime::MIN))
}

/// Render Unix seconds as an RFC 3339 string for log messages
pub fn format_epoch(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(|| secs.to_string(), |dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    const JAN_1_2024: i64 = 1_704_067_200;

    #[test_case("2024-01-01T00:00:00Z" ; "rfc3339 zulu")]
    #[test_case("2024-01-01T00:00:00+00:00" ; "rfc3339 offset")]
    #[test_case("2024-01-01T02:00:00+02:00" ; "rfc3339 non utc offset")]
    #[test_case("2024-01-01 00:00:00+00:00" ; "sql style offset")]
    #[test_case("2024-01-01 00:00:00" ; "naive space")]
    #[test_case("2024-01-01T00:00:00" ; "naive t")]
    #[test_case("2024-01-01T00:00:00.000Z" ; "fractional zulu")]
    #[test_case("2024-01-01" ; "date only")]
    fn test_parse_datetime_shapes(input: &str) {
        assert_eq!(parse_datetime(input).unwrap().timestamp(), JAN_1_2024);
    }

    #[test]
    fn test_parse_timestamp_values() {
        assert_eq!(to_epoch(&json!(JAN_1_2024)), Some(JAN_1_2024));
        assert_eq!(to_epoch(&json!("2024-01-01T00:00:00Z")), Some(JAN_1_2024));
        assert_eq!(to_epoch(&json!("not a date")), None);
        assert_eq!(to_epoch(&json!("")), None);
        assert_eq!(to_epoch(&Value::Null), None);
        assert_eq!(to_epoch(&json!(true)), None);
    }

    #[test]
    fn test_looks_like_datetime() {
        assert!(looks_like_datetime("2024-01-01T00:00:00Z"));
        assert!(looks_like_datetime("2024-03-05 10:11:12"));
        assert!(!looks_like_datetime("2024-01-01"));
        assert!(!looks_like_datetime("12345"));
        assert!(!looks_like_datetime("2024-13-45T00:00:00Z"));
    }

    #[test]
    fn test_start_of_week() {
        // Wednesday 2024-01-03 15:30 UTC -> Monday 2024-01-01 00:00 UTC
        let wed = Utc.with_ymd_and_hms(2024, 1, 3, 15, 30, 0).unwrap();
        assert_eq!(start_of_week(wed).timestamp(), JAN_1_2024);

        // Monday itself maps to its own midnight
        let mon = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        assert_eq!(start_of_week(mon).timestamp(), JAN_1_2024);

        // Sunday belongs to the week that started six days earlier
        let sun = Utc.with_ymd_and_hms(2024, 1, 7, 8, 0, 0).unwrap();
        assert_eq!(start_of_week(sun).timestamp(), JAN_1_2024);
    }
}
