//! Conversions between nanosecond integers, float seconds and `chrono` times.

use crate::prelude::{LmaError, LmaResult};
use chrono::{DateTime, TimeZone, Utc};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Integer encoding of a missing time (NaT).
pub const NAT: i64 = i64::MIN;

pub fn datetime_to_nanos(time: DateTime<Utc>) -> LmaResult<i64> {
    time.timestamp_nanos_opt().ok_or_else(|| {
        LmaError::InvalidInput(format!("{} is outside the nanosecond time range", time))
    })
}

pub fn nanos_to_datetime(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

pub fn seconds_to_nanos(seconds: f64) -> i64 {
    (seconds * NANOS_PER_SECOND as f64).round() as i64
}

pub fn nanos_to_seconds(nanos: i64) -> f64 {
    nanos as f64 / NANOS_PER_SECOND as f64
}

/// Parses RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC).
pub fn parse_datetime(text: &str) -> LmaResult<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(LmaError::InvalidInput(format!("unrecognised time '{}'", text)))
}
