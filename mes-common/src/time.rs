//! Date-range normalization and timestamp parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive, optionally open-ended query window.
///
/// Bounds are kept as the strings that get compared against the timestamp
/// columns, after [`DateRange::normalized`] expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    /// Build a range from raw user input.
    ///
    /// A bare `YYYY-MM-DD` start expands to `00:00:00` of that day, a bare end to
    /// `23:59:59`. Any other non-blank form passes through trimmed; blank or
    /// absent values leave that side unbounded.
    pub fn normalized(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: start.and_then(|s| normalize_bound(s, "00:00:00")),
            end: end.and_then(|s| normalize_bound(s, "23:59:59")),
        }
    }

    /// Range with no bound on either side
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.as_deref().unwrap_or("*"),
            self.end.as_deref().unwrap_or("*")
        )
    }
}

fn normalize_bound(value: &str, time_of_day: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_bare_date(trimmed) {
        return Some(format!("{} {}", trimmed, time_of_day));
    }
    Some(trimmed.to_string())
}

/// Exactly `DDDD-DD-DD`
fn is_bare_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a stored timestamp; `None` for anything unrecognised
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.naive_utc());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Unix seconds to a naive UTC timestamp
pub fn from_unix_seconds(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|ts| ts.naive_utc())
}
