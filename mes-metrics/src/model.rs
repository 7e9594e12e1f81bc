//! Raw production attempt records and the success rule
//!
//! Every yield, pass and Pareto figure is derived from [`is_success`]; it is the
//! only place the success convention is encoded.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Raw success/failure indicator as stored by the station software
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultCode {
    /// Integer storage class. Every integer width, including aggregate
    /// big-integer columns, decodes to `i64`.
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ResultCode {
    /// Identity fragment for deduplication. Integer `0` and text `"0"` stay distinct.
    fn key_fragment(&self) -> String {
        match self {
            ResultCode::Integer(v) => v.to_string(),
            ResultCode::Real(v) => format!("{:?}", v),
            ResultCode::Text(s) => format!("{:?}", s),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Integer(v) => write!(f, "{}", v),
            ResultCode::Real(v) => write!(f, "{}", v),
            ResultCode::Text(s) => f.write_str(s),
        }
    }
}

/// Success iff the code is absent, numerically zero, or exactly the string `"0"`.
///
/// `"00"`, `" 0"` and the empty string are failures: strings compare by equality,
/// never numerically.
pub fn is_success(code: Option<&ResultCode>) -> bool {
    match code {
        None => true,
        Some(ResultCode::Integer(v)) => *v == 0,
        Some(ResultCode::Real(v)) => *v == 0.0,
        Some(ResultCode::Text(s)) => s == "0",
    }
}

/// One production event for one unit at one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRow {
    pub product_serial: String,
    pub result_code: Option<ResultCode>,
    pub failure_reason: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub station_number: Option<i64>,
    /// Work order of the identity record the row was correlated through
    pub work_order: Option<String>,
}

impl AttemptRow {
    pub fn is_success(&self) -> bool {
        is_success(self.result_code.as_ref())
    }

    /// Composite identity of the physical event
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            product_serial: self.product_serial.clone(),
            start_time: serialize_time(self.start_time),
            end_time: serialize_time(self.end_time),
            result_code: self
                .result_code
                .as_ref()
                .map(ResultCode::key_fragment)
                .unwrap_or_else(|| "null".to_string()),
        }
    }

    /// Start time, else end time
    pub fn sortable_time(&self) -> Option<NaiveDateTime> {
        self.start_time.or(self.end_time)
    }

    /// Seconds from start to end; `None` unless both are present and end >= start
    pub fn duration_seconds(&self) -> Option<f64> {
        let (start, end) = (self.start_time?, self.end_time?);
        let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
    }
}

/// Rows with equal keys are one event observed through two correlation paths
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub product_serial: String,
    pub start_time: String,
    pub end_time: String,
    pub result_code: String,
}

fn serialize_time(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "null".to_string())
}
