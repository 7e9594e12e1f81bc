//! Per-unit outcomes from deduplicated attempt rows

use crate::model::AttemptRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one unit within a query scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutcome {
    /// Chronological; rows without any timestamp sort first
    pub attempts: Vec<AttemptRow>,
    pub first_pass: bool,
    pub final_pass: bool,
    pub any_pass: bool,
    /// One entry per successful attempt with a valid start/end pair
    pub passing_durations_seconds: Vec<f64>,
}

impl UnitOutcome {
    /// `attempts` must be non-empty
    fn from_attempts(mut attempts: Vec<AttemptRow>) -> Self {
        // Missing timestamps count as time zero
        attempts.sort_by_key(|row| {
            row.sortable_time()
                .map(|ts| ts.and_utc().timestamp_millis())
                .unwrap_or(0)
        });

        let first_pass = attempts.first().is_some_and(AttemptRow::is_success);
        let final_pass = attempts.last().is_some_and(AttemptRow::is_success);
        let any_pass = attempts.iter().any(AttemptRow::is_success);
        let passing_durations_seconds = attempts
            .iter()
            .filter(|row| row.is_success())
            .filter_map(AttemptRow::duration_seconds)
            .collect();

        Self {
            attempts,
            first_pass,
            final_pass,
            any_pass,
            passing_durations_seconds,
        }
    }
}

/// Group rows by serial number and classify each unit.
///
/// Rows whose serial is empty after trimming cannot be attributed and are dropped.
pub fn aggregate(rows: Vec<AttemptRow>) -> BTreeMap<String, UnitOutcome> {
    let mut groups: BTreeMap<String, Vec<AttemptRow>> = BTreeMap::new();
    for row in rows {
        let serial = row.product_serial.trim();
        if serial.is_empty() {
            continue;
        }
        groups.entry(serial.to_string()).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(serial, attempts)| (serial, UnitOutcome::from_attempts(attempts)))
        .collect()
}
