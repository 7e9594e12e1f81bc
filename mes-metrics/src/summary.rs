//! Yield and throughput summary over unit outcomes

use crate::aggregate::{aggregate, UnitOutcome};
use crate::model::AttemptRow;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Marker shown to users when a ratio or count has no meaningful value
pub const UNAVAILABLE: &str = "-";

/// A count or ratio that may be unavailable.
///
/// Serializes as the bare number, or as [`UNAVAILABLE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Value(T),
    Unavailable,
}

impl<T: Copy> Reading<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => v.serialize(serializer),
            Reading::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Aggregate metrics for one query scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Attempt rows across all units
    pub total_rows: Reading<u64>,
    pub distinct_units: Reading<u64>,
    pub final_pass_units: Reading<u64>,
    pub first_pass_yield: Reading<f64>,
    pub final_pass_yield: Reading<f64>,
    /// Units that eventually passed, over total attempt rows
    pub overall_yield: Reading<f64>,
    /// Zero when no passing durations exist
    pub mean_duration_seconds: f64,
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
}

/// Reduce unit outcomes to yields and duration statistics
pub fn summarize(outcomes: &BTreeMap<String, UnitOutcome>) -> MetricsSummary {
    let distinct_units = outcomes.len() as u64;
    let total_rows: u64 = outcomes.values().map(|u| u.attempts.len() as u64).sum();
    let first_pass_units = outcomes.values().filter(|u| u.first_pass).count() as u64;
    let final_pass_units = outcomes.values().filter(|u| u.final_pass).count() as u64;
    let any_pass_units = outcomes.values().filter(|u| u.any_pass).count() as u64;

    let durations: Vec<f64> = outcomes
        .values()
        .flat_map(|u| u.passing_durations_seconds.iter().copied())
        .filter(|d| d.is_finite())
        .collect();
    let (mean, min, max) = duration_stats(&durations);

    MetricsSummary {
        total_rows: count(total_rows),
        distinct_units: count(distinct_units),
        final_pass_units: count(final_pass_units),
        first_pass_yield: rate(first_pass_units, distinct_units),
        final_pass_yield: rate(final_pass_units, distinct_units),
        // Denominator is attempt volume, not units
        overall_yield: rate(any_pass_units, total_rows),
        mean_duration_seconds: mean,
        min_duration_seconds: min,
        max_duration_seconds: max,
    }
}

/// Metrics of one work order within a scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderMetrics {
    pub work_order: String,
    #[serde(flatten)]
    pub summary: MetricsSummary,
}

/// Metrics of one station within a scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMetrics {
    pub station: i64,
    #[serde(flatten)]
    pub summary: MetricsSummary,
}

/// Split merged rows by `key` and run each group through aggregate + summarize.
///
/// Rows without a key belong to no group.
pub fn summarize_groups<K: Ord>(
    rows: Vec<AttemptRow>,
    key: impl Fn(&AttemptRow) -> Option<K>,
) -> BTreeMap<K, MetricsSummary> {
    let mut groups: BTreeMap<K, Vec<AttemptRow>> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(&row) {
            groups.entry(k).or_default().push(row);
        }
    }

    groups
        .into_iter()
        .map(|(k, rows)| (k, summarize(&aggregate(rows))))
        .collect()
}

fn count(n: u64) -> Reading<u64> {
    if n > 0 {
        Reading::Value(n)
    } else {
        Reading::Unavailable
    }
}

/// Clamped to [0, 1]; non-finite → 0; unavailable unless both sides are positive
fn rate(numerator: u64, denominator: u64) -> Reading<f64> {
    if numerator == 0 || denominator == 0 {
        return Reading::Unavailable;
    }
    let ratio = numerator as f64 / denominator as f64;
    if !ratio.is_finite() {
        return Reading::Value(0.0);
    }
    Reading::Value(ratio.clamp(0.0, 1.0))
}

fn duration_stats(durations: &[f64]) -> (f64, f64, f64) {
    if durations.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let sum: f64 = durations.iter().sum();
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (sum / durations.len() as f64, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;

    #[test]
    fn test_empty_scope_is_unavailable_with_zero_durations() {
        let summary = summarize(&BTreeMap::new());
        assert!(summary.total_rows.is_unavailable());
        assert!(summary.distinct_units.is_unavailable());
        assert!(summary.final_pass_units.is_unavailable());
        assert!(summary.first_pass_yield.is_unavailable());
        assert!(summary.final_pass_yield.is_unavailable());
        assert!(summary.overall_yield.is_unavailable());
        assert_eq!(summary.mean_duration_seconds, 0.0);
        assert_eq!(summary.min_duration_seconds, 0.0);
        assert_eq!(summary.max_duration_seconds, 0.0);
    }

    #[test]
    fn test_yields_and_overall_uses_row_denominator() {
        // A: fail then pass (2 rows); B: pass (1 row); C: fail (1 row)
        let units = aggregate(vec![
            timed("A", 1, 0, 10),
            timed("A", 0, 20, 50),
            timed("B", 0, 0, 10),
            timed("C", 4, 0, 10),
        ]);
        let summary = summarize(&units);

        assert_eq!(summary.total_rows, Reading::Value(4));
        assert_eq!(summary.distinct_units, Reading::Value(3));
        assert_eq!(summary.final_pass_units, Reading::Value(2));
        assert_eq!(summary.first_pass_yield, Reading::Value(1.0 / 3.0));
        assert_eq!(summary.final_pass_yield, Reading::Value(2.0 / 3.0));
        assert_eq!(summary.overall_yield, Reading::Value(2.0 / 4.0));
        assert_eq!(summary.mean_duration_seconds, 20.0);
        assert_eq!(summary.min_duration_seconds, 10.0);
        assert_eq!(summary.max_duration_seconds, 30.0);
    }

    #[test]
    fn test_zero_numerator_is_unavailable() {
        let units = aggregate(vec![timed("A", 1, 0, 10), timed("B", 2, 0, 10)]);
        let summary = summarize(&units);
        assert_eq!(summary.distinct_units, Reading::Value(2));
        assert!(summary.first_pass_yield.is_unavailable());
        assert!(summary.final_pass_units.is_unavailable());
        assert!(summary.overall_yield.is_unavailable());
    }

    #[test]
    fn test_yields_stay_in_unit_interval() {
        let units = aggregate(vec![
            timed("A", 0, 0, 1),
            timed("B", 0, 0, 1),
            timed("C", 0, 0, 1),
        ]);
        let summary = summarize(&units);
        for reading in [
            summary.first_pass_yield,
            summary.final_pass_yield,
            summary.overall_yield,
        ] {
            let v = reading.value().unwrap();
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_rate_guards() {
        assert_eq!(rate(0, 5), Reading::Unavailable);
        assert_eq!(rate(5, 0), Reading::Unavailable);
        assert_eq!(rate(7, 5), Reading::Value(1.0));
    }

    #[test]
    fn test_reading_serialization() {
        let json = serde_json::to_string(&(Reading::Value(0.5), Reading::<f64>::Unavailable)).unwrap();
        assert_eq!(json, r#"[0.5,"-"]"#);
    }

    #[test]
    fn test_groups_summarize_independently() {
        let mut rows = vec![
            timed("A", 1, 0, 10),
            timed("A", 0, 20, 30),
            timed("B", 0, 0, 10),
            timed("C", 2, 0, 10),
        ];
        rows[0].station_number = Some(1);
        rows[1].station_number = Some(2);
        rows[2].station_number = Some(2);

        let by_station = summarize_groups(rows, |row| row.station_number);
        assert_eq!(by_station.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        // Station 1 only saw A's failed attempt
        assert!(by_station[&1].final_pass_units.is_unavailable());
        assert_eq!(by_station[&1].total_rows, Reading::Value(1));
        // Station 2 saw A's retry and B, both passing first time there
        assert_eq!(by_station[&2].distinct_units, Reading::Value(2));
        assert_eq!(by_station[&2].first_pass_yield, Reading::Value(1.0));
    }

    #[test]
    fn test_group_metrics_flatten_summary() {
        let summary = summarize(&aggregate(vec![timed("A", 0, 0, 10)]));
        let json = serde_json::to_value(WorkOrderMetrics {
            work_order: "WO-1".into(),
            summary,
        })
        .unwrap();
        assert_eq!(json["work_order"], "WO-1");
        assert_eq!(json["total_rows"], 1);
        assert_eq!(json["first_pass_yield"], 1.0);
    }
}
