//! Defect Pareto and raw error-code breakdowns

use crate::model::AttemptRow;
use serde::Serialize;
use std::collections::HashMap;

/// Reasons sorted by descending count with a running percentage.
///
/// `categories[i]` and `counts[i]` correspond; `cumulative[i]` is the share of
/// all counted failures up to and including entry `i`, rounded to one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParetoChart {
    pub categories: Vec<String>,
    pub counts: Vec<u64>,
    pub cumulative: Vec<f64>,
}

impl ParetoChart {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Failures that contributed a reason
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Pareto over failing rows, using each row's (already normalized) failure reason.
///
/// Successful rows and rows whose reason is blank do not contribute.
pub fn build_pareto(rows: &[AttemptRow]) -> ParetoChart {
    chart_from_reasons(
        rows.iter()
            .filter(|row| !row.is_success())
            .map(|row| row.failure_reason.as_deref().unwrap_or_default()),
    )
}

/// Tally reasons; blank reasons are skipped rather than bucketed
pub fn chart_from_reasons<'a>(reasons: impl IntoIterator<Item = &'a str>) -> ParetoChart {
    let mut entries = tally(reasons.into_iter().map(str::trim).filter(|r| !r.is_empty()));
    // Stable: ties keep first-seen order
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let total: u64 = entries.iter().map(|(_, count)| count).sum();
    let mut running = 0u64;
    let mut chart = ParetoChart::default();
    for (reason, count) in entries {
        running += count;
        chart.categories.push(reason);
        chart.counts.push(count);
        chart.cumulative.push(round1(100.0 * running as f64 / total as f64));
    }
    chart
}

/// Counts per distinct key in first-seen order
fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, u64)> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut entries: Vec<(String, u64)> = Vec::new();
    for key in keys {
        match index.get(key) {
            Some(&i) => entries[i].1 += 1,
            None => {
                index.insert(key, entries.len());
                entries.push((key.to_string(), 1));
            }
        }
    }
    entries
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One raw result code and its share of all rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorCodeStat {
    /// Code as text; `"null"` when absent
    pub error_code: String,
    pub count: u64,
    /// `"12.5%"`
    pub percent: String,
}

/// Row-level breakdown of raw result codes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorCodeStats {
    pub total: u64,
    pub stats: Vec<ErrorCodeStat>,
}

/// Tally raw result codes over all rows, successes included
pub fn error_code_stats(rows: &[AttemptRow]) -> ErrorCodeStats {
    let codes: Vec<String> = rows
        .iter()
        .map(|row| {
            row.result_code
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "null".to_string())
        })
        .collect();

    let mut entries = tally(codes.iter().map(String::as_str));
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let total = rows.len() as u64;
    let stats = entries
        .into_iter()
        .map(|(error_code, count)| ErrorCodeStat {
            error_code,
            count,
            percent: if total == 0 {
                "0%".to_string()
            } else {
                format!("{:.1}%", 100.0 * count as f64 / total as f64)
            },
        })
        .collect();

    ErrorCodeStats { total, stats }
}
