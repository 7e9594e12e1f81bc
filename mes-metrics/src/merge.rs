//! Union of both correlation paths with stable deduplication

use crate::model::AttemptRow;
use std::collections::HashSet;

/// Concatenate `beam` then `tag` rows, keeping the first row seen for each [`DedupKey`].
///
/// Relative order of kept rows is preserved.
///
/// [`DedupKey`]: crate::model::DedupKey
pub fn merge(beam: Vec<AttemptRow>, tag: Vec<AttemptRow>) -> Vec<AttemptRow> {
    let mut seen = HashSet::with_capacity(beam.len() + tag.len());
    beam.into_iter()
        .chain(tag)
        .filter(|row| seen.insert(row.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::model::ResultCode;

    #[test]
    fn test_same_event_on_both_paths_collapses() {
        let event = timed("X1", 4, 0, 30);
        let merged = merge(vec![event.clone()], vec![event]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_first_occurrence_wins_and_order_is_stable() {
        let mut a = timed("A", 1, 0, 10);
        a.failure_reason = Some("from beam".into());
        let b = timed("B", 0, 5, 10);
        let mut a_again = a.clone();
        a_again.failure_reason = Some("from tag".into());
        let c = timed("C", 0, 1, 2);

        let merged = merge(vec![a, b], vec![c, a_again]);
        let serials: Vec<_> = merged.iter().map(|r| r.product_serial.as_str()).collect();
        assert_eq!(serials, vec!["A", "B", "C"]);
        assert_eq!(merged[0].failure_reason.as_deref(), Some("from beam"));
    }

    #[test]
    fn test_distinct_attempts_survive() {
        let first = timed("A", 2, 0, 10);
        let retry = timed("A", 2, 20, 30);
        let other_code = row("A", Some(ResultCode::Text("2".into())));
        let merged = merge(vec![first, retry], vec![other_code]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = vec![
            timed("A", 1, 0, 10),
            timed("A", 1, 0, 10),
            timed("B", 0, 0, 10),
            row("C", None),
        ];
        let once = merge(rows.clone(), Vec::new());
        let twice = merge(rows.clone(), rows);
        assert_eq!(once, twice);
        assert_eq!(merge(once.clone(), once.clone()), once);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge(Vec::new(), Vec::new()).is_empty());
    }
}
