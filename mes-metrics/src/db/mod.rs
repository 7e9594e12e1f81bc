//! Read-only database access for the metrics engine
//!
//! Step tables only store a unit's own serial number. Work order and material
//! code live in one of two identity tables, so every read goes through a
//! [`CorrelationPath`].

mod fetch;
mod products;

use mes_common::time::DateRange;
use sqlx::{QueryBuilder, Sqlite};

pub use fetch::{fetch_attempts, AttemptFilter};
pub use products::{product_options, ProductOption};

/// Identity table linking a serial number to its work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationPath {
    /// `mo_beam_info.beam_sn`
    ViaBeamIdentity,
    /// `mo_tag_info.tag_sn`
    ViaTagIdentity,
}

impl CorrelationPath {
    /// Both paths, beam first (merge order)
    pub const ALL: [CorrelationPath; 2] = [
        CorrelationPath::ViaBeamIdentity,
        CorrelationPath::ViaTagIdentity,
    ];

    pub fn identity_table(self) -> &'static str {
        match self {
            CorrelationPath::ViaBeamIdentity => "mo_beam_info",
            CorrelationPath::ViaTagIdentity => "mo_tag_info",
        }
    }

    pub fn identity_serial_column(self) -> &'static str {
        match self {
            CorrelationPath::ViaBeamIdentity => "beam_sn",
            CorrelationPath::ViaTagIdentity => "tag_sn",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CorrelationPath::ViaBeamIdentity => "beam",
            CorrelationPath::ViaTagIdentity => "tag",
        }
    }
}

/// Work-order/material join target
pub(crate) const ORDER_TABLE: &str = "mo_produce_order";

/// Append inclusive range bounds on a time column.
///
/// Both sides are compared as canonical `YYYY-MM-DD HH:MM:SS` text: stored
/// values may be `T`-separated text or INTEGER unix seconds, and a bound that
/// SQLite cannot parse is compared as given.
pub(crate) fn push_range_bounds<'a>(
    query: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    range: &'a DateRange,
) {
    let canonical = canonical_time(column);
    for (op, bound) in [(">=", range.start.as_deref()), ("<=", range.end.as_deref())] {
        if let Some(bound) = bound {
            query.push(format!(" AND {} {} COALESCE(datetime(", canonical, op));
            query.push_bind(bound);
            query.push("), ");
            query.push_bind(bound);
            query.push(")");
        }
    }
}

fn canonical_time(column: &str) -> String {
    format!(
        "(CASE WHEN typeof({c}) IN ('integer', 'real') THEN datetime({c}, 'unixepoch') \
         ELSE datetime({c}) END)",
        c = column
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds_normalize_column_and_bound() {
        let range = DateRange::normalized(Some("2025-01-01"), Some("2025-01-31"));
        let mut query = QueryBuilder::<Sqlite>::new("SELECT 1 FROM t s WHERE 1 = 1");
        push_range_bounds(&mut query, "s.add_time", &range);

        let sql = query.sql();
        assert!(sql.contains("typeof(s.add_time) IN ('integer', 'real')"));
        assert!(sql.contains("datetime(s.add_time, 'unixepoch')"));
        assert!(sql.contains(">= COALESCE(datetime(?), ?)"));
        assert!(sql.contains("<= COALESCE(datetime(?), ?)"));
    }

    #[test]
    fn test_open_range_adds_nothing() {
        let range = DateRange::unbounded();
        let mut query = QueryBuilder::<Sqlite>::new("SELECT 1");
        push_range_bounds(&mut query, "s.add_time", &range);
        assert_eq!(query.sql(), "SELECT 1");
    }
}
