//! Products observed in production within a date range

use super::{push_range_bounds, CorrelationPath, ORDER_TABLE};
use crate::registry::PRODUCTION_RESULT_TABLE;
use mes_common::time::DateRange;
use mes_common::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;

/// Selectable product for metric queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductOption {
    /// Material name followed by material code
    pub label: String,
    /// Material code, usable as a product filter
    pub code: String,
}

/// Distinct products reachable through either identity path from production
/// results inside the range, ordered by name then code
pub async fn product_options(pool: &SqlitePool, range: &DateRange) -> Result<Vec<ProductOption>> {
    let mut query = build_query(range);
    let rows = query
        .build_query_as::<(Option<String>, Option<String>)>()
        .fetch_all(pool)
        .await?;

    let mut seen = HashSet::new();
    let mut options = Vec::new();
    for (name, code) in rows {
        let name = name.as_deref().map(str::trim).unwrap_or_default();
        let code = code.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() || code.is_empty() {
            continue;
        }
        if seen.insert(code.to_string()) {
            options.push(ProductOption {
                label: format!("{}{}", name, code),
                code: code.to_string(),
            });
        }
    }

    Ok(options)
}

fn build_query(range: &DateRange) -> QueryBuilder<'_, Sqlite> {
    let mut query = QueryBuilder::new(format!(
        "WITH filtered_sn AS (SELECT DISTINCT product_sn FROM {} WHERE product_sn IS NOT NULL",
        PRODUCTION_RESULT_TABLE
    ));
    push_range_bounds(&mut query, "add_time", range);
    query.push("), work_orders AS (");

    let unions: Vec<String> = CorrelationPath::ALL
        .iter()
        .map(|path| {
            format!(
                "SELECT DISTINCT i.work_order_code FROM filtered_sn f \
                 JOIN {identity} i ON i.{serial} = f.product_sn \
                 WHERE i.work_order_code IS NOT NULL",
                identity = path.identity_table(),
                serial = path.identity_serial_column(),
            )
        })
        .collect();
    query.push(unions.join(" UNION "));

    query.push(format!(
        ") SELECT DISTINCT o.material_name, o.material_code \
         FROM work_orders w JOIN {order} o ON o.work_order_code = w.work_order_code \
         WHERE o.material_name IS NOT NULL AND o.material_code IS NOT NULL \
         ORDER BY o.material_name, o.material_code",
        order = ORDER_TABLE
    ));
    query
}
