//! Correlation row fetcher
//!
//! One call reads one step table through one identity path. Callers query both
//! paths and hand the results to [`crate::merge::merge`].

use super::{push_range_bounds, CorrelationPath, ORDER_TABLE};
use crate::model::{AttemptRow, ResultCode};
use crate::registry::StepDescriptor;
use mes_common::time::{from_unix_seconds, parse_timestamp, DateRange};
use mes_common::Result;
use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

/// Row filters for one fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptFilter<'a> {
    /// Material code of the product
    pub product: Option<&'a str>,
    /// Exact work order; when present the material join is skipped
    pub work_order: Option<&'a str>,
    /// Station numbers; empty means every station
    pub stations: &'a [i64],
    pub range: Option<&'a DateRange>,
}

/// Read raw attempt rows of one step table via one correlation path
pub async fn fetch_attempts(
    pool: &SqlitePool,
    descriptor: &StepDescriptor,
    path: CorrelationPath,
    filter: &AttemptFilter<'_>,
) -> Result<Vec<AttemptRow>> {
    let mut query = build_query(descriptor, path, filter);
    let rows = query.build().fetch_all(pool).await?;

    let attempts = rows
        .iter()
        .map(decode_attempt)
        .collect::<Result<Vec<_>>>()?;

    debug!(
        table = descriptor.table,
        step_type_no = descriptor.step_type_no.unwrap_or("-"),
        path = path.name(),
        rows = attempts.len(),
        "Fetched attempt rows"
    );

    Ok(attempts)
}

fn build_query<'a>(
    descriptor: &StepDescriptor,
    path: CorrelationPath,
    filter: &AttemptFilter<'a>,
) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(format!(
        "SELECT s.{serial} AS product_sn, \
                {result} AS result_code, \
                {reason} AS failure_reason, \
                {start} AS start_time, \
                {end} AS end_time, \
                {station} AS station_num, \
                i.work_order_code AS work_order_code \
         FROM {table} s \
         INNER JOIN {identity} i ON i.{identity_serial} = s.{serial}",
        serial = descriptor.serial_column,
        result = descriptor.result_expr,
        reason = descriptor.reason_expr,
        start = descriptor.start_expr,
        end = descriptor.end_expr,
        station = descriptor.station_expr,
        table = descriptor.table,
        identity = path.identity_table(),
        identity_serial = path.identity_serial_column(),
    ));

    match filter.work_order {
        Some(work_order) => {
            query.push(" WHERE i.work_order_code = ");
            query.push_bind(work_order);
        }
        None => {
            query.push(format!(
                " INNER JOIN {order} o ON o.work_order_code = i.work_order_code WHERE 1 = 1",
                order = ORDER_TABLE
            ));
            if let Some(product) = filter.product {
                query.push(" AND o.material_code = ");
                query.push_bind(product);
            }
        }
    }

    if let Some(step_type_no) = descriptor.step_type_no {
        query.push(" AND s.step_type_no = ");
        query.push_bind(step_type_no);
    }

    if !filter.stations.is_empty() {
        // Steps without station data match no station
        query.push(format!(" AND {} IN (", descriptor.station_expr));
        let mut separated = query.separated(", ");
        for station in filter.stations {
            separated.push_bind(*station);
        }
        separated.push_unseparated(")");
    }

    if let Some(range) = filter.range {
        push_range_bounds(&mut query, &format!("s.{}", descriptor.time_column), range);
    }

    query
}

/// SQLite storage class of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Null,
    Integer,
    Real,
    Text,
}

fn storage(row: &SqliteRow, column: &str) -> Result<Storage> {
    let raw = row.try_get_raw(column)?;
    if raw.is_null() {
        return Ok(Storage::Null);
    }
    let storage = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => Storage::Integer,
        "REAL" => Storage::Real,
        _ => Storage::Text,
    };
    Ok(storage)
}

fn decode_attempt(row: &SqliteRow) -> Result<AttemptRow> {
    Ok(AttemptRow {
        product_serial: decode_text(row, "product_sn")?
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        result_code: decode_result_code(row, "result_code")?,
        failure_reason: decode_text(row, "failure_reason")?,
        start_time: decode_timestamp(row, "start_time")?,
        end_time: decode_timestamp(row, "end_time")?,
        station_number: decode_integer(row, "station_num")?,
        work_order: decode_text(row, "work_order_code")?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

fn decode_result_code(row: &SqliteRow, column: &str) -> Result<Option<ResultCode>> {
    let code = match storage(row, column)? {
        Storage::Null => None,
        Storage::Integer => Some(ResultCode::Integer(row.try_get::<i64, _>(column)?)),
        Storage::Real => Some(ResultCode::Real(row.try_get::<f64, _>(column)?)),
        Storage::Text => Some(ResultCode::Text(row.try_get::<String, _>(column)?)),
    };
    Ok(code)
}

fn decode_text(row: &SqliteRow, column: &str) -> Result<Option<String>> {
    let text = match storage(row, column)? {
        Storage::Null => None,
        Storage::Integer => Some(row.try_get::<i64, _>(column)?.to_string()),
        Storage::Real => Some(row.try_get::<f64, _>(column)?.to_string()),
        Storage::Text => Some(row.try_get::<String, _>(column)?),
    };
    Ok(text)
}

fn decode_integer(row: &SqliteRow, column: &str) -> Result<Option<i64>> {
    let value = match storage(row, column)? {
        Storage::Null => None,
        Storage::Integer => Some(row.try_get::<i64, _>(column)?),
        Storage::Real => Some(row.try_get::<f64, _>(column)? as i64),
        Storage::Text => row.try_get::<String, _>(column)?.trim().parse().ok(),
    };
    Ok(value)
}

/// Unparseable timestamps decode as absent
fn decode_timestamp(row: &SqliteRow, column: &str) -> Result<Option<NaiveDateTime>> {
    let value = match storage(row, column)? {
        Storage::Null => None,
        Storage::Integer => from_unix_seconds(row.try_get::<i64, _>(column)?),
        Storage::Real => from_unix_seconds(row.try_get::<f64, _>(column)? as i64),
        Storage::Text => parse_timestamp(&row.try_get::<String, _>(column)?),
    };
    Ok(value)
}
