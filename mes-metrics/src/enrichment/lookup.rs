//! Code → message tables kept next to the production data

use mes_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Messages for one calibration/AA procedure from `error_descriptions`
pub async fn procedure_messages(pool: &SqlitePool, procedure: &str) -> Result<HashMap<String, String>> {
    let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT CAST(code AS TEXT), message FROM error_descriptions WHERE procedure_ = ?",
    )
    .bind(procedure)
    .fetch_all(pool)
    .await?;

    Ok(into_map(rows))
}

/// Final-check messages from `mo_error_desc`
pub async fn final_check_messages(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT CAST(error_code AS TEXT), description FROM mo_error_desc WHERE stage = 'FQC'",
    )
    .fetch_all(pool)
    .await?;

    Ok(into_map(rows))
}

fn into_map(rows: Vec<(Option<String>, Option<String>)>) -> HashMap<String, String> {
    rows.into_iter()
        .filter_map(|(code, message)| Some((code?, message?)))
        .collect()
}
