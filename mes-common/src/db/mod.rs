//! Database connections
//!
//! All production-metrics reads go through the [`OriginRouter`], which owns one
//! pool per configured origin plus the default pool.

mod router;

pub use router::OriginRouter;

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Open a connection pool for a database URL
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}
