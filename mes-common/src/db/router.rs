//! Origin-keyed connection registry
//!
//! Built once at process start. An unconfigured origin is an operational gap,
//! not a correctness failure: resolution logs a warning and hands back the
//! default connection.

use super::connect;
use crate::config::MetricsConfig;
use crate::{Origin, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{info, warn};

/// Long-lived connection pools, one per origin plus the default
#[derive(Debug, Clone)]
pub struct OriginRouter {
    default: SqlitePool,
    origins: HashMap<Origin, SqlitePool>,
}

impl OriginRouter {
    /// Assemble a router from already-open pools
    pub fn new(default: SqlitePool, origins: HashMap<Origin, SqlitePool>) -> Self {
        Self { default, origins }
    }

    /// Open the default pool and every configured origin pool
    pub async fn connect(config: &MetricsConfig) -> Result<Self> {
        let max_connections = config.max_connections();
        let default = connect(config.default_database_url()?, max_connections).await?;
        info!("Connected default database");

        let mut origins = HashMap::new();
        for origin in Origin::ALL {
            match config.origin_url(origin) {
                Some(url) => {
                    let pool = connect(url, max_connections).await?;
                    info!(origin = %origin, site = origin.label(), "Connected origin database");
                    origins.insert(origin, pool);
                }
                None => {
                    warn!(
                        origin = %origin,
                        site = origin.label(),
                        "Database URL for origin is not configured; using default connection"
                    );
                }
            }
        }

        Ok(Self { default, origins })
    }

    /// Connection for an origin; default when absent or unconfigured
    pub fn resolve(&self, origin: Option<Origin>) -> &SqlitePool {
        let Some(origin) = origin else {
            return &self.default;
        };

        match self.origins.get(&origin) {
            Some(pool) => pool,
            None => {
                warn!(
                    origin = %origin,
                    "No connection configured for origin, falling back to default connection"
                );
                &self.default
            }
        }
    }

    /// Whether an origin has its own connection
    pub fn is_configured(&self, origin: Origin) -> bool {
        self.origins.contains_key(&origin)
    }

    /// Close every pool (shutdown)
    pub async fn close(&self) {
        for pool in self.origins.values() {
            pool.close().await;
        }
        self.default.close().await;
    }
}
