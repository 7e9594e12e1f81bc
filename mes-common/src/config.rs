//! Configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `MES_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/mes/metrics.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Individual connection and enrichment settings can then be overridden by
//! environment variables, which win over anything read from TOML.

use crate::{Error, Origin, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "MES_CONFIG";
/// Env var for the default connection URL
pub const DATABASE_URL_ENV: &str = "MES_DATABASE_URL";
/// Env var for the MES label service base URL
pub const API_BASE_ENV: &str = "MES_API_BASE";
/// Env var for the MES label service token
pub const API_TOKEN_ENV: &str = "MES_API_TOKEN";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote failure-reason label service settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentConfig {
    pub mes_api_base: Option<String>,
    pub mes_api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl EnrichmentConfig {
    /// Request timeout, defaulting to 30 seconds
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Metrics service configuration as read from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Default connection, used when no origin is given or an origin is unconfigured
    pub database_url: Option<String>,
    /// Per-origin connection URLs keyed by origin key ("suzhou", "mianyang")
    #[serde(default)]
    pub origins: HashMap<String, String>,
    /// Pool size for every connection
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl MetricsConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve config file, load it (or defaults), then apply env overrides.
    ///
    /// A missing config file is not an error; defaults are used with a warning.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found; using defaults and environment",
                    path.display()
                );
                Self::default()
            }
            None => {
                warn!("No config file location available; using defaults and environment");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables override TOML values
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(DATABASE_URL_ENV) {
            self.database_url = Some(url);
        }
        for origin in Origin::ALL {
            if let Some(url) = non_empty_env(&origin_url_env(origin)) {
                self.origins.insert(origin.key().to_string(), url);
            }
        }
        if let Some(base) = non_empty_env(API_BASE_ENV) {
            self.enrichment.mes_api_base = Some(base);
        }
        if let Some(token) = non_empty_env(API_TOKEN_ENV) {
            self.enrichment.mes_api_token = Some(token);
        }
    }

    /// Default connection URL; mandatory
    pub fn default_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "No default database configured (set database_url or {})",
                    DATABASE_URL_ENV
                ))
            })
    }

    /// Connection URL for an origin, if configured
    pub fn origin_url(&self, origin: Origin) -> Option<&str> {
        self.origins
            .get(origin.key())
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    /// Pool size for every connection
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS).max(1)
    }
}

/// Env var carrying the connection URL for an origin
pub fn origin_url_env(origin: Origin) -> String {
    format!("{}_{}", DATABASE_URL_ENV, origin.key().to_uppercase())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Config file path by priority: CLI → env → platform config dir
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| d.join("mes").join("metrics.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = MetricsConfig::from_toml_str(
            r#"
            database_url = "sqlite:///var/lib/mes/default.db"
            max_connections = 8

            [origins]
            suzhou = "sqlite:///var/lib/mes/sz.db"

            [enrichment]
            mes_api_base = "http://mes.local"
            mes_api_token = "secret"
            request_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.default_database_url().unwrap(),
            "sqlite:///var/lib/mes/default.db"
        );
        assert_eq!(config.origin_url(Origin::Suzhou), Some("sqlite:///var/lib/mes/sz.db"));
        assert_eq!(config.origin_url(Origin::Mianyang), None);
        assert_eq!(config.max_connections(), 8);
        assert_eq!(config.enrichment.mes_api_base.as_deref(), Some("http://mes.local"));
        assert_eq!(config.enrichment.request_timeout().as_secs(), 5);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MetricsConfig::from_toml_str("").unwrap();
        assert!(matches!(config.default_database_url(), Err(Error::Config(_))));
        assert_eq!(config.max_connections(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(
            config.enrichment.request_timeout().as_secs(),
            DEFAULT_REQUEST_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_blank_origin_url_counts_as_unconfigured() {
        let config = MetricsConfig::from_toml_str("[origins]\nmianyang = \"  \"\n").unwrap();
        assert_eq!(config.origin_url(Origin::Mianyang), None);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            MetricsConfig::from_toml_str("database_url = ["),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_origin_env_names() {
        assert_eq!(origin_url_env(Origin::Suzhou), "MES_DATABASE_URL_SUZHOU");
        assert_eq!(origin_url_env(Origin::Mianyang), "MES_DATABASE_URL_MIANYANG");
    }
}
