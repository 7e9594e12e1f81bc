//! Failure reason normalization
//!
//! Raw failure codes become human-readable reasons through a source chosen by
//! step type and origin (see [`ReasonSource`]). Lookup tables are loaded once
//! per request; remote labels are memoised per request.

mod lookup;
pub mod mes_client;

use crate::model::AttemptRow;
use crate::registry::ReasonSource;
use mes_client::{LabelCache, MesLabelClient};
use mes_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;

/// Builds per-request normalizers
#[derive(Debug, Clone, Default)]
pub struct ReasonEnricher {
    labels: Option<MesLabelClient>,
}

impl ReasonEnricher {
    pub fn new(labels: Option<MesLabelClient>) -> Self {
        Self { labels }
    }

    /// Prepare a normalizer for one request, loading lookup tables from `pool`
    pub async fn normalizer(
        &self,
        pool: &SqlitePool,
        step_type: &str,
        source: &ReasonSource,
    ) -> Result<ReasonNormalizer> {
        let normalizer = match source {
            ReasonSource::Raw => ReasonNormalizer::Raw,
            ReasonSource::ProcedureCodes {
                procedure,
                strip_leading,
                station,
            } => ReasonNormalizer::ProcedureCodes {
                messages: lookup::procedure_messages(pool, procedure).await?,
                strip_leading: *strip_leading,
                station: *station,
            },
            ReasonSource::FinalCheckCodes => ReasonNormalizer::FinalCheckCodes {
                messages: lookup::final_check_messages(pool).await?,
            },
            ReasonSource::RemoteAttrLabels => match &self.labels {
                Some(client) => {
                    ReasonNormalizer::RemoteAttrLabels(LabelCache::new(client.clone(), step_type))
                }
                None => {
                    warn!(
                        step = %step_type,
                        "MES label service not configured; using raw failure reasons"
                    );
                    ReasonNormalizer::Raw
                }
            },
        };
        Ok(normalizer)
    }
}

/// Request-scoped reason normalizer
#[derive(Debug)]
pub enum ReasonNormalizer {
    Raw,
    ProcedureCodes {
        messages: HashMap<String, String>,
        strip_leading: bool,
        station: Option<i64>,
    },
    FinalCheckCodes {
        messages: HashMap<String, String>,
    },
    RemoteAttrLabels(LabelCache),
}

impl ReasonNormalizer {
    /// Normalized reason for a row; empty when none applies
    pub async fn normalize(&mut self, row: &AttemptRow) -> Result<String> {
        let raw = row.failure_reason.as_deref().map(str::trim).unwrap_or_default();

        let reason = match self {
            ReasonNormalizer::Raw => raw.to_string(),
            ReasonNormalizer::ProcedureCodes {
                messages,
                strip_leading,
                station,
            } => {
                let station_matches = station.map_or(true, |s| row.station_number == Some(s));
                match (&row.result_code, station_matches) {
                    (Some(code), true) => {
                        let code = code.to_string();
                        let key = if *strip_leading {
                            strip_first_char(&code)
                        } else {
                            code.as_str()
                        };
                        messages.get(key).cloned().unwrap_or_else(|| key.to_string())
                    }
                    _ => raw.to_string(),
                }
            }
            ReasonNormalizer::FinalCheckCodes { messages } => {
                messages.get(raw).cloned().unwrap_or_default()
            }
            ReasonNormalizer::RemoteAttrLabels(cache) => cache.resolve(raw).await?,
        };

        Ok(reason)
    }
}

/// Calibration codes carry a one-character station prefix
fn strip_first_char(code: &str) -> &str {
    let mut chars = code.chars();
    match (chars.next(), chars.as_str()) {
        (Some(_), rest) if !rest.is_empty() => rest,
        _ => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::row;
    use crate::model::ResultCode;

    fn failing(code: i64, reason: Option<&str>, station: Option<i64>) -> AttemptRow {
        AttemptRow {
            failure_reason: reason.map(str::to_string),
            station_number: station,
            ..row("A", Some(ResultCode::Integer(code)))
        }
    }

    fn messages(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_strip_first_char() {
        assert_eq!(strip_first_char("3105"), "105");
        assert_eq!(strip_first_char("7"), "7");
        assert_eq!(strip_first_char(""), "");
    }

    #[tokio::test]
    async fn test_raw_trims() {
        let mut normalizer = ReasonNormalizer::Raw;
        let reason = normalizer.normalize(&failing(1, Some("  glue  "), None)).await.unwrap();
        assert_eq!(reason, "glue");
        let reason = normalizer.normalize(&failing(1, None, None)).await.unwrap();
        assert_eq!(reason, "");
    }

    #[tokio::test]
    async fn test_calibration_codes_strip_prefix_and_fall_back_to_code() {
        let mut normalizer = ReasonNormalizer::ProcedureCodes {
            messages: messages(&[("105", "reprojection error")]),
            strip_leading: true,
            station: None,
        };
        let mapped = normalizer.normalize(&failing(3105, None, None)).await.unwrap();
        assert_eq!(mapped, "reprojection error");
        let unmapped = normalizer.normalize(&failing(3999, None, None)).await.unwrap();
        assert_eq!(unmapped, "999");
    }

    #[tokio::test]
    async fn test_station_gate_keeps_raw_reason_elsewhere() {
        let mut normalizer = ReasonNormalizer::ProcedureCodes {
            messages: messages(&[("12", "tilt out of range")]),
            strip_leading: false,
            station: Some(7),
        };
        let gated = normalizer.normalize(&failing(12, Some("raw text"), Some(7))).await.unwrap();
        assert_eq!(gated, "tilt out of range");
        let other = normalizer.normalize(&failing(12, Some("raw text"), Some(3))).await.unwrap();
        assert_eq!(other, "raw text");
    }

    #[tokio::test]
    async fn test_final_check_unmapped_is_empty() {
        let mut normalizer = ReasonNormalizer::FinalCheckCodes {
            messages: messages(&[("4", "scratch")]),
        };
        assert_eq!(normalizer.normalize(&failing(1, Some("4"), None)).await.unwrap(), "scratch");
        assert_eq!(normalizer.normalize(&failing(1, Some("5"), None)).await.unwrap(), "");
        assert_eq!(normalizer.normalize(&failing(1, None, None)).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_remote_without_client_degrades_to_raw() {
        let pool = mes_common::db::connect("sqlite::memory:", 1).await.unwrap();
        let enricher = ReasonEnricher::default();
        let normalizer = enricher
            .normalizer(&pool, "002", &ReasonSource::RemoteAttrLabels)
            .await
            .unwrap();
        assert!(matches!(normalizer, ReasonNormalizer::Raw));
    }
}
