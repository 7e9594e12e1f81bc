//! MES attribute-label client
//!
//! Auto-adjust stations report failures as comma-separated `attrNo-value`
//! parts. The MES service resolves each attribute number to a display label.

use mes_common::config::EnrichmentConfig;
use mes_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const LABEL_PATH: &str = "/api/mes/v1/stepAttrKeys/label";
const USER_AGENT: &str = concat!("mes-metrics/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct LabelResponse {
    data: Option<String>,
}

/// Client for the MES step-attribute label service
#[derive(Debug, Clone)]
pub struct MesLabelClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MesLabelClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Enrichment(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client from config; `None` when no base URL is configured
    pub fn from_config(config: &EnrichmentConfig) -> Result<Option<Self>> {
        match config.mes_api_base.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => Ok(Some(Self::new(
                base,
                config.mes_api_token.clone(),
                config.request_timeout(),
            )?)),
            _ => Ok(None),
        }
    }

    /// Label for one attribute number of a step; `None` if the service has none
    pub async fn attr_label(&self, step_type: &str, attr_no: &str) -> Result<Option<String>> {
        let url = format!("{}{}", self.base_url, LABEL_PATH);
        tracing::debug!(step = %step_type, attr_no = %attr_no, "Querying MES attribute label");

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("stepTypeNo", step_type), ("attrNo", attr_no)]);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Label request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Enrichment(format!(
                "Label service returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let label: LabelResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("Invalid label response: {}", e)))?;

        Ok(label.data.filter(|l| !l.trim().is_empty()))
    }
}

/// Attribute numbers in a raw reason: `"12-3, 7-1,,"` → `["12", "7"]`
pub fn attr_numbers(raw_reason: &str) -> Vec<&str> {
    raw_reason
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.split('-').next())
        .map(str::trim)
        .filter(|attr| !attr.is_empty())
        .collect()
}

/// Request-scoped label memo
#[derive(Debug)]
pub struct LabelCache {
    client: MesLabelClient,
    step_type: String,
    labels: HashMap<String, Option<String>>,
}

impl LabelCache {
    pub fn new(client: MesLabelClient, step_type: &str) -> Self {
        Self {
            client,
            step_type: step_type.to_string(),
            labels: HashMap::new(),
        }
    }

    /// Labels of every attribute in a raw reason, joined with `;`
    pub async fn resolve(&mut self, raw_reason: &str) -> Result<String> {
        let mut resolved = Vec::new();
        for attr in attr_numbers(raw_reason) {
            if !self.labels.contains_key(attr) {
                let label = self.client.attr_label(&self.step_type, attr).await?;
                self.labels.insert(attr.to_string(), label);
            }
            if let Some(Some(label)) = self.labels.get(attr) {
                resolved.push(label.clone());
            }
        }
        Ok(resolved.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_label(server: &MockServer, attr_no: &str, data: serde_json::Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path(LABEL_PATH))
            .and(query_param("stepTypeNo", "002"))
            .and(query_param("attrNo", attr_no))
            .and(header("authorization", "mes-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data })))
            .expect(hits)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> MesLabelClient {
        MesLabelClient::new(&server.uri(), Some("mes-token".into()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_attr_numbers() {
        assert_eq!(attr_numbers("12-3, 7-1"), vec!["12", "7"]);
        assert_eq!(attr_numbers(" 5 ,,-2, 9"), vec!["5", "9"]);
        assert!(attr_numbers("").is_empty());
        assert!(attr_numbers(" , ").is_empty());
    }

    #[test]
    fn test_client_requires_base_url() {
        let config = EnrichmentConfig::default();
        assert!(MesLabelClient::from_config(&config).unwrap().is_none());

        let config = EnrichmentConfig {
            mes_api_base: Some("  ".into()),
            ..Default::default()
        };
        assert!(MesLabelClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = EnrichmentConfig {
            mes_api_base: Some("http://mes.local/".into()),
            ..Default::default()
        };
        let client = MesLabelClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.base_url, "http://mes.local");
    }

    #[tokio::test]
    async fn test_blank_reason_needs_no_requests() {
        // Unroutable base URL: any request would fail
        let client = MesLabelClient::new("http://127.0.0.1:9", None, Duration::from_millis(50)).unwrap();
        let mut cache = LabelCache::new(client, "002");
        assert_eq!(cache.resolve(" , ").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_labels_joined_in_reason_order() {
        let server = MockServer::start().await;
        mount_label(&server, "12", serde_json::json!("labelA"), 1).await;
        mount_label(&server, "7", serde_json::json!("labelB"), 1).await;

        let mut cache = LabelCache::new(client_for(&server), "002");
        assert_eq!(cache.resolve("12-3, 7-1").await.unwrap(), "labelA;labelB");
    }

    #[tokio::test]
    async fn test_repeated_attribute_is_fetched_once() {
        let server = MockServer::start().await;
        mount_label(&server, "12", serde_json::json!("labelA"), 1).await;

        let mut cache = LabelCache::new(client_for(&server), "002");
        assert_eq!(cache.resolve("12-3").await.unwrap(), "labelA");
        assert_eq!(cache.resolve("12-9, 12-1").await.unwrap(), "labelA;labelA");
        // expect(1) is verified when the server drops
    }

    #[tokio::test]
    async fn test_missing_label_is_skipped() {
        let server = MockServer::start().await;
        mount_label(&server, "12", serde_json::Value::Null, 1).await;
        mount_label(&server, "7", serde_json::json!("labelB"), 1).await;

        let mut cache = LabelCache::new(client_for(&server), "002");
        assert_eq!(cache.resolve("12-3, 7-1").await.unwrap(), "labelB");
    }

    #[tokio::test]
    async fn test_server_error_is_enrichment_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LABEL_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client_for(&server).attr_label("002", "12").await.unwrap_err();
        match err {
            Error::Enrichment(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("down"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
