// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - HTTP Transport (native only)

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{EngineReply, Transport, TransportError};
use crate::types::Mode;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const ENDPOINT_ENV: &str = "PRICING_ENGINE_URL";

/// Where the engine lives. The base address is the only external setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl EngineConfig {
    /// Use `base_url` when given and non-blank, else the default address.
    pub fn with_base_url(base_url: Option<&str>) -> Self {
        match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Self {
                base_url: url.to_string(),
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    pub fn url_for(&self, operation: Mode) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), operation.path())
    }
}

/// POSTs JSON bodies to `<base_url>/simulate` and `<base_url>/optimize`.
pub struct HttpTransport {
    client: Client,
    config: EngineConfig,
}

impl HttpTransport {
    pub fn new(config: EngineConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    async fn post(&self, operation: Mode, body: Vec<u8>) -> Result<EngineReply, TransportError> {
        let url = self.config.url_for(operation);
        debug!(%url, bytes = body.len(), "posting request");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        debug!(status, bytes = body.len(), "reply received");
        Ok(EngineReply { status, body: body.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_resolution() {
        assert_eq!(EngineConfig::with_base_url(None).base_url, DEFAULT_BASE_URL);
        assert_eq!(EngineConfig::with_base_url(Some("  ")).base_url, DEFAULT_BASE_URL);
        let cfg = EngineConfig::with_base_url(Some("https://engine.internal/api/"));
        assert_eq!(cfg.url_for(Mode::Optimize), "https://engine.internal/api/optimize");
        assert_eq!(cfg.url_for(Mode::Simulate), "https://engine.internal/api/simulate");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"base_url": "http://10.0.0.5:9000"}"#).unwrap();
        assert_eq!(cfg.base_url, "http://10.0.0.5:9000");
        assert_eq!(cfg.timeout_secs, 120);
    }
}
