//! Base JSON-over-HTTP client for the payload and broadcast services.
//!
//! Every endpoint is a `POST` of a JSON body. Supports bearer auth,
//! configurable timeout, and retry with exponential backoff.

use crate::error::RpcError;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Configuration for a gateway client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Base URL (e.g., `https://api.example.com`).
    pub url: String,
    /// Request timeout.
    #[serde(with = "tessera_types::duration_ms")]
    pub timeout: Duration,
    /// Number of retry attempts on transient failure.
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    #[serde(with = "tessera_types::duration_ms")]
    pub retry_delay: Duration,
    /// Optional bearer token.
    pub api_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_millis(500),
            api_token: None,
        }
    }
}

/// Async HTTP client for the gateway's JSON endpoints.
pub struct GatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a client for the given URL with default settings.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_config(GatewayConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Create a client with full configuration.
    pub fn with_config(mut config: GatewayConfig) -> Result<Self, RpcError> {
        config.url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the configured base URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.config.api_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Delay before retry `attempt` (1-based).
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// POST JSON to an endpoint and return the unwrapped response data.
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);

        let attempts = self.config.retries + 1;
        let mut last_err = RpcError::NoResult {
            endpoint: endpoint.to_string(),
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }

            match self.do_post(&url, body, endpoint).await {
                Ok(val) => return Ok(val),
                Err(e) => {
                    let should_retry = e.is_transient() && attempt + 1 < attempts;
                    if !should_retry {
                        return Err(e);
                    }
                    warn!("{} attempt {} failed, retrying: {}", endpoint, attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn do_post(&self, url: &str, body: &Value, endpoint: &str) -> Result<Value, RpcError> {
        debug!("POST {}", url);
        let resp = self
            .client
            .post(url)
            .headers(self.build_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Http {
                endpoint: endpoint.to_string(),
                url: url.to_string(),
                source: e,
            })?;

        let status = resp.status().as_u16();

        if status == 401 || status == 403 {
            return Err(RpcError::AuthFailed {
                url: url.to_string(),
            });
        }

        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::HttpStatus {
                endpoint: endpoint.to_string(),
                url: url.to_string(),
                status,
                body: body.chars().take(500).collect(),
            });
        }

        let val: Value = resp.json().await.map_err(|e| RpcError::Http {
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            source: e,
        })?;

        unwrap_envelope(endpoint, val)
    }
}

/// Strip the `{code, msg, data}` envelope some deployments wrap responses
/// in. Bodies without one are returned as-is.
pub fn unwrap_envelope(endpoint: &str, body: Value) -> Result<Value, RpcError> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };
    if !(map.contains_key("code") && map.contains_key("data")) {
        return Ok(Value::Object(map));
    }

    let code = map.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 && code != 200 {
        let message = map
            .get("msg")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(RpcError::Service {
            endpoint: endpoint.to_string(),
            code,
            message,
        });
    }

    match map.remove("data") {
        Some(Value::Null) | None => Err(RpcError::NoResult {
            endpoint: endpoint.to_string(),
        }),
        Some(data) => Ok(data),
    }
}
