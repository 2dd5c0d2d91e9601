//! Base REST client for Blockfrost-compatible endpoints.
//!
//! Provides `get()` / `get_optional()` for JSON resources and `post_cbor()`
//! for raw transaction bodies. Requests carry the `project_id` header when
//! one is configured and are retried with exponential backoff on transient
//! failure.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;

/// Name of the Blockfrost authentication header.
pub const PROJECT_ID_HEADER: &str = "project_id";

/// Configuration for an RPC client.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL including the API version, e.g.
    /// `https://cardano-preprod.blockfrost.io/api/v0`.
    pub url: String,
    /// Blockfrost project id. Self-hosted instances may not need one.
    pub project_id: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retry attempts on transient failure.
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/api/v0".to_string(),
            project_id: None,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RpcConfig {
    pub fn new(url: &str, project_id: Option<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            project_id,
            ..Default::default()
        }
    }
}

pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
}

impl RpcClient {
    pub fn new(url: &str, project_id: Option<String>) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig::new(url, project_id))
    }

    pub fn with_config(mut config: RpcConfig) -> Result<Self, RpcError> {
        config.url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.url, endpoint)
    }

    fn build_headers(&self, content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Some(id) = &self.config.project_id {
            match HeaderValue::from_str(id) {
                Ok(v) => {
                    headers.insert(PROJECT_ID_HEADER, v);
                }
                Err(_) => warn!("project id is not a valid header value, sending without it"),
            }
        }
        headers
    }

    /// Run `op` until it succeeds, fails permanently, or the retries run out.
    async fn with_retry<T, F, Fut>(&self, endpoint: &str, mut op: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let attempts = self.config.retries + 1;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(val) => return Ok(val),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    warn!("{} failed (attempt {}), retrying: {}", endpoint, attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_status(&self, resp: Response, endpoint: &str, url: &str) -> Result<Response, RpcError> {
        let status = resp.status().as_u16();
        match status {
            401 | 403 => Err(RpcError::AuthFailed { url: url.to_string() }),
            429 => Err(RpcError::RateLimited { url: url.to_string() }),
            s if s >= 400 => {
                let body = resp.text().await.unwrap_or_default();
                Err(RpcError::HttpStatus {
                    endpoint: endpoint.to_string(),
                    url: url.to_string(),
                    status,
                    body: body.chars().take(500).collect(),
                })
            }
            _ => Ok(resp),
        }
    }

    async fn do_get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RpcError> {
        let url = self.endpoint_url(endpoint);
        let http = |source| RpcError::Http {
            endpoint: endpoint.to_string(),
            url: url.clone(),
            source,
        };
        let resp = self
            .client
            .get(&url)
            .headers(self.build_headers("application/json"))
            .send()
            .await
            .map_err(http)?;
        let resp = self.check_status(resp, endpoint, &url).await?;
        debug!("GET {} -> {}", endpoint, resp.status());
        resp.json().await.map_err(http)
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RpcError> {
        self.with_retry(endpoint, || self.do_get(endpoint)).await
    }

    /// GET a JSON resource, mapping 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, RpcError> {
        match self.get(endpoint).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn do_post_cbor(&self, endpoint: &str, body: &[u8]) -> Result<Value, RpcError> {
        let url = self.endpoint_url(endpoint);
        let http = |source| RpcError::Http {
            endpoint: endpoint.to_string(),
            url: url.clone(),
            source,
        };
        let resp = self
            .client
            .post(&url)
            .headers(self.build_headers("application/cbor"))
            .body(body.to_vec())
            .send()
            .await
            .map_err(http)?;
        let resp = self.check_status(resp, endpoint, &url).await?;
        resp.json().await.map_err(http)
    }

    /// POST raw CBOR bytes, returning the JSON response.
    pub async fn post_cbor(&self, endpoint: &str, body: &[u8]) -> Result<Value, RpcError> {
        self.with_retry(endpoint, || self.do_post_cbor(endpoint, body)).await
    }

    /// Simple connectivity check (GET /health).
    pub async fn is_connected(&self) -> bool {
        self.get::<Value>("/health").await.is_ok()
    }
}
