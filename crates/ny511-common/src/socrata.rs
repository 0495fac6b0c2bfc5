//! SODA (Socrata Open Data API) client with connection pooling, rate limiting
//! and retries.

use crate::error::{DashError, Result};
use crate::soql::SoqlQuery;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{debug, error, info, instrument, warn};

/// Default resource endpoint of the 511 NY events dataset.
pub const DEFAULT_ENDPOINT: &str = "https://data.ny.gov/resource/ah74-pg4w.json";

/// Header carrying a Socrata application token.
const APP_TOKEN_HEADER: &str = "x-app-token";

/// Source of tabular rows for a [`SoqlQuery`].
///
/// The pipeline only talks to this trait, which keeps every adapter testable
/// against an in-memory fixture.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Execute the query and return the JSON row objects in response order.
    async fn fetch_rows(&self, query: &SoqlQuery) -> Result<Vec<Value>>;
}

/// Configuration for the SODA client
#[derive(Debug, Clone)]
pub struct SocrataConfig {
    /// Resource endpoint, e.g. `https://data.ny.gov/resource/ah74-pg4w.json`
    pub endpoint: String,
    /// Optional application token; raises the anonymous throttling limits
    pub app_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Connection pool max idle connections per host (default: 10)
    pub max_idle_per_host: usize,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u32,
    /// Maximum number of retry attempts (default: 3)
    pub max_retries: usize,
}

impl Default for SocrataConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_token: None,
            timeout_secs: 30,
            max_idle_per_host: 10,
            rate_limit_per_sec: 10,
            max_retries: 3,
        }
    }
}

impl SocrataConfig {
    /// Create a new configuration for an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the application token
    pub fn with_app_token(mut self, token: impl Into<String>) -> Self {
        self.app_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the rate limit
    pub fn with_rate_limit(mut self, rate_limit_per_sec: u32) -> Self {
        self.rate_limit_per_sec = rate_limit_per_sec;
        self
    }

    /// Set the maximum retry attempts
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// SODA client with connection pooling and rate limiting
#[derive(Clone)]
pub struct SocrataClient {
    client: Client,
    config: SocrataConfig,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for SocrataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocrataClient")
            .field("endpoint", &self.config.endpoint)
            .field("rate_limit_per_sec", &self.config.rate_limit_per_sec)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl SocrataClient {
    /// Create a new client with the given configuration
    pub fn new(config: SocrataConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = config.app_token.as_deref().filter(|t| !t.is_empty()) {
            let value = header::HeaderValue::from_str(token)
                .map_err(|e| DashError::config_with_source("Invalid app token", e))?;
            headers.insert(APP_TOKEN_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .default_headers(headers)
            .build()
            .map_err(|e| DashError::config_with_source("Failed to create HTTP client", e))?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.rate_limit_per_sec)
                .ok_or_else(|| DashError::config("Rate limit must be greater than 0"))?,
        );
        let rate_limiter = Arc::new(DefaultDirectRateLimiter::direct(quota));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Create a new client with default settings for an endpoint
    pub fn with_defaults(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(SocrataConfig::new(endpoint))
    }

    /// Send one GET, classifying failures for the retry policy.
    async fn send_once(&self, url: &url::Url) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!("Request successful: {}", status);
                    Ok(response)
                } else if status.as_u16() == 429 || status.is_server_error() {
                    warn!("Dataset service returned retryable status {}", status);
                    Err(DashError::remote_fetch_with_status(
                        format!("Dataset service returned {status}"),
                        status.as_u16(),
                    ))
                } else {
                    error!("Client error: {}", status);
                    Err(DashError::remote_fetch_with_status(
                        format!("Dataset service rejected the query: {status}"),
                        status.as_u16(),
                    ))
                }
            }
            Err(e) => {
                warn!("Request failed: {}", e);
                Err(DashError::from(e))
            }
        }
    }

    /// Execute a query with retry and exponential backoff.
    #[instrument(skip(self, query), fields(projection = ?query.projection(), offset = ?query.offset()))]
    async fn execute(&self, query: &SoqlQuery) -> Result<Vec<Value>> {
        let url = query.to_url(&self.config.endpoint)?;
        debug!("Requesting {}", url);

        // 100ms, 200ms, 400ms, ...
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(10))
            .take(self.config.max_retries);

        let response = RetryIf::spawn(
            retry_strategy,
            || self.send_once(&url),
            |e: &DashError| e.is_retryable(),
        )
        .await?;

        let text = response
            .text()
            .await
            .map_err(|e| DashError::remote_fetch_with_source("Failed to read response body", e))?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            DashError::remote_fetch_with_source("Response body is not valid JSON", e)
        })?;

        match value {
            Value::Array(rows) => {
                info!("Fetched {} rows", rows.len());
                Ok(rows)
            }
            other => Err(DashError::remote_fetch(format!(
                "Expected a JSON array of rows, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Get metrics about the client configuration and state
    pub fn get_client_metrics(&self) -> ClientMetrics {
        ClientMetrics {
            endpoint: self.config.endpoint.clone(),
            has_app_token: self.config.app_token.is_some(),
            timeout_secs: self.config.timeout_secs,
            rate_limit_per_sec: self.config.rate_limit_per_sec,
            max_retries: self.config.max_retries,
            has_rate_limit_capacity: self.rate_limiter.check().is_ok(),
        }
    }
}

#[async_trait]
impl DatasetSource for SocrataClient {
    async fn fetch_rows(&self, query: &SoqlQuery) -> Result<Vec<Value>> {
        self.execute(query).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Client metrics for monitoring and debugging
#[derive(Debug, Clone, Serialize)]
pub struct ClientMetrics {
    pub endpoint: String,
    pub has_app_token: bool,
    pub timeout_secs: u64,
    pub rate_limit_per_sec: u32,
    pub max_retries: usize,
    /// Whether a request could be sent right now without waiting
    pub has_rate_limit_capacity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned `(status line, body)` per connection, repeating the last
    /// one. Returns the endpoint and the number of requests received.
    async fn canned_server(
        responses: Vec<(&'static str, &'static str)>,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)];
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/resource/ah74-pg4w.json"), hits)
    }

    fn client(endpoint: &str, max_retries: usize) -> SocrataClient {
        SocrataClient::new(
            SocrataConfig::new(endpoint)
                .with_timeout(5)
                .with_max_retries(max_retries),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_rows_returns_array() {
        let (endpoint, hits) =
            canned_server(vec![("200 OK", r#"[{"latest":"2020-04-20T00:00:00.000"}]"#)]).await;
        let rows = client(&endpoint, 3)
            .fetch_rows(&SoqlQuery::latest_day())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_service_retried_until_exhausted() {
        let (endpoint, hits) = canned_server(vec![("503 Service Unavailable", "{}")]).await;
        let err = client(&endpoint, 2)
            .fetch_rows(&SoqlQuery::latest_day())
            .await
            .unwrap_err();

        assert!(err.is_remote_fetch());
        assert!(err.to_string().contains("503"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_throttled_request_succeeds_on_retry() {
        let (endpoint, hits) =
            canned_server(vec![("429 Too Many Requests", "{}"), ("200 OK", "[]")]).await;
        let rows = client(&endpoint, 3)
            .fetch_rows(&SoqlQuery::latest_day())
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_query_not_retried() {
        let (endpoint, hits) =
            canned_server(vec![("400 Bad Request", r#"{"message":"bad $where"}"#)]).await;
        let err = client(&endpoint, 3)
            .fetch_rows(&SoqlQuery::latest_day())
            .await
            .unwrap_err();

        assert!(err.is_remote_fetch());
        assert!(!err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_array_body_rejected() {
        let (endpoint, hits) = canned_server(vec![("200 OK", r#"{"rows":[]}"#)]).await;
        let err = client(&endpoint, 3)
            .fetch_rows(&SoqlQuery::latest_day())
            .await
            .unwrap_err();

        assert!(err.is_remote_fetch());
        assert!(err.to_string().contains("an object"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_config() {
        let config = SocrataConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.app_token.is_none());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = SocrataConfig::new("https://example.org/resource/abcd-1234.json")
            .with_app_token("token")
            .with_timeout(5)
            .with_rate_limit(2)
            .with_max_retries(1);
        assert_eq!(config.app_token.as_deref(), Some("token"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.rate_limit_per_sec, 2);
        assert_eq!(config.max_retries, 1);
    }

    #[tokio::test]
    async fn test_client_rejects_zero_rate_limit() {
        let err = SocrataClient::new(SocrataConfig::default().with_rate_limit(0)).unwrap_err();
        assert!(err.to_string().contains("Rate limit"));
    }

    #[tokio::test]
    async fn test_client_metrics() {
        let client = SocrataClient::new(SocrataConfig::default().with_app_token("abc")).unwrap();
        let metrics = client.get_client_metrics();
        assert_eq!(metrics.endpoint, DEFAULT_ENDPOINT);
        assert!(metrics.has_app_token);
        assert!(metrics.has_rate_limit_capacity);
    }

    #[test]
    fn test_json_kind() {
        assert_eq!(json_kind(&serde_json::json!({"a": 1})), "an object");
        assert_eq!(json_kind(&Value::Null), "null");
    }
}
