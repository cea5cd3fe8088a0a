use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Result, ValidationError};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            pool_max_idle_per_host: 10,
            user_agent: format!("stac-validate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Async HTTP client for downloading STAC documents and schemas.
///
/// Each call is a single attempt; retrying is the caller's business.
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    /// Create a new async HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| ValidationError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// GET `url` and return the raw body of a successful response
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let timeout_seconds = self.config.timeout_seconds;

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ValidationError::from_reqwest(url, &e, timeout_seconds))?;

            let status = response.status();
            if !status.is_success() {
                return Err(status_error(url, status));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| ValidationError::from_reqwest(url, &e, timeout_seconds))?;
            Ok(bytes.to_vec())
        };

        // The client timeout covers each phase; this bounds the whole exchange.
        timeout(Duration::from_secs(timeout_seconds), request)
            .await
            .map_err(|_| ValidationError::Timeout {
                url: url.to_string(),
                timeout_seconds,
            })?
    }

    /// GET `url` and parse the body as JSON
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| ValidationError::Parse {
            location: url.to_string(),
            details: e.to_string(),
        })
    }
}

fn status_error(url: &str, status: StatusCode) -> ValidationError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ValidationError::NotFound {
            location: url.to_string(),
        },
        _ => ValidationError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            message: format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        },
    }
}
