use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::constants::USER_AGENT;
use crate::error::{FetchError, PipelineError};

/// Shared JSON-over-HTTP client used by the registry and literature adapters.
///
/// Every failure is classified into a `FetchError` so the enrichment stage can
/// decide whether to retry.
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    client: reqwest::Client,
}

impl HttpJsonClient {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let bytes = resp.bytes().await.map_err(classify_reqwest_error)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::permanent(format!("invalid JSON from {}: {}", url, e)))
    }
}

/// Timeouts and connection problems are worth retrying; everything else is not.
pub fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() || err.is_request() {
        FetchError::transient(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status)
    } else if err.is_decode() || err.is_body() {
        FetchError::permanent(err.to_string())
    } else {
        FetchError::transient(err.to_string())
    }
}

/// 5xx and 429 are transient; any other non-success status is permanent.
pub fn classify_status(status: StatusCode) -> FetchError {
    let reason = format!("HTTP {}", status.as_u16());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::transient(reason)
    } else {
        FetchError::permanent(reason)
    }
}
