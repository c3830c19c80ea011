//! HTTP transport for `api` tools.
//!
//! [`ToolHttp`] is the seam the engine dispatches through; tests replace it
//! with an in-memory double that counts requests.  [`ReqwestToolHttp`]
//! applies one bounded timeout to every request and expects a JSON body in
//! the response, whatever the status code.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP request timed out")]
    Timeout,

    #[error("response is not valid JSON: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Parse(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ToolHttp
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ToolHttp: Send + Sync {
    /// Issue `method` against `url`, with `body` as JSON when present, and
    /// parse the response as JSON.
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestToolHttp {
    client: reqwest::Client,
}

impl ReqwestToolHttp {
    /// Build a client whose requests all share `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl ToolHttp for ReqwestToolHttp {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        log::debug!("tools: {method} {url}");

        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let json = response.json::<Value>().await?;
        if !status.is_success() {
            log::warn!("tools: {url} answered {status}");
        }
        Ok(json)
    }
}
