//! Knowledge-base retrieval collaborator for `rag` tools.
//!
//! The engine hands the raw last user utterance to a [`Retriever`] and
//! returns whatever it answers as an opaque JSON value.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("no retrieval endpoint configured")]
    NotConfigured,

    #[error("retrieval request failed: {0}")]
    Request(String),

    #[error("retrieval request timed out")]
    Timeout,
}

impl From<reqwest::Error> for RetrievalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RetrievalError::Timeout
        } else {
            RetrievalError::Request(e.to_string())
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Value, RetrievalError>;
}

/// POSTs `{"query": ...}` to a retrieval service and returns its JSON reply.
pub struct HttpRetriever {
    client: reqwest::Client,
    url: String,
}

impl HttpRetriever {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Value, RetrievalError> {
        log::debug!("tools: retrieval query ({} chars)", query.len());
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query }))
            .send()
            .await?;
        Ok(response.json::<Value>().await?)
    }
}

/// Stand-in used when no retrieval endpoint is configured.
#[derive(Debug, Default)]
pub struct UnconfiguredRetriever;

#[async_trait]
impl Retriever for UnconfiguredRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Value, RetrievalError> {
        Err(RetrievalError::NotConfigured)
    }
}

/// Pick the retriever for an optional endpoint URL.
pub fn retriever_for(url: Option<&str>, timeout: Duration) -> Box<dyn Retriever> {
    match url.filter(|u| !u.is_empty()) {
        Some(url) => Box::new(HttpRetriever::new(url, timeout)),
        None => Box::new(UnconfiguredRetriever),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_retriever_reports_not_configured() {
        let err = UnconfiguredRetriever.retrieve("q").await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotConfigured));
    }

    #[tokio::test]
    async fn empty_url_selects_unconfigured() {
        let retriever = retriever_for(Some(""), Duration::from_secs(1));
        assert!(retriever.retrieve("q").await.is_err());
    }
}
