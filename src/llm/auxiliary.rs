//! Core `AuxiliaryModel` trait and `ApiAuxModel` implementation.
//!
//! The auxiliary model is a secondary, cheaper text model used outside the
//! live audio session: `prompt` tools, batch summarisation and intent
//! classification.  `ApiAuxModel` speaks either the Gemini
//! `generateContent` REST API or any OpenAI-compatible
//! `/v1/chat/completions` endpoint.  All connection details come from
//! [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during an auxiliary generation call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// Auxiliary calls are switched off in the configuration.
    #[error("auxiliary model is disabled")]
    Disabled,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GenerateRequest
// ---------------------------------------------------------------------------

/// One non-streaming generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Model override; `None` uses the configured model.
    pub model: Option<String>,
    /// Optional system instruction.
    pub system: Option<String>,
    /// User prompt text.
    pub prompt: String,
    /// Ask the backend for a JSON document instead of free text.
    pub json_output: bool,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            system: None,
            prompt: prompt.into(),
            json_output: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

// ---------------------------------------------------------------------------
// AuxiliaryModel trait
// ---------------------------------------------------------------------------

/// Async trait for single-shot text generation.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn AuxiliaryModel>`).
#[async_trait]
pub trait AuxiliaryModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiAuxModel
// ---------------------------------------------------------------------------

/// REST client for the configured auxiliary model provider.
pub struct ApiAuxModel {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiAuxModel {
    /// Build an `ApiAuxModel` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.is_empty())
    }

    async fn post(&self, req: reqwest::RequestBuilder) -> Result<Value, LlmError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }

    async fn generate_gemini(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model.trim_start_matches("models/")
        );

        let mut req = self
            .client
            .post(&url)
            .json(&gemini_body(request, self.config.temperature));
        if let Some(key) = self.api_key() {
            req = req.header("x-goog-api-key", key);
        }

        parse_gemini_text(&self.post(req).await?)
    }

    async fn generate_openai(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut req = self
            .client
            .post(&url)
            .json(&openai_body(model, request, self.config.temperature));

        // Attach Authorization header only when api_key is a non-empty string.
        if let Some(key) = self.api_key() {
            req = req.bearer_auth(key);
        }

        parse_openai_text(&self.post(req).await?)
    }
}

#[async_trait]
impl AuxiliaryModel for ApiAuxModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        log::debug!(
            "llm: {:?} generate with {model} ({} prompt chars)",
            self.config.provider,
            request.prompt.len()
        );

        match self.config.provider {
            LlmProvider::Gemini => self.generate_gemini(&model, &request).await,
            LlmProvider::OpenAiCompatible => self.generate_openai(&model, &request).await,
            LlmProvider::Disabled => Err(LlmError::Disabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

fn gemini_body(request: &GenerateRequest, temperature: f32) -> Value {
    let mut generation = json!({ "temperature": temperature });
    if request.json_output {
        generation["responseMimeType"] = json!("application/json");
    }

    let mut body = json!({
        "contents": [
            { "role": "user", "parts": [ { "text": request.prompt } ] }
        ],
        "generationConfig": generation,
    });
    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({ "parts": [ { "text": system } ] });
    }
    body
}

fn parse_gemini_text(json: &Value) -> Result<String, LlmError> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or(LlmError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .concat();

    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn openai_body(model: &str, request: &GenerateRequest, temperature: f32) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));

    let mut body = json!({
        "model":       model,
        "messages":    messages,
        "stream":      false,
        "temperature": temperature,
    });
    if request.json_output {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

fn parse_openai_text(json: &Value) -> Result<String, LlmError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(provider: LlmProvider, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            base_url: "http://localhost:11434".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 10,
        }
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let model = ApiAuxModel::from_config(&make_config(LlmProvider::OpenAiCompatible, Some("")));
        assert!(model.api_key().is_none());
    }

    #[test]
    fn from_config_keeps_real_api_key() {
        let model = ApiAuxModel::from_config(&make_config(LlmProvider::Gemini, Some("k-123")));
        assert_eq!(model.api_key(), Some("k-123"));
    }

    #[test]
    fn auxiliary_model_is_object_safe() {
        let model: Box<dyn AuxiliaryModel> =
            Box::new(ApiAuxModel::from_config(&make_config(LlmProvider::Gemini, None)));
        drop(model);
    }

    #[tokio::test]
    async fn disabled_provider_never_calls_out() {
        let model = ApiAuxModel::from_config(&make_config(LlmProvider::Disabled, None));
        let err = model.generate(GenerateRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }

    #[test]
    fn gemini_body_carries_system_and_json_mode() {
        let req = GenerateRequest::new("classify this")
            .with_system("be terse")
            .json();
        let body = gemini_body(&req, 0.3);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "classify this");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn gemini_body_plain_text_has_no_mime() {
        let body = gemini_body(&GenerateRequest::new("hello"), 0.3);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn parse_gemini_joins_parts_and_trims() {
        let json = json!({
            "candidates": [ { "content": { "parts": [ { "text": " Sunny " }, { "text": "today.\n" } ] } } ]
        });
        assert_eq!(parse_gemini_text(&json).unwrap(), "Sunny today.");
    }

    #[test]
    fn parse_gemini_empty_is_error() {
        let json = json!({ "candidates": [] });
        assert!(matches!(parse_gemini_text(&json), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn openai_body_orders_messages() {
        let req = GenerateRequest::new("q").with_system("s");
        let body = openai_body("gpt-4o-mini", &req, 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "q");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parse_openai_reads_first_choice() {
        let json = json!({ "choices": [ { "message": { "content": "  done " } } ] });
        assert_eq!(parse_openai_text(&json).unwrap(), "done");
    }
}
