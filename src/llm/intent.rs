//! Intent classification of finished user utterances.
//!
//! [`IntentClassifier`] asks the auxiliary model for a JSON verdict
//! `{"intent": ..., "confidence": ...}`.  Classification is advisory: any
//! failure (transport, timeout, unparseable JSON) degrades to
//! [`Intent::General`] with confidence `0.0` and is logged, never raised.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::auxiliary::{AuxiliaryModel, GenerateRequest, LlmError};
use crate::config::RoutingConfig;

// ---------------------------------------------------------------------------
// Intent / Classification
// ---------------------------------------------------------------------------

/// Coarse intent categories recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Move to a page or screen ("open settings").
    Navigation,
    /// Medical procedures or anatomical sites ("biopsy from antrum").
    Medical,
    /// Weather, news, prices, jokes and other tool-backed lookups.
    GeneralTools,
    /// Small talk or anything unclear.
    General,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Navigation => "navigation",
            Intent::Medical => "medical",
            Intent::GeneralTools => "general_tools",
            Intent::General => "general",
        }
    }
}

/// Raw classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    #[serde(default)]
    pub confidence: f32,
}

impl Classification {
    /// The verdict used whenever classification fails.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::General,
            confidence: 0.0,
        }
    }
}

/// Why a classification call produced no verdict.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("unparseable classification: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// IntentClassifier
// ---------------------------------------------------------------------------

pub struct IntentClassifier {
    model: Arc<dyn AuxiliaryModel>,
    model_name: String,
    threshold: f32,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn AuxiliaryModel>, config: &RoutingConfig) -> Self {
        Self {
            model,
            model_name: config.model.clone(),
            threshold: config.confidence_threshold,
        }
    }

    /// Classify `utterance`, degrading to `General`/0.0 on any failure.
    pub async fn classify(&self, utterance: &str) -> Classification {
        match self.try_classify(utterance).await {
            Ok(c) => c,
            Err(e) => {
                log::warn!("router: classification failed ({e}), assuming general");
                Classification::fallback()
            }
        }
    }

    /// Classify and apply the confidence threshold: a verdict must be
    /// strictly above the threshold to win, otherwise the intent is
    /// `General`.
    pub async fn route(&self, utterance: &str) -> Intent {
        let verdict = self.classify(utterance).await;
        log::info!(
            "router: intent {} (confidence {:.2})",
            verdict.intent.label(),
            verdict.confidence
        );
        if verdict.confidence > self.threshold {
            verdict.intent
        } else {
            Intent::General
        }
    }

    async fn try_classify(&self, utterance: &str) -> Result<Classification, ClassificationError> {
        let request = GenerateRequest::new(classification_prompt(utterance))
            .with_model(self.model_name.clone())
            .json();
        let text = self.model.generate(request).await?;
        Ok(serde_json::from_str(strip_code_fence(&text))?)
    }
}

fn classification_prompt(utterance: &str) -> String {
    format!(
        r#"You are a query classification assistant. Analyze the user query and determine the intent.

User query: "{utterance}"

Classify it as exactly one of:
1. navigation - the user wants to go to a page or website (e.g. "go to home", "open settings")
2. medical - the user asks about medical procedures, biopsies or anatomical sites (e.g. "biopsy from antrum")
3. general_tools - the user asks for weather, news, crypto prices, jokes or quotes (e.g. "bitcoin price")
4. general - general conversation or unclear intent

Return ONLY a JSON object:
{{"intent": "navigation" | "medical" | "general_tools" | "general", "confidence": 0.0 to 1.0}}"#
    )
}

/// Models sometimes wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
