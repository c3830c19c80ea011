//! Auxiliary text model used outside the live audio session.
//!
//! This module provides:
//! * [`AuxiliaryModel`]: async trait for one-shot generation.
//! * [`ApiAuxModel`]: Gemini / OpenAI-compatible REST backend.
//! * [`IntentClassifier`]: JSON intent classification with graceful
//!   degradation.
//! * [`LlmError`]: error variants for auxiliary calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use live_voice_agent::config::AppConfig;
//! use live_voice_agent::llm::{ApiAuxModel, AuxiliaryModel, GenerateRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let model = ApiAuxModel::from_config(&config.llm);
//!
//!     let text = model
//!         .generate(GenerateRequest::new("Say hello in one word."))
//!         .await
//!         .unwrap();
//!     println!("{text}");
//! }
//! ```

pub mod auxiliary;
pub mod intent;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use auxiliary::{ApiAuxModel, AuxiliaryModel, GenerateRequest, LlmError};
pub use intent::{Classification, ClassificationError, Intent, IntentClassifier};
