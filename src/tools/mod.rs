//! Tool execution: everything that happens between the live model asking
//! for a function call and the answer going back.
//!
//! This module provides:
//! * [`WorkflowConfig`]: the external workflow file format.
//! * [`ToolRegistry`]: validated tool definitions and their function
//!   declarations for the session setup.
//! * [`ToolExecutionEngine`]: resolve, dispatch and aggregate a batch.
//! * [`ToolHttp`], [`Retriever`], [`ParamExtractor`]: swappable
//!   collaborators used by the engine.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use live_voice_agent::config::AppConfig;
//! use live_voice_agent::conversation::ConversationHistory;
//! use live_voice_agent::llm::ApiAuxModel;
//! use live_voice_agent::tools::{
//!     retriever_for, ReqwestToolHttp, ToolCallRequest, ToolExecutionEngine, ToolRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let registry = ToolRegistry::load("workflow.toml".as_ref()).unwrap();
//!     let engine = ToolExecutionEngine::new(
//!         Arc::new(registry),
//!         Arc::new(ReqwestToolHttp::new(Duration::from_secs(10))),
//!         Arc::new(ApiAuxModel::from_config(&config.llm)),
//!         Arc::from(retriever_for(None, Duration::from_secs(10))),
//!     );
//!
//!     let call = ToolCallRequest {
//!         id: "1".into(),
//!         name: "greeting".into(),
//!         args: Default::default(),
//!     };
//!     let outcome = engine
//!         .execute_batch(&[call], &ConversationHistory::new(), "hi")
//!         .await;
//!     println!("{:?}", outcome.display_text());
//! }
//! ```

pub mod engine;
pub mod extract;
pub mod http;
pub mod registry;
pub mod retrieval;
pub mod summary;
pub mod template;
pub mod workflow;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use engine::{
    BatchOutcome, ExecutedCall, FunctionResponse, PendingParamSet, ToolCallRequest,
    ToolExecutionEngine, ToolExecutionResult,
};
pub use extract::{ParamExtractor, SubstringExtractor};
pub use http::{ReqwestToolHttp, ToolHttp, TransportError};
pub use registry::{ConfigError, ParamSpec, StaticResponse, ToolDefinition, ToolKind, ToolRegistry};
pub use retrieval::{retriever_for, HttpRetriever, RetrievalError, Retriever, UnconfiguredRetriever};
pub use template::{FormatError, Template};
pub use workflow::{IntegrationDescriptor, InputParameter, WorkflowConfig};
