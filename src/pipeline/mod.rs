//! Session pipeline: the concurrent task graph of one conversation.
//!
//! # Architecture
//!
//! ```text
//!                 SessionOrchestrator::run()
//!                          │
//!        ┌──────────┬──────┴─────┬──────────┬──────────┐
//!        ▼          ▼            ▼          ▼          ▼
//!     capture   playback       send     receive     console
//!        │          ▲            ▲          │          │
//!        │          │ PlaybackQueue         │          │
//!        │          └───────────────────────┤          │
//!        └──▶ outbound (bounded) ◀──────────┼──────────┘
//!                                ◀─control──┘ (tool responses)
//! ```
//!
//! All five tasks share one `CancellationToken`.  The group is fail-fast:
//! the first task error cancels every sibling and is returned from
//! [`SessionOrchestrator::run`] as `SessionError::TaskFailed`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use live_voice_agent::audio::CpalDevices;
//! use live_voice_agent::config::AppConfig;
//! use live_voice_agent::console::ConsoleReader;
//! use live_voice_agent::pipeline::SessionOrchestrator;
//! use live_voice_agent::session::WebSocketConnector;
//! # use live_voice_agent::tools::ToolExecutionEngine;
//! # fn make_engine() -> Arc<ToolExecutionEngine> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let (_reader, lines) = ConsoleReader::stdin(16)?;
//!
//!     SessionOrchestrator::new(
//!         &config.session,
//!         &config.audio,
//!         Arc::new(WebSocketConnector::new(&config.session.endpoint, "api-key")),
//!         Arc::new(CpalDevices::new(config.audio.clone())),
//!         make_engine(),
//!         lines,
//!     )
//!     .run()
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod orchestrator;
pub mod state;
pub mod tasks;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use orchestrator::SessionOrchestrator;
pub use state::SessionState;
pub use tasks::{capture_task, console_task, playback_task, send_task, OutboundMessage, ReceiveTask};
