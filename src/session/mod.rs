//! Streaming session with the remote conversational model.
//!
//! This module provides:
//! * [`ClientMessage`] / [`ServerEvent`]: the decoded wire protocol.
//! * [`SessionSetup`]: the first frame (voice, tools, transcription,
//!   context window compression).
//! * [`SessionSink`], [`SessionSource`], [`SessionConnector`]: the seams
//!   the pipeline tasks are written against.
//! * [`WebSocketConnector`]: production implementation over
//!   `tokio-tungstenite`.
//! * [`UsageTracker`]: per-turn and cumulative token accounting.
//!
//! ```text
//! send task ──ClientMessage──▶ SessionSink ──▶ websocket
//! websocket ──▶ SessionSource ──ServerEvent──▶ receive task
//! ```

pub mod protocol;
pub mod transport;
pub mod usage;
pub mod websocket;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use protocol::{decode_server_message, ClientMessage, ServerEvent, SessionSetup, UsageMetadata};
pub use transport::{SessionConnector, SessionError, SessionSink, SessionSource};
pub use usage::{UsageTotals, UsageTracker};
pub use websocket::{WebSocketConnector, WsSink, WsSource};
