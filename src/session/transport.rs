//! Session transport seams and the session error type.
//!
//! The orchestrator only sees these traits; [`super::WebSocketConnector`]
//! is the production implementation and tests plug in in-memory doubles.

use async_trait::async_trait;
use thiserror::Error;

use super::protocol::{ClientMessage, ServerEvent, SessionSetup};
use crate::audio::DeviceError;

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors that end (or prevent) a streaming session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No API key was configured for the live endpoint.
    #[error("no API key configured for the live session")]
    MissingApiKey,

    /// The connection or setup handshake failed.
    #[error("cannot connect to live session: {0}")]
    Connect(String),

    /// A frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Writing to the session failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The server closed the stream or announced shutdown.
    #[error("session closed by server")]
    Closed,

    /// An audio device failed.
    #[error("audio device error: {0}")]
    Device(#[from] DeviceError),

    /// A task-internal channel was closed while its peer was still needed.
    #[error("internal channel closed: {0}")]
    ChannelClosed(&'static str),

    /// A task panicked or could not be joined.
    #[error("task {task} aborted: {reason}")]
    Join { task: &'static str, reason: String },

    /// A member of the task group failed; the whole group was cancelled.
    #[error("{task} task failed: {source}")]
    TaskFailed {
        task: &'static str,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Wrap `self` as the failure of `task`.
    pub fn in_task(self, task: &'static str) -> Self {
        SessionError::TaskFailed {
            task,
            source: Box::new(self),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Write half of a session.  Owned by the send task only.
#[async_trait]
pub trait SessionSink: Send {
    async fn send(&mut self, message: ClientMessage) -> Result<(), SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Read half of a session.  Owned by the receive task only.
#[async_trait]
pub trait SessionSource: Send {
    /// Next event, or `Ok(None)` once the server has closed the stream.
    async fn next_event(&mut self) -> Result<Option<ServerEvent>, SessionError>;
}

/// Opens a session and completes the setup handshake.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        setup: &SessionSetup,
    ) -> Result<(Box<dyn SessionSink>, Box<dyn SessionSource>), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn task_failure_keeps_its_cause() {
        let err = SessionError::Closed.in_task("receive");
        assert_eq!(err.to_string(), "receive task failed: session closed by server");
        assert!(err.source().is_some());
    }

    #[test]
    fn device_errors_convert() {
        let err: SessionError = DeviceError::NoDevice("input").into();
        assert!(matches!(err, SessionError::Device(_)));
    }
}
