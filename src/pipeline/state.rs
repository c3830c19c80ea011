//! Session lifecycle state.
//!
//! [`SessionState`] is published by the orchestrator through a
//! `tokio::sync::watch` channel so callers can observe progress without
//! touching the orchestrator itself.

/// Lifecycle of one streaming session.
///
/// ```text
/// Idle ──run()──▶ Connecting ──handshake ok──▶ Active
///                     │                          │
///                     │ connect error            │ quit / task failure
///                     ▼                          ▼
///                   Closed ◀──all tasks joined── Closing
/// ```
///
/// There is no way back from `Closed`; a new conversation needs a new
/// orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Constructed, not yet started.
    #[default]
    Idle,

    /// Opening the connection and waiting for the setup handshake.
    Connecting,

    /// All I/O tasks are running.
    Active,

    /// Cancellation has been requested; waiting for tasks to unwind.
    Closing,

    /// Every task has finished and devices are released.
    Closed,
}

impl SessionState {
    /// Returns `true` while the session holds a connection.
    ///
    /// ```
    /// use live_voice_agent::pipeline::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_live());
    /// assert!(SessionState::Active.is_live());
    /// assert!(SessionState::Closing.is_live());
    /// assert!(!SessionState::Closed.is_live());
    /// ```
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Active | SessionState::Closing
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Active => "Active",
            SessionState::Closing => "Closing",
            SessionState::Closed => "Closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn closed_is_terminal_and_not_live() {
        assert!(!SessionState::Closed.is_live());
        assert_eq!(SessionState::Closed.label(), "Closed");
    }

    #[test]
    fn labels() {
        assert_eq!(SessionState::Connecting.label(), "Connecting");
        assert_eq!(SessionState::Active.label(), "Active");
        assert_eq!(SessionState::Closing.label(), "Closing");
    }
}
