//! Session orchestrator: connects, runs the five I/O tasks as one
//! fail-fast group and tears everything down.
//!
//! # Lifecycle
//!
//! ```text
//! run()
//!   ├─ Connecting: SessionConnector::connect(setup)
//!   ├─ Active:     spawn capture, playback, send, receive, console
//!   │                 (JoinSet + one CancellationToken)
//!   │
//!   ├─ console completes (q / EOF) ──▶ Closing, cancel all ──▶ Ok(())
//!   ├─ any task fails              ──▶ Closing, cancel all ──▶ Err(TaskFailed)
//!   │
//!   └─ Closed: every task joined, devices and session halves dropped
//! ```
//!
//! Capture reaching end of stream finishes only that task; the rest of the
//! group keeps running.

use std::future::Future;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::state::SessionState;
use super::tasks::{capture_task, console_task, playback_task, send_task, ReceiveTask};
use crate::audio::{speaking_flag, AudioDevices, PlaybackQueue};
use crate::config::{AudioConfig, SessionConfig};
use crate::console::TranscriptPrinter;
use crate::conversation::{new_shared_history, SharedHistory};
use crate::llm::IntentClassifier;
use crate::session::{SessionConnector, SessionError, SessionSetup};
use crate::tools::ToolExecutionEngine;

/// Capacity of the tool-response control channel.
const CONTROL_CAPACITY: usize = 8;

const CONSOLE: &str = "console";

type TaskOutcome = (&'static str, Result<(), SessionError>);

/// Run `task` and label its outcome; a panic becomes [`SessionError::Join`].
fn supervised<F>(name: &'static str, task: F) -> impl Future<Output = TaskOutcome> + Send + 'static
where
    F: Future<Output = Result<(), SessionError>> + Send + 'static,
{
    async move {
        let result = AssertUnwindSafe(task).catch_unwind().await.unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(SessionError::Join { task: name, reason })
        });
        (name, result)
    }
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

/// Owns one conversation from connect to close.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use live_voice_agent::audio::CpalDevices;
/// # use live_voice_agent::config::AppConfig;
/// # use live_voice_agent::console::ConsoleReader;
/// # use live_voice_agent::pipeline::SessionOrchestrator;
/// # use live_voice_agent::session::WebSocketConnector;
/// # use live_voice_agent::tools::ToolExecutionEngine;
/// # async fn example(engine: Arc<ToolExecutionEngine>) -> anyhow::Result<()> {
/// let config = AppConfig::default();
/// let (_reader, lines) = ConsoleReader::stdin(16)?;
/// let orchestrator = SessionOrchestrator::new(
///     &config.session,
///     &config.audio,
///     Arc::new(WebSocketConnector::new(&config.session.endpoint, "api-key")),
///     Arc::new(CpalDevices::new(config.audio.clone())),
///     engine,
///     lines,
/// );
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionOrchestrator {
    session: SessionConfig,
    audio: AudioConfig,
    connector: Arc<dyn SessionConnector>,
    devices: Arc<dyn AudioDevices>,
    engine: Arc<ToolExecutionEngine>,
    console: mpsc::Receiver<String>,
    printer: TranscriptPrinter<Box<dyn Write + Send>>,
    classifier: Option<Arc<IntentClassifier>>,
    history: SharedHistory,
    history_user_blocks: usize,
    state: watch::Sender<SessionState>,
}

impl SessionOrchestrator {
    pub fn new(
        session: &SessionConfig,
        audio: &AudioConfig,
        connector: Arc<dyn SessionConnector>,
        devices: Arc<dyn AudioDevices>,
        engine: Arc<ToolExecutionEngine>,
        console: mpsc::Receiver<String>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            session: session.clone(),
            audio: audio.clone(),
            connector,
            devices,
            engine,
            console,
            printer: TranscriptPrinter::stdout(),
            classifier: None,
            history: new_shared_history(),
            history_user_blocks: 5,
            state,
        }
    }

    /// Write the transcript somewhere other than stdout.
    pub fn with_printer(mut self, printer: TranscriptPrinter<Box<dyn Write + Send>>) -> Self {
        self.printer = printer;
        self
    }

    /// Classify each finished user utterance.
    pub fn with_classifier(mut self, classifier: Arc<IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// How many user blocks of history survive each turn.
    pub fn with_history_user_blocks(mut self, blocks: usize) -> Self {
        self.history_user_blocks = blocks;
        self
    }

    /// Observe lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Conversation history shared with the tasks.
    pub fn history(&self) -> SharedHistory {
        Arc::clone(&self.history)
    }

    fn set_state(&self, next: SessionState) {
        log::debug!("session: {} -> {}", self.state.borrow().label(), next.label());
        self.state.send_replace(next);
    }

    /// Run the conversation until the user quits or a task fails.
    pub async fn run(self) -> Result<(), SessionError> {
        self.set_state(SessionState::Connecting);

        let setup = SessionSetup::from_config(&self.session, self.engine.registry().function_declarations());
        let (sink, source) = match self.connector.connect(&setup).await {
            Ok(halves) => halves,
            Err(e) => {
                log::error!("session: connect failed: {e}");
                self.set_state(SessionState::Closed);
                return Err(e);
            }
        };
        self.set_state(SessionState::Active);

        let Self {
            audio,
            devices,
            engine,
            console,
            printer,
            classifier,
            history,
            history_user_blocks,
            state,
            ..
        } = self;

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(audio.outbound_capacity.max(1));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let playback = PlaybackQueue::new();
        let (speaking_writer, speaking_reader) = speaking_flag();

        let mut tasks = JoinSet::new();
        tasks.spawn(supervised(
            "capture",
            capture_task(
                Arc::clone(&devices),
                audio,
                speaking_reader,
                outbound_tx.clone(),
                cancel.clone(),
            ),
        ));
        tasks.spawn(supervised(
            "playback",
            playback_task(devices, playback.clone(), speaking_writer, cancel.clone()),
        ));
        tasks.spawn(supervised(
            "send",
            send_task(sink, outbound_rx, control_rx, cancel.clone()),
        ));
        let receive = ReceiveTask {
            source,
            engine,
            history: Arc::clone(&history),
            playback,
            control: control_tx,
            printer,
            classifier,
            history_user_blocks,
        };
        tasks.spawn(supervised("receive", receive.run(cancel.clone())));
        tasks.spawn(supervised(
            CONSOLE,
            console_task(console, outbound_tx, history, cancel.clone()),
        ));

        log::info!("session: active, type a message or 'q' to quit");

        let mut outcome = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let (name, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("session: task could not be joined: {e}");
                    continue;
                }
            };

            match result {
                Ok(()) if name == CONSOLE && !cancel.is_cancelled() => {
                    log::info!("session: user quit");
                    state.send_replace(SessionState::Closing);
                    cancel.cancel();
                }
                Ok(()) => log::debug!("session: {name} task finished"),
                Err(e) if cancel.is_cancelled() => {
                    log::debug!("session: {name} failed during shutdown: {e}");
                }
                Err(e) => {
                    log::error!("session: {name} task failed: {e}");
                    state.send_replace(SessionState::Closing);
                    cancel.cancel();
                    outcome = Err(e.in_task(name));
                }
            }
        }

        state.send_replace(SessionState::Closed);
        log::info!("session: closed");
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
