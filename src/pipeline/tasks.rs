//! The five long-lived I/O tasks of a session.
//!
//! Every task is an `async fn` returning `Result<(), SessionError>` that
//! watches a shared [`CancellationToken`] at each suspension point.  Device
//! calls (open, read, write) are blocking and always run on the blocking
//! pool, never on the async workers.
//!
//! ```text
//! capture ──AudioFrame──▶ outbound (bounded) ──▶ send ──▶ SessionSink
//! console ──Text────────▶ outbound               ▲
//!                                                │ control (tool responses)
//! SessionSource ──▶ receive ─┬─ audio ──▶ PlaybackQueue ──▶ playback
//!                            ├─ transcription ──▶ history + printer
//!                            ├─ tool call ──▶ ToolExecutionEngine
//!                            └─ turn end ──▶ PlaybackQueue::clear
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioDevices, AudioFrame, PlaybackQueue, SpeakingReader, SpeakingWriter};
use crate::config::AudioConfig;
use crate::console::TranscriptPrinter;
use crate::conversation::SharedHistory;
use crate::llm::{Intent, IntentClassifier};
use crate::session::{ClientMessage, ServerEvent, SessionError, SessionSink, SessionSource, UsageTracker};
use crate::tools::{ToolCallRequest, ToolExecutionEngine};

/// Upper bound for closing the session sink on the way out.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// Item of the bounded outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Audio(AudioFrame),
    Text(String),
}

impl From<OutboundMessage> for ClientMessage {
    fn from(message: OutboundMessage) -> Self {
        match message {
            OutboundMessage::Audio(frame) => ClientMessage::Realtime(frame),
            OutboundMessage::Text(text) => ClientMessage::Text(text),
        }
    }
}

fn join_error(task: &'static str) -> impl FnOnce(tokio::task::JoinError) -> SessionError {
    move |e| SessionError::Join {
        task,
        reason: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Microphone → outbound queue.
///
/// Chunks read while the assistant is speaking are dropped.  A full queue
/// suspends the loop until the send task makes room.  Ends when the device
/// reports end of stream.
pub async fn capture_task(
    devices: Arc<dyn AudioDevices>,
    audio: AudioConfig,
    speaking: SpeakingReader,
    outbound: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let open = tokio::task::spawn_blocking(move || devices.open_capture());
    let mut mic = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        opened = open => opened.map_err(join_error("capture"))??,
    };
    log::info!("capture: microphone open");

    let mut suppressed = 0u64;
    loop {
        let read = tokio::task::spawn_blocking(move || {
            let chunk = mic.read_chunk();
            (mic, chunk)
        });
        let (device, chunk) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = read => read.map_err(join_error("capture"))?,
        };
        mic = device;

        let Some(chunk) = chunk? else {
            log::info!("capture: end of stream");
            return Ok(());
        };

        if speaking.is_speaking() {
            suppressed += 1;
            continue;
        }
        if suppressed > 0 {
            log::debug!("capture: dropped {suppressed} chunks while the model spoke");
            suppressed = 0;
        }

        let frame = AudioFrame::pcm(chunk, audio.send_sample_rate, audio.channels);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = outbound.send(OutboundMessage::Audio(frame)) => {
                sent.map_err(|_| SessionError::ChannelClosed("outbound"))?;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Playback queue → speaker.  The speaking flag is set for exactly the
/// duration of each device write.
pub async fn playback_task(
    devices: Arc<dyn AudioDevices>,
    queue: PlaybackQueue,
    mut speaking: SpeakingWriter,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let open = tokio::task::spawn_blocking(move || devices.open_playback());
    let mut speaker = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        opened = open => opened.map_err(join_error("playback"))??,
    };
    log::info!("playback: speaker open");

    loop {
        let pcm = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            pcm = queue.pop() => pcm,
        };

        let _speaking = speaking.speak();
        let write = tokio::task::spawn_blocking(move || {
            let written = speaker.write(&pcm);
            (speaker, written)
        });
        let (device, written) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            write = write => write.map_err(join_error("playback"))?,
        };
        speaker = device;
        written?;
    }
}

// ---------------------------------------------------------------------------
// Send
// ---------------------------------------------------------------------------

/// Outbound queue and control channel → session, FIFO per channel.  Tool
/// responses on the control channel go first.
pub async fn send_task(
    mut sink: Box<dyn SessionSink>,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    mut control: mpsc::Receiver<ClientMessage>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let mut outbound_open = true;

    let result = loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            Some(message) = control.recv() => message,
            message = outbound.recv(), if outbound_open => match message {
                Some(message) => ClientMessage::from(message),
                None => {
                    outbound_open = false;
                    continue;
                }
            },
            else => break Ok(()),
        };

        log::trace!("send: {}", message.kind());
        if let Err(e) = sink.send(message).await {
            break Err(e);
        }
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Err(e)) => log::debug!("send: close failed: {e}"),
        Err(_) => log::debug!("send: close timed out"),
        Ok(Ok(())) => {}
    }
    result
}

// ---------------------------------------------------------------------------
// Receive
// ---------------------------------------------------------------------------

/// State owned by the receive task.
pub struct ReceiveTask {
    pub source: Box<dyn SessionSource>,
    pub engine: Arc<ToolExecutionEngine>,
    pub history: SharedHistory,
    pub playback: PlaybackQueue,
    pub control: mpsc::Sender<ClientMessage>,
    pub printer: TranscriptPrinter<Box<dyn Write + Send>>,
    pub classifier: Option<Arc<IntentClassifier>>,
    /// User blocks kept in history after each turn.
    pub history_user_blocks: usize,
}

impl ReceiveTask {
    /// Session → playback queue, history, printer and tool engine.  The
    /// end of the server stream is an error: the conversation cannot go on.
    /// Session token totals are reported on every exit path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), SessionError> {
        let mut usage = UsageTracker::new();
        let result = self.receive(&cancel, &mut usage).await;

        let totals = usage.totals();
        log::info!(
            "receive: session used {} tokens over {} turns (in={} out={} thinking={})",
            totals.total(),
            totals.turns,
            totals.prompt_tokens,
            totals.response_tokens,
            totals.thinking_tokens
        );
        if let Err(e) = self.printer.usage_summary(&totals) {
            log::warn!("receive: cannot print usage summary: {e}");
        }
        result
    }

    async fn receive(
        &mut self,
        cancel: &CancellationToken,
        usage: &mut UsageTracker,
    ) -> Result<(), SessionError> {
        let mut last_classified: Option<String> = None;
        let (intent_tx, mut intents) = mpsc::channel::<Intent>(4);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                Some(intent) = intents.recv() => {
                    if let Err(e) = self.printer.intent(intent) {
                        log::warn!("receive: cannot print intent: {e}");
                    }
                    continue;
                }
                event = self.source.next_event() => event?,
            };
            let Some(event) = event else {
                log::warn!("receive: server closed the stream");
                return Err(SessionError::Closed);
            };

            match event {
                ServerEvent::SetupComplete => log::debug!("receive: duplicate setupComplete"),
                ServerEvent::Audio(pcm) => self.playback.push(pcm),
                ServerEvent::Transcription { role, text } => {
                    self.history.lock().await.push_text(role, &text);
                    if let Err(e) = self.printer.transcript(role, &text) {
                        log::warn!("receive: cannot print transcript: {e}");
                    }
                }
                ServerEvent::ToolCall(calls) => {
                    let done = tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        done = self.handle_tool_calls(calls) => done,
                    };
                    done?;
                }
                ServerEvent::TurnComplete { interrupted } => {
                    let dropped = self.playback.clear();
                    if dropped > 0 {
                        log::debug!("receive: discarded {dropped} unplayed chunks");
                    }
                    let mut history = self.history.lock().await;
                    history.close_turn();
                    if interrupted {
                        log::info!("receive: model interrupted");
                        continue;
                    }
                    usage.finish_turn();
                    let removed = history.trim_to_recent_user_blocks(self.history_user_blocks);
                    if removed > 0 {
                        log::debug!("receive: trimmed {removed} turns from history");
                    }
                    let utterance = history.last_user_text();
                    drop(history);

                    if let (Some(classifier), Some(text)) = (&self.classifier, utterance) {
                        if last_classified.as_deref() != Some(text.as_str()) {
                            last_classified = Some(text.clone());
                            spawn_classification(Arc::clone(classifier), text, intent_tx.clone());
                        }
                    }
                }
                ServerEvent::Usage(metadata) => usage.record(metadata),
                ServerEvent::GoAway => {
                    log::warn!("receive: server is going away");
                    return Err(SessionError::Closed);
                }
            }
        }
    }

    async fn handle_tool_calls(&mut self, calls: Vec<ToolCallRequest>) -> Result<(), SessionError> {
        // Snapshot so the lock is not held while tools run.
        let (snapshot, utterance) = {
            let mut history = self.history.lock().await;
            for call in &calls {
                history.push_function_call(&call.name, call.args.clone());
            }
            let utterance = history.last_user_text().unwrap_or_default();
            (history.clone(), utterance)
        };

        let outcome = self.engine.execute_batch(&calls, &snapshot, &utterance).await;
        log::info!("receive: tool batch of {} -> {}", calls.len(), outcome.status());
        if let Err(e) = self.printer.tool_outcome(&outcome) {
            log::warn!("receive: cannot print tool outcome: {e}");
        }

        let responses = outcome.tool_responses();
        if responses.is_empty() {
            return Ok(());
        }
        self.control
            .send(ClientMessage::ToolResponse(responses))
            .await
            .map_err(|_| SessionError::ChannelClosed("control"))
    }
}

/// Classify the finished user utterance off the receive path.  The routed
/// intent comes back to the receive task for the transcript.
fn spawn_classification(
    classifier: Arc<IntentClassifier>,
    utterance: String,
    intents: mpsc::Sender<Intent>,
) {
    tokio::spawn(async move {
        let intent = classifier.route(&utterance).await;
        log::info!("receive: routed last utterance to {}", intent.label());
        let _ = intents.send(intent).await;
    });
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Typed lines → outbound queue.  `q` or end of input completes the task,
/// which ends the session.
pub async fn console_task(
    mut lines: mpsc::Receiver<String>,
    outbound: mpsc::Sender<OutboundMessage>,
    history: SharedHistory,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            log::info!("console: input closed");
            return Ok(());
        };

        let text = line.trim();
        if text.eq_ignore_ascii_case("q") {
            log::info!("console: quit requested");
            return Ok(());
        }
        let text = if text.is_empty() { "." } else { text };

        history.lock().await.push_user_message(text);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = outbound.send(OutboundMessage::Text(text.to_string())) => {
                sent.map_err(|_| SessionError::ChannelClosed("outbound"))?;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
