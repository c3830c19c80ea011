//! Websocket implementation of the session seams.
//!
//! [`WebSocketConnector::connect`] opens the socket, writes the setup frame
//! and waits for `setupComplete` before splitting the stream into a
//! [`WsSink`] (send task) and a [`WsSource`] (receive task).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::protocol::{decode_server_message, ClientMessage, ServerEvent, SessionSetup};
use super::transport::{SessionConnector, SessionError, SessionSink, SessionSource};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for `setupComplete` after sending setup.
const SETUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Decode the payload of a text or binary frame.  Control frames yield
/// `None`.
fn frame_text(message: Message) -> Option<Result<String, SessionError>> {
    match message {
        Message::Text(text) => Some(Ok(text)),
        Message::Binary(bytes) => Some(
            String::from_utf8(bytes).map_err(|e| SessionError::Protocol(e.to_string())),
        ),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// WebSocketConnector
// ---------------------------------------------------------------------------

pub struct WebSocketConnector {
    endpoint: String,
    api_key: String,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{sep}key={}", self.endpoint, self.api_key)
    }

    async fn await_setup_complete(socket: &mut Socket) -> Result<(), SessionError> {
        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| SessionError::Connect(e.to_string()))?;
            if let Message::Close(frame) = &message {
                let reason = frame
                    .as_ref()
                    .map(|f| f.reason.to_string())
                    .unwrap_or_default();
                return Err(SessionError::Connect(format!("closed during setup: {reason}")));
            }
            let Some(text) = frame_text(message) else { continue };
            if decode_server_message(&text?)?.contains(&ServerEvent::SetupComplete) {
                return Ok(());
            }
        }
        Err(SessionError::Connect("stream ended during setup".into()))
    }
}

#[async_trait]
impl SessionConnector for WebSocketConnector {
    async fn connect(
        &self,
        setup: &SessionSetup,
    ) -> Result<(Box<dyn SessionSink>, Box<dyn SessionSource>), SessionError> {
        if self.api_key.trim().is_empty() {
            return Err(SessionError::MissingApiKey);
        }

        log::info!("session: connecting to {}", self.endpoint);
        let (mut socket, _response) = tokio_tungstenite::connect_async(self.url())
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        socket
            .send(Message::Text(setup.encode()))
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        tokio::time::timeout(SETUP_TIMEOUT, Self::await_setup_complete(&mut socket))
            .await
            .map_err(|_| SessionError::Connect("timed out waiting for setupComplete".into()))??;

        log::info!(
            "session: setup complete (model {}, {} tools)",
            setup.model,
            setup.function_declarations.len()
        );

        let (write, read) = socket.split();
        Ok((
            Box::new(WsSink { write }),
            Box::new(WsSource {
                read,
                pending: VecDeque::new(),
            }),
        ))
    }
}

// ---------------------------------------------------------------------------
// Sink / source
// ---------------------------------------------------------------------------

pub struct WsSink {
    write: SplitSink<Socket, Message>,
}

#[async_trait]
impl SessionSink for WsSink {
    async fn send(&mut self, message: ClientMessage) -> Result<(), SessionError> {
        self.write
            .send(Message::Text(message.encode()))
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.write
            .close()
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }
}

pub struct WsSource {
    read: SplitStream<Socket>,
    /// Events decoded from a frame but not yet handed out.
    pending: VecDeque<ServerEvent>,
}

#[async_trait]
impl SessionSource for WsSource {
    async fn next_event(&mut self) -> Result<Option<ServerEvent>, SessionError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let message = match self.read.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(SessionError::Protocol(e.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        log::info!("session: server closed ({}): {}", frame.code, frame.reason);
                    }
                    return Ok(None);
                }
                Some(Ok(message)) => message,
            };

            let Some(text) = frame_text(message) else { continue };
            match text.and_then(|t| decode_server_message(&t)) {
                Ok(events) => self.pending.extend(events),
                Err(e) => log::warn!("session: skipping undecodable frame: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_appends_key() {
        let c = WebSocketConnector::new("wss://host/path", "k1");
        assert_eq!(c.url(), "wss://host/path?key=k1");

        let c = WebSocketConnector::new("wss://host/path?alt=1", "k2");
        assert_eq!(c.url(), "wss://host/path?alt=1&key=k2");
    }

    #[test]
    fn binary_frames_are_decoded_as_text() {
        let text = frame_text(Message::Binary(br#"{"setupComplete":{}}"#.to_vec()));
        assert_eq!(text.unwrap().unwrap(), r#"{"setupComplete":{}}"#);
        assert!(frame_text(Message::Ping(Vec::new())).is_none());
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_connecting() {
        let c = WebSocketConnector::new("wss://unused.invalid", "");
        let setup = SessionSetup::from_config(&Default::default(), Vec::new());
        assert!(matches!(
            c.connect(&setup).await,
            Err(SessionError::MissingApiKey)
        ));
    }
}
