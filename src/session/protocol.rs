//! Wire protocol for the streaming session (Gemini Live JSON messages).
//!
//! # Client → server
//!
//! ```text
//! {"setup": {...}}                                    once, first frame
//! {"realtimeInput": {"mediaChunks": [{mimeType, data}]}}  audio / image
//! {"clientContent": {"turns": [...], "turnComplete": true}}  typed text
//! {"toolResponse": {"functionResponses": [{id, name, response}]}}
//! ```
//!
//! # Server → client
//!
//! One server message may carry several pieces of information, so
//! [`decode_server_message`] flattens it into a list of [`ServerEvent`]s in
//! the order they must be handled: audio, transcriptions, then the turn
//! boundary.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::transport::SessionError;
use crate::audio::AudioFrame;
use crate::config::SessionConfig;
use crate::conversation::Role;
use crate::tools::{FunctionResponse, ToolCallRequest};

// ---------------------------------------------------------------------------
// Client messages
// ---------------------------------------------------------------------------

/// Message written to the session by the send task.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Captured media chunk.
    Realtime(AudioFrame),
    /// Typed user text, sent as a complete user turn.
    Text(String),
    /// Results for tool calls, keyed by call id.
    ToolResponse(Vec<FunctionResponse>),
}

impl ClientMessage {
    pub fn to_json(&self) -> Value {
        match self {
            ClientMessage::Realtime(frame) => json!({
                "realtimeInput": {
                    "mediaChunks": [{
                        "mimeType": frame.mime_type(),
                        "data": BASE64.encode(frame.data()),
                    }]
                }
            }),
            ClientMessage::Text(text) => json!({
                "clientContent": {
                    "turns": [{ "role": "user", "parts": [{ "text": text }] }],
                    "turnComplete": true,
                }
            }),
            ClientMessage::ToolResponse(responses) => {
                let responses: Vec<Value> = responses
                    .iter()
                    .map(|r| json!({ "id": r.id, "name": r.name, "response": r.response }))
                    .collect();
                json!({ "toolResponse": { "functionResponses": responses } })
            }
        }
    }

    /// Serialised frame text.
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Realtime(_) => "realtime",
            ClientMessage::Text(_) => "text",
            ClientMessage::ToolResponse(_) => "tool_response",
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Everything the first `setup` frame carries.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub model: String,
    pub voice_name: String,
    pub language_code: String,
    pub system_instruction: String,
    pub function_declarations: Vec<Value>,
    pub compression_trigger_tokens: u32,
    pub compression_target_tokens: u32,
}

impl SessionSetup {
    pub fn from_config(config: &SessionConfig, function_declarations: Vec<Value>) -> Self {
        Self {
            model: config.model.clone(),
            voice_name: config.voice_name.clone(),
            language_code: config.language_code.clone(),
            system_instruction: config.system_instruction.clone(),
            function_declarations,
            compression_trigger_tokens: config.compression_trigger_tokens,
            compression_target_tokens: config.compression_target_tokens,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut setup = json!({
            "model": self.model,
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice_name }
                    },
                    "languageCode": self.language_code,
                },
            },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {},
            "contextWindowCompression": {
                "triggerTokens": self.compression_trigger_tokens,
                "slidingWindow": { "targetTokens": self.compression_target_tokens },
            },
        });

        if !self.system_instruction.trim().is_empty() {
            setup["systemInstruction"] = json!({ "parts": [{ "text": self.system_instruction }] });
        }
        // An empty declaration list is rejected by the service.
        if !self.function_declarations.is_empty() {
            setup["tools"] = json!([{ "functionDeclarations": self.function_declarations }]);
        }

        json!({ "setup": setup })
    }

    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }
}

// ---------------------------------------------------------------------------
// Server events
// ---------------------------------------------------------------------------

/// Token counts reported by the service for the current turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: u64,
    pub response_token_count: u64,
    pub thoughts_token_count: u64,
    pub total_token_count: u64,
}

/// One decoded piece of a server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    SetupComplete,
    /// Raw PCM16 audio from the model.
    Audio(Vec<u8>),
    /// Streaming transcription; `User` for input, `Model` for output.
    Transcription { role: Role, text: String },
    ToolCall(Vec<ToolCallRequest>),
    /// End of a model turn. `interrupted` is set when the service detected
    /// the user talking over the model.
    TurnComplete { interrupted: bool },
    Usage(UsageMetadata),
    /// The service will close the connection soon.
    GoAway,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<RawServerContent>,
    tool_call: Option<RawToolCall>,
    usage_metadata: Option<UsageMetadata>,
    go_away: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawServerContent {
    model_turn: Option<RawContent>,
    turn_complete: bool,
    interrupted: bool,
    input_transcription: Option<RawTranscription>,
    output_transcription: Option<RawTranscription>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawContent {
    parts: Vec<RawPart>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawPart {
    inline_data: Option<RawBlob>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawBlob {
    data: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTranscription {
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawToolCall {
    function_calls: Vec<RawFunctionCall>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawFunctionCall {
    id: String,
    name: String,
    args: Map<String, Value>,
}

/// Decode one server frame into its events.  Unknown fields are ignored;
/// a frame with nothing recognisable yields an empty list.
pub fn decode_server_message(text: &str) -> Result<Vec<ServerEvent>, SessionError> {
    let raw: RawServerMessage =
        serde_json::from_str(text).map_err(|e| SessionError::Protocol(e.to_string()))?;

    let mut events = Vec::new();

    if raw.setup_complete.is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(content) = raw.server_content {
        for part in content.model_turn.map(|t| t.parts).unwrap_or_default() {
            let Some(blob) = part.inline_data else { continue };
            let pcm = BASE64
                .decode(blob.data.as_bytes())
                .map_err(|e| SessionError::Protocol(format!("bad inline audio: {e}")))?;
            if !pcm.is_empty() {
                events.push(ServerEvent::Audio(pcm));
            }
        }

        let transcriptions = [
            (Role::User, content.input_transcription),
            (Role::Model, content.output_transcription),
        ];
        for (role, transcription) in transcriptions {
            if let Some(t) = transcription.filter(|t| !t.text.is_empty()) {
                events.push(ServerEvent::Transcription { role, text: t.text });
            }
        }

        if content.interrupted {
            events.push(ServerEvent::TurnComplete { interrupted: true });
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete { interrupted: false });
        }
    }

    if let Some(call) = raw.tool_call {
        let calls: Vec<ToolCallRequest> = call
            .function_calls
            .into_iter()
            .map(|c| ToolCallRequest {
                id: c.id,
                name: c.name,
                args: c.args,
            })
            .collect();
        if !calls.is_empty() {
            events.push(ServerEvent::ToolCall(calls));
        }
    }

    if let Some(usage) = raw.usage_metadata {
        events.push(ServerEvent::Usage(usage));
    }

    if raw.go_away.is_some() {
        events.push(ServerEvent::GoAway);
    }

    Ok(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_audio_is_base64_media_chunk() {
        let frame = AudioFrame::pcm(vec![1, 2, 3], 16_000, 1);
        let json = ClientMessage::Realtime(frame).to_json();
        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(chunk["data"], "AQID");
    }

    #[test]
    fn text_is_a_complete_user_turn() {
        let json = ClientMessage::Text("hello".into()).to_json();
        assert_eq!(json["clientContent"]["turnComplete"], true);
        assert_eq!(json["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(json["clientContent"]["turns"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn tool_response_keeps_ids() {
        let msg = ClientMessage::ToolResponse(vec![FunctionResponse {
            id: "call-1".into(),
            name: "weather".into(),
            response: json!({"status": "mixed"}),
        }]);
        let json = msg.to_json();
        let r = &json["toolResponse"]["functionResponses"][0];
        assert_eq!(r["id"], "call-1");
        assert_eq!(r["name"], "weather");
        assert_eq!(r["response"]["status"], "mixed");
    }

    #[test]
    fn setup_carries_voice_tools_and_compression() {
        let mut config = SessionConfig::default();
        config.system_instruction = "Be brief.".into();
        let setup = SessionSetup::from_config(&config, vec![json!({"name": "weather"})]);
        let json = setup.to_json();

        let s = &json["setup"];
        assert_eq!(s["model"], config.model.as_str());
        assert_eq!(s["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            s["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(s["tools"][0]["functionDeclarations"][0]["name"], "weather");
        assert_eq!(s["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(s["contextWindowCompression"]["triggerTokens"], 4000);
        assert!(s["inputAudioTranscription"].is_object());
    }

    #[test]
    fn setup_without_tools_omits_tools_field() {
        let setup = SessionSetup::from_config(&SessionConfig::default(), Vec::new());
        assert!(setup.to_json()["setup"].get("tools").is_none());
    }

    #[test]
    fn decodes_setup_complete() {
        let events = decode_server_message(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(events, vec![ServerEvent::SetupComplete]);
    }

    #[test]
    fn decodes_audio_then_transcription_then_turn_end() {
        let events = decode_server_message(
            r#"{"serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AQID"}}]},
                "outputTranscription": {"text": "Hi"},
                "turnComplete": true
            }}"#,
        )
        .unwrap();

        assert_eq!(
            events,
            vec![
                ServerEvent::Audio(vec![1, 2, 3]),
                ServerEvent::Transcription {
                    role: Role::Model,
                    text: "Hi".into()
                },
                ServerEvent::TurnComplete { interrupted: false },
            ]
        );
    }

    #[test]
    fn decodes_interruption() {
        let events = decode_server_message(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert_eq!(events, vec![ServerEvent::TurnComplete { interrupted: true }]);
    }

    #[test]
    fn input_transcription_is_user_role() {
        let events =
            decode_server_message(r#"{"serverContent": {"inputTranscription": {"text": "hey"}}}"#)
                .unwrap();
        assert_eq!(
            events,
            vec![ServerEvent::Transcription {
                role: Role::User,
                text: "hey".into()
            }]
        );
    }

    #[test]
    fn decodes_tool_calls() {
        let events = decode_server_message(
            r#"{"toolCall": {"functionCalls": [
                {"id": "a", "name": "crypto", "args": {"coin": "bitcoin"}},
                {"id": "b", "name": "greeting"}
            ]}}"#,
        )
        .unwrap();

        let ServerEvent::ToolCall(calls) = &events[0] else {
            panic!("expected tool call, got {events:?}");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args["coin"], "bitcoin");
        assert!(calls[1].args.is_empty());
    }

    #[test]
    fn decodes_usage_and_go_away() {
        let events = decode_server_message(
            r#"{"usageMetadata": {"promptTokenCount": 12, "responseTokenCount": 30}, "goAway": {"timeLeft": "5s"}}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                ServerEvent::Usage(UsageMetadata {
                    prompt_token_count: 12,
                    response_token_count: 30,
                    ..UsageMetadata::default()
                }),
                ServerEvent::GoAway,
            ]
        );
    }

    #[test]
    fn unknown_message_yields_nothing() {
        assert!(decode_server_message(r#"{"sessionResumptionUpdate": {}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn invalid_json_is_protocol_error() {
        assert!(matches!(
            decode_server_message("not json"),
            Err(SessionError::Protocol(_))
        ));
    }
}
