//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every struct is `#[serde(default)]`, so a settings file only needs to
//! name the values it overrides.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for the bidirectional streaming session with the remote model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Websocket endpoint of the live generation service (without the key).
    pub endpoint: String,
    /// Live model identifier.
    pub model: String,
    /// API key.  The `GEMINI_API_KEY` environment variable takes precedence.
    pub api_key: Option<String>,
    /// Prebuilt voice used for spoken responses.
    pub voice_name: String,
    /// BCP-47 language code for speech output.
    pub language_code: String,
    /// System instruction sent in the setup message.
    pub system_instruction: String,
    /// Context size (tokens) at which the server starts compressing history.
    pub compression_trigger_tokens: u32,
    /// Context size (tokens) the sliding window compresses down to.
    pub compression_target_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".into(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".into(),
            api_key: None,
            voice_name: "Zephyr".into(),
            language_code: "en-US".into(),
            system_instruction: "You are a helpful voice assistant. Use the available tools \
                when the user asks for information they provide, and answer only in English."
                .into(),
            compression_trigger_tokens: 4_000,
            compression_target_tokens: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture and playback devices and the outbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of microphone audio sent to the session (Hz).
    pub send_sample_rate: u32,
    /// Sample rate of model audio received from the session (Hz).
    pub receive_sample_rate: u32,
    /// Channel count on both directions (mono).
    pub channels: u16,
    /// Frames per captured chunk.
    pub chunk_frames: usize,
    /// Capacity of the bounded outbound queue.  A full queue suspends the
    /// capture task until the send task drains it.
    pub outbound_capacity: usize,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            send_sample_rate: 16_000,
            receive_sample_rate: 24_000,
            channels: 1,
            chunk_frames: 1024,
            outbound_capacity: 5,
            input_device: None,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProvider / LlmConfig
// ---------------------------------------------------------------------------

/// Selects which backend serves auxiliary generation calls (prompt tools,
/// batch summarisation, intent classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Google Generative Language REST API (`generateContent`).
    Gemini,
    /// Any OpenAI-compatible REST API (OpenAI, Groq, Ollama, LM Studio …).
    OpenAiCompatible,
    /// Auxiliary calls disabled; every call fails with `LlmError::Disabled`.
    Disabled,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

/// Settings for the secondary, cheaper auxiliary model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Gemini: `https://generativelanguage.googleapis.com`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key; `None` for local providers.  Falls back to the session key
    /// for the Gemini provider.
    pub api_key: Option<String>,
    /// Model identifier (e.g. `"gemini-2.5-flash-lite"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.5-flash-lite".into(),
            temperature: 0.3,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// Settings for tool loading and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Workflow descriptor file.  `None` means `<config_dir>/workflow.toml`.
    pub workflow_file: Option<PathBuf>,
    /// Timeout applied to every `api` tool request.
    pub http_timeout_secs: u64,
    /// Endpoint of the knowledge-base retrieval service used by `rag` tools.
    pub retrieval_url: Option<String>,
    /// Number of most recent user blocks kept in conversation history.
    pub history_user_blocks: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workflow_file: None,
            http_timeout_secs: 10,
            retrieval_url: None,
            history_user_blocks: 5,
        }
    }
}

impl ToolsConfig {
    /// The workflow file to load: the configured one, or the default path.
    pub fn workflow_path(&self, paths: &AppPaths) -> PathBuf {
        self.workflow_file
            .clone()
            .unwrap_or_else(|| paths.workflow_file.clone())
    }
}

// ---------------------------------------------------------------------------
// RoutingConfig
// ---------------------------------------------------------------------------

/// Settings for intent classification of finished user utterances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Classify each finished user utterance and show the routed intent in
    /// the transcript.
    pub classify_intents: bool,
    /// Minimum confidence for a non-general intent to be accepted.
    pub confidence_threshold: f32,
    /// Model used for classification calls.
    pub model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            classify_intents: false,
            confidence_threshold: 0.6,
            model: "gemini-2.0-flash".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use live_voice_agent::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Streaming session settings.
    pub session: SessionConfig,
    /// Audio device and queue settings.
    pub audio: AudioConfig,
    /// Auxiliary model settings.
    pub llm: LlmConfig,
    /// Tool loading / execution settings.
    pub tools: ToolsConfig,
    /// Intent classification settings.
    pub routing: RoutingConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let saved = AppConfig::default();
        saved.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(saved.session.model, loaded.session.model);
        assert_eq!(saved.session.voice_name, loaded.session.voice_name);
        assert_eq!(saved.audio.send_sample_rate, loaded.audio.send_sample_rate);
        assert_eq!(
            saved.audio.receive_sample_rate,
            loaded.audio.receive_sample_rate
        );
        assert_eq!(saved.audio.outbound_capacity, loaded.audio.outbound_capacity);
        assert_eq!(saved.llm.provider, loaded.llm.provider);
        assert_eq!(saved.llm.model, loaded.llm.model);
        assert_eq!(saved.tools.http_timeout_secs, loaded.tools.http_timeout_secs);
        assert_eq!(
            saved.routing.confidence_threshold,
            loaded.routing.confidence_threshold
        );
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.audio.chunk_frames, 1024);
        assert_eq!(config.llm.model, "gemini-2.5-flash-lite");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.send_sample_rate, 16_000);
        assert_eq!(cfg.audio.receive_sample_rate, 24_000);
        assert_eq!(cfg.audio.channels, 1);
        assert_eq!(cfg.audio.outbound_capacity, 5);
        assert_eq!(cfg.session.voice_name, "Zephyr");
        assert_eq!(cfg.session.compression_trigger_tokens, 4_000);
        assert_eq!(cfg.tools.http_timeout_secs, 10);
        assert_eq!(cfg.tools.history_user_blocks, 5);
        assert!(!cfg.routing.classify_intents);
        assert!(cfg.session.api_key.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[audio]\noutbound_capacity = 2\n\n[llm]\nprovider = \"OpenAiCompatible\"\n",
        )
        .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.audio.outbound_capacity, 2);
        assert_eq!(cfg.audio.send_sample_rate, 16_000);
        assert_eq!(cfg.llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(cfg.session.language_code, "en-US");
    }

    #[test]
    fn workflow_path_prefers_configured_file() {
        let paths = AppPaths::new();
        let mut tools = ToolsConfig::default();
        assert_eq!(tools.workflow_path(&paths), paths.workflow_file);

        tools.workflow_file = Some(PathBuf::from("/tmp/custom.json"));
        assert_eq!(tools.workflow_path(&paths), PathBuf::from("/tmp/custom.json"));
    }
}
