//! Workflow descriptor files: the external tool configuration format.
//!
//! A workflow lists `integrations`, each describing one tool the way a
//! visual workflow editor exports it.  Files are TOML or JSON, chosen by
//! extension:
//!
//! ```toml
//! workflow_id = "demo"
//! workflow_name = "Demo"
//!
//! [[integrations]]
//! tool_id = "crypto_api"
//! tool_name = "Crypto Price"
//! tool_description = "Get current price of a cryptocurrency."
//! type = "api"
//! url = "https://api.coingecko.com/api/v3/simple/price?ids={coin}&vs_currencies=usd"
//! method = "GET"
//!
//! [[integrations.input_parameters]]
//! name = "coin"
//! type = "string"
//! required = true
//! ```
//!
//! Descriptors are only raw data; [`crate::tools::ToolRegistry`] converts
//! and validates them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::ConfigError;

/// Top-level workflow file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub workflow_id: String,
    pub workflow_name: String,
    pub description: String,
    pub integrations: Vec<IntegrationDescriptor>,
}

/// One tool as exported by the workflow editor.  Every field is optional on
/// the wire; conversion decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationDescriptor {
    pub tool_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_description: Option<String>,
    pub when_to_use: Option<String>,
    /// `api`, `prompt`, `static` or `rag`; inferred when absent.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub response_prompt: Option<String>,
    pub response_text: Option<String>,
    pub input_parameters: Vec<InputParameter>,
}

/// One declared tool argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: String,
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_param_type() -> String {
    "string".into()
}

/// Treat empty strings like absent values, the way the editor exports them.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl IntegrationDescriptor {
    /// Registry key: `tool_id`, else `tool_name` lower-cased with spaces
    /// replaced by underscores.
    pub fn key(&self) -> String {
        match non_empty(&self.tool_id) {
            Some(id) => id.to_string(),
            None => self
                .tool_name
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .replace(' ', "_"),
        }
    }

    /// Declared type, or one inferred from the payload fields present.
    pub fn effective_kind(&self) -> String {
        if let Some(kind) = non_empty(&self.kind) {
            return kind.to_lowercase();
        }
        if non_empty(&self.url).is_some() {
            "api"
        } else if non_empty(&self.response_text).is_some() {
            "static"
        } else if non_empty(&self.response_prompt).is_some() {
            "prompt"
        } else {
            "static"
        }
        .to_string()
    }

    /// `tool_description`, else `when_to_use`, else `tool_name`.
    pub fn description(&self) -> String {
        non_empty(&self.tool_description)
            .or_else(|| non_empty(&self.when_to_use))
            .or_else(|| non_empty(&self.tool_name))
            .unwrap_or_default()
            .to_string()
    }
}

impl WorkflowConfig {
    /// Load a workflow from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
