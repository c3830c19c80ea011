//! Validated, immutable tool registry.
//!
//! [`ToolRegistry::from_workflow`] converts every [`IntegrationDescriptor`]
//! into a [`ToolDefinition`] and rejects malformed entries up front, so a
//! bad workflow file stops startup instead of failing mid-conversation.
//!
//! ```text
//! workflow.toml ─▶ WorkflowConfig ─▶ convert + validate ─▶ ToolRegistry (Arc, read-only)
//!                                                            ├─▶ function_declarations() → session setup
//!                                                            └─▶ get(name)               → engine dispatch
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use reqwest::Method;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::template::{normalize_double_braces, FormatError, Template};
use super::workflow::{non_empty, IntegrationDescriptor, WorkflowConfig};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A workflow that cannot be turned into a registry.  Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workflow file is not valid: {0}")]
    Parse(String),

    #[error("unsupported workflow file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("integration #{index} has neither tool_id nor tool_name")]
    EmptyKey { index: usize },

    #[error("duplicate tool id {0:?}")]
    DuplicateTool(String),

    #[error("tool {tool:?} has unknown type {kind:?}")]
    UnknownType { tool: String, kind: String },

    #[error("api tool {0:?} has no url")]
    MissingUrl(String),

    #[error("tool {tool:?} has invalid HTTP method {method:?}")]
    InvalidMethod { tool: String, method: String },

    #[error("prompt tool {0:?} has no response_prompt")]
    MissingPrompt(String),

    #[error("static tool {0:?} has neither response_text nor response_prompt")]
    MissingStaticText(String),

    #[error("tool {tool:?} declares parameter {param:?} twice")]
    DuplicateParam { tool: String, param: String },

    #[error("tool {tool:?} has a malformed template: {source}")]
    Template {
        tool: String,
        #[source]
        source: FormatError,
    },

    #[error("tool {tool:?} template uses undeclared parameter {placeholder:?}")]
    UndeclaredPlaceholder { tool: String, placeholder: String },
}

// ---------------------------------------------------------------------------
// ToolDefinition
// ---------------------------------------------------------------------------

/// Fixed or templated static reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticResponse {
    Text(String),
    Template(Template),
}

/// Type-specific execution payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Api { url: Template, method: Method },
    Prompt { template: Template },
    Static(StaticResponse),
    Rag,
}

impl ToolKind {
    /// The type name used in workflow files and summary payloads.
    pub fn type_name(&self) -> &'static str {
        match self {
            ToolKind::Api { .. } => "api",
            ToolKind::Prompt { .. } => "prompt",
            ToolKind::Static(_) => "static",
            ToolKind::Rag => "rag",
        }
    }
}

/// One declared argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: String,
    pub description: String,
    pub required: bool,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub id: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub kind: ToolKind,
}

impl ToolDefinition {
    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// Declaration advertised to the live model.
    pub fn function_declaration(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut schema = json!({ "type": p.param_type.to_uppercase() });
            if !p.description.is_empty() {
                schema["description"] = json!(p.description);
            }
            if let Some(values) = &p.enum_values {
                let values: Vec<String> = values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                schema["enum"] = json!(values);
            }
            properties.insert(p.name.clone(), schema);
        }

        let mut parameters = json!({ "type": "OBJECT", "properties": properties });
        let required: Vec<&str> = self.required_params().map(|p| p.name.as_str()).collect();
        if !required.is_empty() {
            parameters["required"] = json!(required);
        }

        json!({
            "name": self.id,
            "description": self.description,
            "parameters": parameters,
        })
    }

    fn from_descriptor(index: usize, d: &IntegrationDescriptor) -> Result<Self, ConfigError> {
        let id = d.key();
        if id.is_empty() {
            return Err(ConfigError::EmptyKey { index });
        }

        let mut seen = HashSet::new();
        let mut params = Vec::with_capacity(d.input_parameters.len());
        for p in &d.input_parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::DuplicateParam {
                    tool: id,
                    param: p.name.clone(),
                });
            }
            params.push(ParamSpec {
                name: p.name.clone(),
                param_type: p.param_type.clone(),
                description: p.description.clone(),
                required: p.required,
                enum_values: p.enum_values.clone(),
                default: p.default.clone(),
            });
        }

        let parse = |source: &str| {
            Template::parse(source).map_err(|source| ConfigError::Template {
                tool: id.clone(),
                source,
            })
        };

        let kind = match d.effective_kind().as_str() {
            "api" => {
                let url = non_empty(&d.url).ok_or_else(|| ConfigError::MissingUrl(id.clone()))?;
                let method_name = non_empty(&d.method).unwrap_or("GET").to_ascii_uppercase();
                let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
                    ConfigError::InvalidMethod {
                        tool: id.clone(),
                        method: method_name.clone(),
                    }
                })?;
                ToolKind::Api {
                    url: parse(url)?,
                    method,
                }
            }
            "prompt" => {
                let prompt = non_empty(&d.response_prompt)
                    .ok_or_else(|| ConfigError::MissingPrompt(id.clone()))?;
                ToolKind::Prompt {
                    template: parse(&normalize_double_braces(prompt))?,
                }
            }
            "static" => match (&d.response_text, &d.response_prompt) {
                (Some(text), _) => ToolKind::Static(StaticResponse::Text(text.clone())),
                (None, Some(prompt)) => ToolKind::Static(StaticResponse::Template(parse(
                    &normalize_double_braces(prompt),
                )?)),
                (None, None) => return Err(ConfigError::MissingStaticText(id)),
            },
            "rag" => ToolKind::Rag,
            other => {
                return Err(ConfigError::UnknownType {
                    tool: id,
                    kind: other.to_string(),
                })
            }
        };

        let definition = Self {
            description: d.description(),
            id,
            params,
            kind,
        };
        definition.check_placeholders()?;
        Ok(definition)
    }

    fn template(&self) -> Option<&Template> {
        match &self.kind {
            ToolKind::Api { url, .. } => Some(url),
            ToolKind::Prompt { template } => Some(template),
            ToolKind::Static(StaticResponse::Template(t)) => Some(t),
            ToolKind::Static(StaticResponse::Text(_)) | ToolKind::Rag => None,
        }
    }

    fn check_placeholders(&self) -> Result<(), ConfigError> {
        let Some(template) = self.template() else {
            return Ok(());
        };
        for name in template.placeholders() {
            if !self.params.iter().any(|p| p.name == name) {
                return Err(ConfigError::UndeclaredPlaceholder {
                    tool: self.id.clone(),
                    placeholder: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Read-only map from tool id to definition.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
    /// Ids in workflow order, for stable declarations.
    order: Vec<String>,
}

impl ToolRegistry {
    /// An empty registry (no tools advertised).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Convert and validate every integration of `workflow`.
    pub fn from_workflow(workflow: &WorkflowConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for (index, descriptor) in workflow.integrations.iter().enumerate() {
            let definition = ToolDefinition::from_descriptor(index, descriptor)?;
            registry.insert(definition)?;
        }
        log::info!(
            "tools: loaded {} tool(s) from workflow {:?}",
            registry.len(),
            workflow.workflow_id
        );
        Ok(registry)
    }

    /// Load and validate a workflow file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_workflow(&WorkflowConfig::load(path)?)
    }

    /// Build from already constructed definitions (duplicate ids rejected).
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ToolDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for definition in definitions {
            definition.check_placeholders()?;
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, definition: ToolDefinition) -> Result<(), ConfigError> {
        if self.tools.contains_key(&definition.id) {
            return Err(ConfigError::DuplicateTool(definition.id));
        }
        self.order.push(definition.id.clone());
        self.tools.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ToolDefinition> {
        self.tools.get(id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions in workflow order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.order.iter().filter_map(|id| self.tools.get(id))
    }

    /// Function declarations for the session setup message.
    pub fn function_declarations(&self) -> Vec<Value> {
        self.iter().map(ToolDefinition::function_declaration).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(json: &str) -> WorkflowConfig {
        WorkflowConfig::from_json(json).expect("valid json")
    }

    const SAMPLE: &str = r#"{
        "workflow_id": "weather_and_food",
        "integrations": [
            {
                "tool_id": "crypto_api",
                "tool_name": "Crypto Price",
                "tool_description": "Get current price of a cryptocurrency.",
                "type": "api",
                "url": "https://api.coingecko.com/api/v3/simple/price?ids={coin}&vs_currencies=usd",
                "method": "get",
                "input_parameters": [
                    {"name": "coin", "type": "string", "description": "Cryptocurrency ID", "required": true}
                ]
            },
            {
                "tool_id": "motivation_tool",
                "type": "prompt",
                "response_prompt": "Give a short motivational message about: {{topic}}",
                "input_parameters": [{"name": "topic", "required": true}]
            },
            {
                "tool_name": "Cloth Combination",
                "when_to_use": "User asks what to wear.",
                "response_text": "Okay, wear light colors."
            },
            {
                "tool_id": "schedule_meeting",
                "type": "static",
                "response_prompt": "Scheduled a {{duration_minutes}} minute meeting on '{{topic}}'.",
                "input_parameters": [
                    {"name": "topic", "required": true},
                    {"name": "duration_minutes", "type": "integer", "required": true}
                ]
            },
            {
                "tool_id": "rag_tool",
                "type": "rag",
                "input_parameters": [{"name": "user_query", "required": true}]
            }
        ]
    }"#;

    #[test]
    fn sample_workflow_converts() {
        let registry = ToolRegistry::from_workflow(&workflow(SAMPLE)).unwrap();
        assert_eq!(registry.len(), 5);

        let crypto = registry.get("crypto_api").unwrap();
        assert!(matches!(&crypto.kind, ToolKind::Api { method, .. } if *method == Method::GET));

        let motivation = registry.get("motivation_tool").unwrap();
        match &motivation.kind {
            ToolKind::Prompt { template } => {
                assert_eq!(template.source(), "Give a short motivational message about: {topic}")
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let cloth = registry.get("cloth_combination").unwrap();
        assert_eq!(cloth.description, "User asks what to wear.");
        assert!(matches!(cloth.kind, ToolKind::Static(StaticResponse::Text(_))));

        assert!(matches!(
            registry.get("schedule_meeting").unwrap().kind,
            ToolKind::Static(StaticResponse::Template(_))
        ));
        assert_eq!(registry.get("rag_tool").unwrap().kind, ToolKind::Rag);
    }

    #[test]
    fn declarations_follow_workflow_order() {
        let registry = ToolRegistry::from_workflow(&workflow(SAMPLE)).unwrap();
        let decls = registry.function_declarations();
        let names: Vec<&str> = decls.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(
            names,
            vec!["crypto_api", "motivation_tool", "cloth_combination", "schedule_meeting", "rag_tool"]
        );

        let crypto = &decls[0];
        assert_eq!(crypto["parameters"]["type"], "OBJECT");
        assert_eq!(crypto["parameters"]["properties"]["coin"]["type"], "STRING");
        assert_eq!(crypto["parameters"]["required"], json!(["coin"]));
        assert!(decls[2]["parameters"].get("required").is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [
                {"tool_id": "a", "response_text": "x"},
                {"tool_id": "a", "response_text": "y"}
            ]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTool(id) if id == "a"));
    }

    #[test]
    fn api_without_url_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "type": "api"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingUrl(_)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "type": "webhook"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { kind, .. } if kind == "webhook"));
    }

    #[test]
    fn invalid_method_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "url": "https://x", "method": "GE T"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMethod { .. }));
    }

    #[test]
    fn undeclared_placeholder_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "url": "https://x/{coin}"}]}"#,
        ))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::UndeclaredPlaceholder { placeholder, .. } if placeholder == "coin")
        );
    }

    #[test]
    fn malformed_template_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "type": "prompt", "response_prompt": "about {topic"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Template { .. }));
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "x", "response_text": "t",
                "input_parameters": [{"name": "a"}, {"name": "a"}]}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParam { .. }));
    }

    #[test]
    fn nameless_integration_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"response_text": "t"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKey { index: 0 }));
    }

    #[test]
    fn prompt_without_template_is_rejected() {
        let err = ToolRegistry::from_workflow(&workflow(
            r#"{"integrations": [{"tool_id": "p", "type": "prompt"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingPrompt(_)));
    }

    #[test]
    fn bundled_demo_workflow_is_valid() {
        let workflow =
            WorkflowConfig::from_toml(include_str!("../../demos/workflow.toml")).unwrap();
        let registry = ToolRegistry::from_workflow(&workflow).unwrap();
        assert_eq!(registry.len(), 6);
        assert!(matches!(
            registry.get("knowledge_base").map(|t| &t.kind),
            Some(ToolKind::Rag)
        ));
        assert!(matches!(
            registry.get("meeting_reminder").map(|t| &t.kind),
            Some(ToolKind::Static(StaticResponse::Template(_)))
        ));
    }
}
