//! Tool execution engine: resolve, dispatch and aggregate one batch of
//! tool calls from a single model turn.
//!
//! # Flow
//!
//! ```text
//! calls ─▶ resolve every call (supplied value → history extractor → missing)
//!            │
//!            ├─ any missing ─▶ NeedsMoreInput   (nothing dispatched)
//!            │
//!            └─ dispatch in call order
//!                  ├─ api     → render URL → ToolHttp (bounded timeout)
//!                  ├─ prompt  → render prompt → AuxiliaryModel
//!                  ├─ static  → fixed text / rendered template
//!                  └─ rag     → Retriever(last utterance) ─▶ Retrieval (stop here)
//!            │
//!            ├─ all static ─▶ StaticComposed   (texts joined by a blank line)
//!            └─ otherwise  ─▶ Mixed            (one summarisation call)
//! ```
//!
//! Individual dispatch failures never abort the batch; they become
//! [`ToolExecutionResult::Error`] entries and flow into aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::extract::{ParamExtractor, SubstringExtractor};
use super::http::ToolHttp;
use super::registry::{StaticResponse, ToolDefinition, ToolKind, ToolRegistry};
use super::retrieval::Retriever;
use super::summary::{summary_prompt, SUMMARY_SYSTEM_INSTRUCTION};
use crate::conversation::ConversationHistory;
use crate::llm::{AuxiliaryModel, GenerateRequest};

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// One function call requested by the live model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

/// Outcome of one dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolExecutionResult {
    Success(Value),
    Error(String),
}

impl ToolExecutionResult {
    /// JSON form used in summaries and tool responses; errors become
    /// `{"error": message}`.
    pub fn to_json(&self) -> Value {
        match self {
            ToolExecutionResult::Success(v) => v.clone(),
            ToolExecutionResult::Error(msg) => json!({ "error": msg }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success(_))
    }
}

/// Arguments that could not be resolved for one tool.  Never executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingParamSet {
    pub missing: Vec<String>,
    pub args: Map<String, Value>,
}

/// A call that was dispatched, with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCall {
    pub call_id: String,
    pub name: String,
    /// `api`, `prompt`, `static`, or `unknown` for unregistered names.
    pub tool_type: &'static str,
    pub result: ToolExecutionResult,
}

impl ExecutedCall {
    /// `{name, type, content}` entry of the summarisation payload.
    pub fn summary_item(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.tool_type,
            "content": self.result.to_json(),
        })
    }
}

/// Tool result returned to the live session, keyed by call id.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// Aggregated outcome of one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The batch contained no calls.
    Empty,
    /// At least one call lacks required arguments; nothing was dispatched.
    /// `deferred` lists the ids of complete calls held back with it.
    NeedsMoreInput {
        pending: BTreeMap<String, PendingParamSet>,
        deferred: Vec<String>,
    },
    /// A `rag` call short-circuited the batch.
    Retrieval {
        call_id: String,
        name: String,
        result: Value,
    },
    /// Every call was static; texts joined verbatim.
    StaticComposed {
        text: String,
        calls: Vec<ExecutedCall>,
    },
    /// Anything else; `summary` is the single summarisation result.
    Mixed {
        items: Vec<ExecutedCall>,
        summary: ToolExecutionResult,
    },
}

impl BatchOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            BatchOutcome::Empty => "empty",
            BatchOutcome::NeedsMoreInput { .. } => "needs_more_input",
            BatchOutcome::Retrieval { .. } => "retrieval",
            BatchOutcome::StaticComposed { .. } => "static_composed",
            BatchOutcome::Mixed { .. } => "mixed",
        }
    }

    /// Per-call responses for the session.  Empty for needs-more-input and
    /// retrieval outcomes.
    pub fn tool_responses(&self) -> Vec<FunctionResponse> {
        let status = self.status();
        match self {
            BatchOutcome::StaticComposed { text, calls } => calls
                .iter()
                .map(|c| FunctionResponse {
                    id: c.call_id.clone(),
                    name: c.name.clone(),
                    response: json!({
                        "status": status,
                        "content": c.result.to_json(),
                        "answer": text,
                    }),
                })
                .collect(),
            BatchOutcome::Mixed { items, summary } => items
                .iter()
                .map(|c| FunctionResponse {
                    id: c.call_id.clone(),
                    name: c.name.clone(),
                    response: json!({
                        "status": status,
                        "content": c.result.to_json(),
                        "answer": summary.to_json(),
                    }),
                })
                .collect(),
            BatchOutcome::Empty
            | BatchOutcome::NeedsMoreInput { .. }
            | BatchOutcome::Retrieval { .. } => Vec::new(),
        }
    }

    /// Human-readable rendering for the console.
    pub fn display_text(&self) -> Option<String> {
        match self {
            BatchOutcome::Empty => None,
            BatchOutcome::NeedsMoreInput { pending, .. } => Some(
                pending
                    .iter()
                    .map(|(tool, p)| format!("{tool} needs {}", p.missing.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            BatchOutcome::Retrieval { result, .. } => Some(match result {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            }),
            BatchOutcome::StaticComposed { text, .. } => Some(text.clone()),
            BatchOutcome::Mixed { summary, .. } => Some(match summary {
                ToolExecutionResult::Success(Value::String(s)) => s.clone(),
                ToolExecutionResult::Success(other) => other.to_string(),
                ToolExecutionResult::Error(e) => format!("tool summary failed: {e}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Null, `""`, `[]` and `{}` count as "not supplied".
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// A call after resolution, before dispatch.
enum Resolved<'a> {
    Ready {
        call: &'a ToolCallRequest,
        tool: &'a ToolDefinition,
        args: Map<String, Value>,
    },
    Unknown(&'a ToolCallRequest),
}

/// What one dispatch produced.
enum Dispatched {
    Done(ToolExecutionResult),
    Retrieval(Value),
}

pub struct ToolExecutionEngine {
    registry: Arc<ToolRegistry>,
    http: Arc<dyn ToolHttp>,
    model: Arc<dyn AuxiliaryModel>,
    retriever: Arc<dyn Retriever>,
    extractor: Box<dyn ParamExtractor>,
}

impl ToolExecutionEngine {
    /// Engine with the default [`SubstringExtractor`].
    pub fn new(
        registry: Arc<ToolRegistry>,
        http: Arc<dyn ToolHttp>,
        model: Arc<dyn AuxiliaryModel>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            registry,
            http,
            model,
            retriever,
            extractor: Box::new(SubstringExtractor),
        }
    }

    /// Replace the parameter extraction strategy.
    pub fn with_extractor(mut self, extractor: Box<dyn ParamExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve, dispatch and aggregate `calls`.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCallRequest],
        history: &ConversationHistory,
        last_user_utterance: &str,
    ) -> BatchOutcome {
        if calls.is_empty() {
            return BatchOutcome::Empty;
        }

        // Phase 1: resolve everything before touching the network.
        let mut resolved = Vec::with_capacity(calls.len());
        let mut pending = BTreeMap::new();

        for call in calls {
            log::info!("tools: model requested {} args={}", call.name, Value::Object(call.args.clone()));
            match self.registry.get(&call.name) {
                None => resolved.push(Resolved::Unknown(call)),
                Some(tool) => match self.resolve_args(tool, &call.args, history) {
                    Ok(args) => resolved.push(Resolved::Ready { call, tool, args }),
                    Err(set) => {
                        log::info!("tools: {} is missing {:?}", call.name, set.missing);
                        pending.insert(call.name.clone(), set);
                    }
                },
            }
        }

        if !pending.is_empty() {
            let deferred = resolved
                .iter()
                .map(|r| match r {
                    Resolved::Ready { call, .. } | Resolved::Unknown(call) => call.id.clone(),
                })
                .collect();
            return BatchOutcome::NeedsMoreInput { pending, deferred };
        }

        // Phase 2: dispatch in call order.
        let mut executed = Vec::with_capacity(resolved.len());
        let mut static_texts = Vec::new();
        let mut all_static = true;

        for entry in resolved {
            let (call, tool, args) = match entry {
                Resolved::Unknown(call) => {
                    log::warn!("tools: unknown tool {:?}", call.name);
                    all_static = false;
                    executed.push(ExecutedCall {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        tool_type: "unknown",
                        result: ToolExecutionResult::Error(format!("unknown tool: {}", call.name)),
                    });
                    continue;
                }
                Resolved::Ready { call, tool, args } => (call, tool, args),
            };

            let result = match self.dispatch(tool, &args, last_user_utterance).await {
                Dispatched::Retrieval(result) => {
                    return BatchOutcome::Retrieval {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        result,
                    }
                }
                Dispatched::Done(result) => result,
            };

            match (&tool.kind, &result) {
                (ToolKind::Static(_), ToolExecutionResult::Success(Value::String(text))) => {
                    static_texts.push(text.clone());
                }
                _ => all_static = false,
            }

            executed.push(ExecutedCall {
                call_id: call.id.clone(),
                name: call.name.clone(),
                tool_type: tool.kind.type_name(),
                result,
            });
        }

        // Phase 3: aggregate.
        if all_static && !static_texts.is_empty() {
            return BatchOutcome::StaticComposed {
                text: static_texts.join("\n\n"),
                calls: executed,
            };
        }

        let summary = self.summarize(&executed).await;
        BatchOutcome::Mixed {
            items: executed,
            summary,
        }
    }

    /// Required parameters: supplied non-empty value, else the extractor,
    /// else missing.  Optional parameters pass through when supplied and
    /// fall back to their declared default.
    fn resolve_args(
        &self,
        tool: &ToolDefinition,
        supplied: &Map<String, Value>,
        history: &ConversationHistory,
    ) -> Result<Map<String, Value>, PendingParamSet> {
        let mut args = Map::new();
        let mut missing = Vec::new();

        for param in &tool.params {
            let given = supplied.get(&param.name).filter(|v| !is_empty_value(v));

            if let Some(value) = given {
                args.insert(param.name.clone(), value.clone());
            } else if param.required {
                match self.extractor.extract(&param.name, history) {
                    Some(inferred) => {
                        log::debug!("tools: inferred {}={inferred:?} from history", param.name);
                        args.insert(param.name.clone(), Value::String(inferred));
                    }
                    None => missing.push(param.name.clone()),
                }
            } else if let Some(default) = &param.default {
                args.insert(param.name.clone(), default.clone());
            }
        }

        if missing.is_empty() {
            Ok(args)
        } else {
            Err(PendingParamSet { missing, args })
        }
    }

    async fn dispatch(
        &self,
        tool: &ToolDefinition,
        args: &Map<String, Value>,
        last_user_utterance: &str,
    ) -> Dispatched {
        let result = match &tool.kind {
            ToolKind::Api { url, method } => {
                let url = match url.render(args) {
                    Ok(url) => url,
                    Err(e) => return Dispatched::Done(ToolExecutionResult::Error(e.to_string())),
                };
                let body = Value::Object(args.clone());
                let body = (*method != Method::GET).then_some(&body);
                match self.http.request(method.clone(), &url, body).await {
                    Ok(json) => ToolExecutionResult::Success(json),
                    Err(e) => {
                        log::warn!("tools: {} failed: {e}", tool.id);
                        ToolExecutionResult::Error(e.to_string())
                    }
                }
            }
            ToolKind::Prompt { template } => match template.render(args) {
                Err(e) => ToolExecutionResult::Error(e.to_string()),
                Ok(prompt) => match self.model.generate(GenerateRequest::new(prompt)).await {
                    Ok(text) => ToolExecutionResult::Success(Value::String(text.trim().to_string())),
                    Err(e) => {
                        log::warn!("tools: prompt tool {} failed: {e}", tool.id);
                        ToolExecutionResult::Error(e.to_string())
                    }
                },
            },
            ToolKind::Static(StaticResponse::Text(text)) => {
                ToolExecutionResult::Success(Value::String(text.clone()))
            }
            ToolKind::Static(StaticResponse::Template(template)) => match template.render(args) {
                Ok(text) => ToolExecutionResult::Success(Value::String(text)),
                Err(e) => ToolExecutionResult::Error(e.to_string()),
            },
            ToolKind::Rag => {
                let result = match self.retriever.retrieve(last_user_utterance).await {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("tools: retrieval failed: {e}");
                        json!({ "error": e.to_string() })
                    }
                };
                return Dispatched::Retrieval(result);
            }
        };
        Dispatched::Done(result)
    }

    async fn summarize(&self, items: &[ExecutedCall]) -> ToolExecutionResult {
        let payload: Vec<Value> = items.iter().map(ExecutedCall::summary_item).collect();
        let request =
            GenerateRequest::new(summary_prompt(&payload)).with_system(SUMMARY_SYSTEM_INSTRUCTION);

        match self.model.generate(request).await {
            Ok(text) => ToolExecutionResult::Success(Value::String(text.trim().to_string())),
            Err(e) => {
                log::warn!("tools: summarisation failed: {e}");
                ToolExecutionResult::Error(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
