//! Canonical chat data shared by every provider adapter.
//!
//! These types carry no vendor knowledge. Adapters translate them to and from their
//! own wire formats, so the rest of the crate never branches on vendor structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LLMError;

mod tool;

pub use tool::{FunctionDefinition, ParameterSchema, ToolDefinition};

/// Canonical chat role. Each adapter maps it onto its own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Requested invocation of a named function, produced by an adapter from a vendor
/// response.
///
/// `id` is empty when the vendor does not issue call identifiers (Gemini correlates
/// tool results by function name instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Output of a locally executed tool, correlated to the [`ToolCall`] that asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
}

impl ToolResult {
    /// Builds a result answering `call`.
    pub fn for_call(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        }
    }
}

/// One chat turn.
///
/// `content` and `tool_calls` are never both absent unless the role is
/// [`Role::Tool`]; tool messages carry a [`ToolResult`] in `tool_call_id`, `name`
/// and `content` instead. The serialized form is the persisted history record.
///
/// # Examples
///
/// ```
/// # use muxllm::types::{Message, Role};
/// let msg = Message::user("Translate Hola to english");
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(msg.content.as_deref(), Some("Translate Hola to english"));
/// assert!(msg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn carrying tool calls and optional accompanying text.
    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-role message answering a previous call.
    pub fn tool(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.content),
            tool_calls: None,
            tool_call_id: Some(result.call_id),
            name: Some(result.name),
        }
    }

    /// Tool calls requested by this message, empty when there are none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Recovers the [`ToolResult`] carried by a tool-role message.
    pub fn tool_result(&self) -> Option<ToolResult> {
        if self.role != Role::Tool {
            return None;
        }
        Some(ToolResult {
            call_id: self.tool_call_id.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            content: self.content.clone().unwrap_or_default(),
        })
    }

    /// Checks the structural invariants of a canonical message.
    pub fn validate(&self) -> Result<(), LLMError> {
        let has_calls = !self.tool_calls().is_empty();
        match self.role {
            Role::Tool => {
                if has_calls {
                    return Err(LLMError::validation("tool message cannot carry tool calls"));
                }
                if self.tool_call_id.is_none() && self.name.is_none() {
                    return Err(LLMError::validation(
                        "tool message needs a tool_call_id or a name to correlate with its call",
                    ));
                }
            }
            Role::Assistant => {
                if self.content.is_none() && !has_calls {
                    return Err(LLMError::validation(
                        "assistant message has neither content nor tool calls",
                    ));
                }
            }
            Role::System | Role::User => {
                if has_calls {
                    return Err(LLMError::validation(format!(
                        "{} message cannot carry tool calls",
                        self.role.as_str()
                    )));
                }
                if self.content.is_none() {
                    return Err(LLMError::validation(format!(
                        "{} message has no content",
                        self.role.as_str()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Per-call options.
///
/// `model` and `tools` are the only keys the dispatcher interprets. Everything in
/// `extra` (temperature, max_tokens, tool_choice, ...) is forwarded to the adapter
/// untouched, in insertion order.
///
/// # Examples
///
/// ```
/// # use muxllm::types::ChatOptions;
/// # use serde_json::json;
/// let options = ChatOptions::new()
///     .with_model("gpt-4-turbo")
///     .with_option("temperature", json!(0.2));
/// assert_eq!(options.model.as_deref(), Some("gpt-4-turbo"));
/// assert_eq!(options.extra["temperature"], json!(0.2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Adds an opaque pass-through option.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Splits a free-form option map into recognized keys and pass-through options.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when `model` is not a string or `tools` is not a
    /// list of canonical tool definitions.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, LLMError> {
        let model = match map.shift_remove("model") {
            None | Some(Value::Null) => None,
            Some(Value::String(model)) => Some(model),
            Some(other) => {
                return Err(LLMError::validation(format!(
                    "option `model` must be a string, got {other}"
                )));
            }
        };
        let tools = match map.shift_remove("tools") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value).map_err(|err| {
                LLMError::validation(format!("option `tools` is not a list of tool definitions: {err}"))
            })?,
        };
        Ok(Self {
            model,
            tools,
            extra: map,
        })
    }

    /// Layers `self` over `defaults`; values set on `self` win.
    pub fn merged_over(self, defaults: &ChatOptions) -> ChatOptions {
        let mut extra = defaults.extra.clone();
        for (key, value) in self.extra {
            extra.insert(key, value);
        }
        ChatOptions {
            model: self.model.or_else(|| defaults.model.clone()),
            tools: if self.tools.is_empty() {
                defaults.tools.clone()
            } else {
                self.tools
            },
            extra,
        }
    }
}

/// Input handed to [`crate::provider::LLMProvider::send`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// Full conversation, oldest first.
    pub messages: Vec<Message>,
    /// Model name as supplied by the caller; the adapter resolves aliases.
    pub model: String,
    pub tools: Vec<ToolDefinition>,
    /// Pass-through vendor options.
    pub options: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: model.into(),
            tools: Vec::new(),
            options: Map::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

/// Normalized outcome of one vendor call.
///
/// `tool_calls` is empty, never absent, when the vendor issued none. `raw` holds the
/// vendor payload for debugging and is never parsed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    /// Resolved model name actually sent to the vendor.
    pub model: String,
    pub message: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl ChatResult {
    /// Assistant turn to append to history.
    ///
    /// Content falls back to an empty string when the vendor returned neither text nor
    /// tool calls, so the message stays valid.
    pub fn to_message(&self) -> Message {
        let content = match (&self.message, self.tool_calls.is_empty()) {
            (Some(text), _) => Some(text.clone()),
            (None, true) => Some(String::new()),
            (None, false) => None,
        };
        Message::assistant_with_tool_calls(content, self.tool_calls.clone())
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token accounting reported by the vendor, when available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Why the vendor stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

/// Describes how an adapter behaves around tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Whether tool definitions are forwarded at all.
    pub supports_tools: bool,
    /// Whether one turn may request several tool calls.
    pub supports_parallel_tool_calls: bool,
    /// Whether text and tool calls may co-occur in one assistant turn.
    pub mixes_text_and_tool_calls: bool,
    /// Whether the vendor issues tool call identifiers.
    pub issues_tool_call_ids: bool,
    /// Whether system messages stay inline instead of being hoisted to a top-level field.
    pub inline_system_messages: bool,
}
