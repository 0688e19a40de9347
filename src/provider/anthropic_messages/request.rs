use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::LLMError;
use crate::types::{ChatRequest, Message, ParameterSchema, Role, ToolCall, ToolDefinition, ToolResult};

/// `max_tokens` sent when the caller does not choose one; the API requires it.
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

/// Builds a Messages body.
///
/// System messages fold into the top-level `system` field, tool results travel as
/// `tool_result` blocks inside user turns, and consecutive same-role turns are merged
/// because the API expects strict user/assistant alternation.
pub(crate) fn build_anthropic_body(request: &ChatRequest, model: &str) -> Result<Value, LLMError> {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));

    let mut system_texts = Vec::new();
    let mut messages: Vec<Value> = Vec::new();
    for message in &request.messages {
        if message.role == Role::System {
            if let Some(text) = message.content.as_deref().filter(|text| !text.is_empty()) {
                system_texts.push(text.to_string());
            }
            continue;
        }
        let converted = convert_message(message)?;
        push_merged(&mut messages, converted);
    }

    if messages.is_empty() {
        return Err(LLMError::validation(
            "Anthropic Messages request requires at least one user or assistant message",
        ));
    }
    body.insert("messages".to_string(), Value::Array(messages));
    if !system_texts.is_empty() {
        body.insert(
            "system".to_string(),
            Value::String(system_texts.join("\n\n")),
        );
    }
    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            Value::Array(convert_tools(&request.tools)?),
        );
    }
    let max_tokens = request
        .options
        .get("max_tokens")
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_MAX_TOKENS));
    body.insert("max_tokens".to_string(), max_tokens);
    for (k, v) in &request.options {
        body.entry(k.clone()).or_insert_with(|| v.clone());
    }
    Ok(Value::Object(body))
}

/// Appends `message`, folding its blocks into the previous entry when roles match.
///
/// The API rejects empty text blocks, so a turn with no content is dropped and the
/// turns around it may end up merged.
fn push_merged(messages: &mut Vec<Value>, message: Value) {
    let blocks_empty = message["content"].as_array().is_none_or(Vec::is_empty);
    if blocks_empty {
        debug!(
            role = message["role"].as_str().unwrap_or_default(),
            position = messages.len(),
            "dropping turn without content blocks"
        );
        return;
    }
    if let Some(last) = messages.last_mut() {
        if last["role"] == message["role"] {
            if let (Some(existing), Some(incoming)) =
                (last["content"].as_array_mut(), message["content"].as_array())
            {
                existing.extend(incoming.iter().cloned());
                return;
            }
        }
    }
    messages.push(message);
}

/// Renders one non-system message as `{role, content: [blocks]}`.
pub(crate) fn convert_message(message: &Message) -> Result<Value, LLMError> {
    match message.role {
        Role::System => Ok(json!({
            "system": message.content.clone().unwrap_or_default()
        })),
        Role::User => Ok(json!({
            "role": "user",
            "content": text_block(message.content.as_deref()).into_iter().collect::<Vec<_>>()
        })),
        Role::Assistant => {
            let mut blocks: Vec<Value> = text_block(message.content.as_deref()).into_iter().collect();
            for call in message.tool_calls() {
                blocks.push(convert_tool_call(call)?);
            }
            Ok(json!({"role": "assistant", "content": blocks}))
        }
        Role::Tool => {
            let result = message
                .tool_result()
                .ok_or_else(|| LLMError::validation("tool message carries no result"))?;
            Ok(json!({
                "role": "user",
                "content": [convert_tool_result(&result)?]
            }))
        }
    }
}

fn text_block(text: Option<&str>) -> Option<Value> {
    text.filter(|text| !text.is_empty())
        .map(|text| json!({"type": "text", "text": text}))
}

pub(crate) fn convert_tool_call(call: &ToolCall) -> Result<Value, LLMError> {
    if call.id.is_empty() {
        return Err(LLMError::validation(format!(
            "tool call `{}` has no id (required as tool_use id)",
            call.name
        )));
    }
    Ok(json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.name,
        "input": call.arguments
    }))
}

pub(crate) fn convert_tool_result(result: &ToolResult) -> Result<Value, LLMError> {
    if result.call_id.is_empty() {
        return Err(LLMError::validation(
            "tool_result requires the originating call id (tool_use_id)",
        ));
    }
    Ok(json!({
        "type": "tool_result",
        "tool_use_id": result.call_id,
        "content": result.content
    }))
}

fn convert_tools(tools: &[ToolDefinition]) -> Result<Vec<Value>, LLMError> {
    tools
        .iter()
        .map(|tool| {
            tool.validate()?;
            let schema = tool.function.parameters.clone().unwrap_or_default();
            let input_schema = serde_json::to_value::<ParameterSchema>(schema)
                .map_err(|err| LLMError::unsupported_tool(tool.name(), err.to_string()))?;
            let mut obj = Map::new();
            obj.insert("name".to_string(), Value::String(tool.name().to_string()));
            if let Some(description) = &tool.function.description {
                obj.insert(
                    "description".to_string(),
                    Value::String(description.clone()),
                );
            }
            obj.insert("input_schema".to_string(), input_schema);
            Ok(Value::Object(obj))
        })
        .collect()
}
