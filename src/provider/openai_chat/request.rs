use serde_json::{Map, Value, json};

use crate::error::LLMError;
use crate::types::{ChatRequest, Message, Role, ToolCall, ToolDefinition};

/// Builds a Chat Completions body. Pass-through options never override `model`,
/// `messages` or `tools`.
pub(crate) fn build_openai_body(request: &ChatRequest, model: &str) -> Result<Value, LLMError> {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        Value::Array(convert_messages(&request.messages)?),
    );
    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            Value::Array(convert_tools(&request.tools)?),
        );
    }
    for (k, v) in &request.options {
        body.entry(k.clone()).or_insert_with(|| v.clone());
    }
    Ok(Value::Object(body))
}

fn convert_messages(messages: &[Message]) -> Result<Vec<Value>, LLMError> {
    messages.iter().map(convert_message).collect()
}

pub(crate) fn convert_message(message: &Message) -> Result<Value, LLMError> {
    let mut obj = Map::new();
    obj.insert(
        "role".to_string(),
        Value::String(message.role.as_str().to_string()),
    );

    if message.role == Role::Tool {
        let call_id = message
            .tool_call_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LLMError::validation("tool message missing tool_call_id"))?;
        obj.insert("tool_call_id".to_string(), Value::String(call_id.to_string()));
        if let Some(name) = &message.name {
            obj.insert("name".to_string(), Value::String(name.clone()));
        }
        obj.insert(
            "content".to_string(),
            Value::String(message.content.clone().unwrap_or_default()),
        );
        return Ok(Value::Object(obj));
    }

    if let Some(name) = &message.name {
        obj.insert("name".to_string(), Value::String(name.clone()));
    }
    obj.insert(
        "content".to_string(),
        message.content.clone().map(Value::String).unwrap_or(Value::Null),
    );
    let calls = message.tool_calls();
    if !calls.is_empty() {
        let calls = calls
            .iter()
            .map(convert_tool_call)
            .collect::<Result<Vec<_>, _>>()?;
        obj.insert("tool_calls".to_string(), Value::Array(calls));
    }
    Ok(Value::Object(obj))
}

pub(crate) fn convert_tool_call(call: &ToolCall) -> Result<Value, LLMError> {
    if call.id.is_empty() {
        return Err(LLMError::validation(format!(
            "tool call `{}` has no id",
            call.name
        )));
    }
    let arguments = serde_json::to_string(&call.arguments)
        .map_err(|err| LLMError::validation(format!("invalid tool arguments: {err}")))?;
    Ok(json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": arguments
        }
    }))
}

/// The canonical schema is already OpenAI's, so definitions pass through once validated.
fn convert_tools(tools: &[ToolDefinition]) -> Result<Vec<Value>, LLMError> {
    tools
        .iter()
        .map(|tool| {
            tool.validate()?;
            serde_json::to_value(tool)
                .map_err(|err| LLMError::unsupported_tool(tool.name(), err.to_string()))
        })
        .collect()
}
