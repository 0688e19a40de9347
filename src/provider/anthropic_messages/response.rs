use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{ChatResult, FinishReason, TokenUsage, ToolCall};

use super::types::{AnthropicContentBlock, AnthropicMessageResponse, AnthropicUsage};

/// Concatenates text blocks and lifts `tool_use` blocks into tool calls.
pub(crate) fn map_response(
    resp: AnthropicMessageResponse,
    raw: Value,
    model: String,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let mut text: Option<String> = None;
    let mut tool_calls = Vec::new();
    for block in resp.content {
        if block.kind == "text" {
            text.get_or_insert_with(String::new)
                .push_str(block.text.as_deref().unwrap_or_default());
        } else if block.kind == "tool_use" {
            tool_calls.push(convert_tool_use(block, provider)?);
        }
    }

    Ok(ChatResult {
        model,
        message: text,
        tool_calls,
        raw,
        finish_reason: resp.stop_reason.as_deref().map(convert_finish_reason),
        usage: resp.usage.map(convert_usage),
    })
}

fn convert_tool_use(block: AnthropicContentBlock, provider: &'static str) -> Result<ToolCall, LLMError> {
    let name = block
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| LLMError::malformed(provider, "tool_use block has no name"))?;
    let arguments = match block.input {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(LLMError::malformed(
                provider,
                format!("tool_use input of `{name}` is not an object: {other}"),
            ));
        }
    };
    Ok(ToolCall {
        id: block.id.unwrap_or_default(),
        name,
        arguments,
    })
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

fn convert_usage(usage: AnthropicUsage) -> TokenUsage {
    let total = match (usage.input_tokens, usage.output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };
    TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: total,
    }
}
