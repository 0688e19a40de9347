use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{ChatResult, FinishReason, TokenUsage, ToolCall};

use super::types::{GeminiFunctionCall, GeminiGenerateContentResponse, GeminiUsageMetadata};

/// Maps the first candidate. Text parts are concatenated, `functionCall` parts become
/// tool calls with an empty id unless the API issued one.
pub(crate) fn map_response(
    resp: GeminiGenerateContentResponse,
    raw: Value,
    model: String,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let block_reason = resp
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let message = match block_reason {
            Some(reason) => format!("response has no candidates (prompt blocked: {reason})"),
            None => "response has no candidates".to_string(),
        };
        return Err(LLMError::malformed(provider, message));
    };
    let finish_reason = candidate.finish_reason;
    let Some(content) = candidate.content else {
        return Err(LLMError::malformed(
            provider,
            format!(
                "first candidate has no content (finishReason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            ),
        ));
    };

    let mut text: Option<String> = None;
    let mut tool_calls = Vec::new();
    for part in content.parts {
        if let Some(call) = part.function_call {
            tool_calls.push(convert_function_call(call, provider)?);
        } else if let Some(fragment) = part.text {
            if part.thought != Some(true) {
                text.get_or_insert_with(String::new).push_str(&fragment);
            }
        }
    }

    Ok(ChatResult {
        model,
        message: text,
        tool_calls,
        raw,
        finish_reason: finish_reason.as_deref().map(convert_finish_reason),
        usage: resp.usage_metadata.map(convert_usage),
    })
}

fn convert_function_call(call: GeminiFunctionCall, provider: &'static str) -> Result<ToolCall, LLMError> {
    let arguments = match call.args {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(LLMError::malformed(
                provider,
                format!("functionCall args of `{}` are not an object: {other}", call.name),
            ));
        }
    };
    Ok(ToolCall {
        id: call.id.unwrap_or_default(),
        name: call.name,
        arguments,
    })
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        "MALFORMED_FUNCTION_CALL" => FinishReason::ToolCalls,
        other => FinishReason::Other(other.to_string()),
    }
}

fn convert_usage(usage: GeminiUsageMetadata) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    }
}
