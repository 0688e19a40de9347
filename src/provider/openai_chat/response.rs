use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{ChatResult, FinishReason, TokenUsage, ToolCall};

use super::types::{
    OpenAiChatResponse, OpenAiMessageContent, OpenAiToolCallResponse, OpenAiUsage,
};

/// Maps the first choice. Text and tool calls may co-occur in one turn.
pub(crate) fn map_response(
    resp: OpenAiChatResponse,
    raw: Value,
    model: String,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::malformed(provider, "response has no choices"))?;
    let message = choice
        .message
        .ok_or_else(|| LLMError::malformed(provider, "first choice has no message"))?;

    let text = match message.content {
        None => None,
        Some(OpenAiMessageContent::Text(text)) => Some(text),
        Some(OpenAiMessageContent::Parts(parts)) => {
            let texts: Vec<String> = parts
                .into_iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text)
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join(""))
            }
        }
    };
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| convert_tool_call_response(call, provider))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChatResult {
        model,
        message: text,
        tool_calls,
        raw,
        finish_reason: choice.finish_reason.as_deref().map(convert_finish_reason),
        usage: resp.usage.map(convert_usage),
    })
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn convert_tool_call_response(
    call: OpenAiToolCallResponse,
    provider: &'static str,
) -> Result<ToolCall, LLMError> {
    if let Some(kind) = call.kind.as_deref().filter(|kind| *kind != "function") {
        return Err(LLMError::malformed(
            provider,
            format!("unsupported tool call type `{kind}`"),
        ));
    }
    let function = call
        .function
        .ok_or_else(|| LLMError::malformed(provider, "tool call has no function"))?;
    let name = function
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| LLMError::malformed(provider, "tool call has no function name"))?;
    let arguments = parse_arguments(function.arguments.as_deref(), &name, provider)?;
    Ok(ToolCall {
        id: call.id.unwrap_or_default(),
        name,
        arguments,
    })
}

/// Arguments arrive as a JSON-encoded string. Blank means no arguments.
fn parse_arguments(
    raw: Option<&str>,
    name: &str,
    provider: &'static str,
) -> Result<Map<String, Value>, LLMError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(LLMError::malformed(
            provider,
            format!("arguments of `{name}` are not an object: {other}"),
        )),
        Err(err) => Err(LLMError::malformed(
            provider,
            format!("arguments of `{name}` are not valid JSON: {err}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::decode_response;
    use serde_json::json;

    fn map(body: Value) -> Result<ChatResult, LLMError> {
        let (raw, parsed) = decode_response::<OpenAiChatResponse>("openai", &body.to_string())?;
        map_response(parsed, raw, "gpt-4-turbo".into(), "openai")
    }

    #[test]
    fn map_response_text_only() {
        let result = map(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4-turbo-2024-04-09",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello world"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(result.model, "gpt-4-turbo");
        assert_eq!(result.message.as_deref(), Some("hello world"));
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.finish_reason, Some(FinishReason::Stop));
        assert_eq!(result.usage.unwrap().total_tokens, Some(15));
        assert_eq!(result.raw["id"], json!("chatcmpl-1"));
    }

    #[test]
    fn map_response_with_text_and_tool_calls() {
        let result = map(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Let me check.",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Boston, MA\"}"}
                    }, {
                        "id": "call_2",
                        "type": "function",
                        "function": {"name": "get_time", "arguments": ""}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        assert_eq!(result.message.as_deref(), Some("Let me check."));
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].id, "call_1");
        assert_eq!(result.tool_calls[0].arguments["location"], json!("Boston, MA"));
        assert!(result.tool_calls[1].arguments.is_empty());
        assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn content_parts_are_joined() {
        let result = map(json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "a"},
                {"type": "refusal", "refusal": "no"},
                {"type": "text", "text": "b"}
            ]}}]
        }))
        .unwrap();
        assert_eq!(result.message.as_deref(), Some("ab"));
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert!(matches!(
            map(json!({"choices": []})),
            Err(LLMError::MalformedVendorResponse { .. })
        ));
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let err = map(json!({
            "choices": [{"message": {"tool_calls": [{
                "id": "c", "type": "function",
                "function": {"name": "f", "arguments": "[1,2]"}
            }]}}]
        }))
        .unwrap_err();
        assert!(matches!(err, LLMError::MalformedVendorResponse { .. }));
    }

    #[test]
    fn finish_reasons() {
        assert_eq!(convert_finish_reason("length"), FinishReason::Length);
        assert_eq!(convert_finish_reason("content_filter"), FinishReason::ContentFilter);
        assert_eq!(
            convert_finish_reason("eos"),
            FinishReason::Other("eos".to_string())
        );
    }
}
