use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::LLMError;
use crate::types::{ChatRequest, Message, Role, ToolCall, ToolDefinition, ToolResult};

use super::schema::convert_declaration;

/// Caller option names that belong under `generationConfig`, with their Gemini names.
const GENERATION_OPTIONS: [(&str, &str); 12] = [
    ("temperature", "temperature"),
    ("top_p", "topP"),
    ("top_k", "topK"),
    ("max_tokens", "maxOutputTokens"),
    ("max_output_tokens", "maxOutputTokens"),
    ("stop", "stopSequences"),
    ("candidate_count", "candidateCount"),
    ("presence_penalty", "presencePenalty"),
    ("frequency_penalty", "frequencyPenalty"),
    ("response_mime_type", "responseMimeType"),
    ("response_schema", "responseSchema"),
    ("seed", "seed"),
];

/// Builds a `generateContent` body.
///
/// Assistant turns use role `model`; tool results become `functionResponse` parts in
/// a `user` turn, correlated by function name. Consecutive same-role turns are merged.
pub(crate) fn build_gemini_body(request: &ChatRequest) -> Result<Value, LLMError> {
    let mut body = Map::new();

    let mut system_texts = Vec::new();
    let mut contents: Vec<Value> = Vec::new();
    for message in &request.messages {
        if message.role == Role::System {
            if let Some(text) = message.content.as_deref().filter(|text| !text.is_empty()) {
                system_texts.push(text.to_string());
            }
            continue;
        }
        push_merged(&mut contents, convert_message(message)?);
    }

    if contents.is_empty() {
        return Err(LLMError::validation(
            "Gemini generateContent request requires at least one user or assistant message",
        ));
    }
    body.insert("contents".to_string(), Value::Array(contents));

    if !system_texts.is_empty() {
        body.insert(
            "system_instruction".to_string(),
            json!({"parts": [{"text": system_texts.join("\n\n")}]}),
        );
    }

    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            json!([{"functionDeclarations": convert_tools(&request.tools)?}]),
        );
    }

    let (generation, passthrough) = split_options(&request.options);
    if let Some(config) = generation {
        body.insert("generationConfig".to_string(), Value::Object(config));
    }
    for (k, v) in passthrough {
        body.entry(k).or_insert(v);
    }

    Ok(Value::Object(body))
}

/// Separates sampling options from top-level pass-through fields.
///
/// An explicit `generationConfig` option is kept and mapped options fill in around it.
fn split_options(options: &Map<String, Value>) -> (Option<Map<String, Value>>, Map<String, Value>) {
    let mut config: Option<Map<String, Value>> = match options.get("generationConfig") {
        Some(Value::Object(explicit)) => Some(explicit.clone()),
        _ => None,
    };
    let mut passthrough = Map::new();
    for (key, value) in options {
        if key == "generationConfig" && value.is_object() {
            continue;
        }
        match GENERATION_OPTIONS.iter().find(|(name, _)| *name == key.as_str()) {
            Some((_, gemini_name)) => {
                let value = match (*gemini_name, value) {
                    ("stopSequences", Value::String(stop)) => json!([stop]),
                    _ => value.clone(),
                };
                config
                    .get_or_insert_with(Map::new)
                    .entry(gemini_name.to_string())
                    .or_insert(value);
            }
            None => {
                passthrough.insert(key.clone(), value.clone());
            }
        }
    }
    (config, passthrough)
}

/// Appends `content`, folding its parts into the previous entry when roles match.
///
/// Gemini rejects a `Content` without parts, so an empty turn is dropped and the
/// turns around it may end up merged.
fn push_merged(contents: &mut Vec<Value>, content: Value) {
    let parts_empty = content["parts"].as_array().is_none_or(Vec::is_empty);
    if parts_empty {
        debug!(
            role = content["role"].as_str().unwrap_or_default(),
            position = contents.len(),
            "dropping turn without parts"
        );
        return;
    }
    if let Some(last) = contents.last_mut() {
        if last["role"] == content["role"] {
            if let (Some(existing), Some(incoming)) =
                (last["parts"].as_array_mut(), content["parts"].as_array())
            {
                existing.extend(incoming.iter().cloned());
                return;
            }
        }
    }
    contents.push(content);
}

/// Renders one message as a Gemini `Content`.
pub(crate) fn convert_message(message: &Message) -> Result<Value, LLMError> {
    let text_part = message
        .content
        .as_deref()
        .filter(|text| !text.is_empty())
        .map(|text| json!({"text": text}));
    match message.role {
        Role::System => Ok(json!({
            "parts": text_part.into_iter().collect::<Vec<_>>()
        })),
        Role::User => Ok(json!({
            "role": "user",
            "parts": text_part.into_iter().collect::<Vec<_>>()
        })),
        Role::Assistant => {
            let mut parts: Vec<Value> = text_part.into_iter().collect();
            parts.extend(message.tool_calls().iter().map(convert_tool_call));
            Ok(json!({"role": "model", "parts": parts}))
        }
        Role::Tool => {
            let result = message
                .tool_result()
                .ok_or_else(|| LLMError::validation("tool message carries no result"))?;
            Ok(json!({
                "role": "user",
                "parts": [convert_tool_result(&result)?]
            }))
        }
    }
}

pub(crate) fn convert_tool_call(call: &ToolCall) -> Value {
    let mut function_call = json!({
        "name": call.name,
        "args": call.arguments
    });
    if !call.id.is_empty() {
        function_call["id"] = Value::String(call.id.clone());
    }
    json!({"functionCall": function_call})
}

pub(crate) fn convert_tool_result(result: &ToolResult) -> Result<Value, LLMError> {
    if result.name.is_empty() {
        return Err(LLMError::validation(
            "Gemini correlates tool results by function name; the result has none",
        ));
    }
    let mut function_response = json!({
        "name": result.name,
        "response": {
            "name": result.name,
            "content": result.content
        }
    });
    // Newer models issue call ids; echo them back so parallel calls stay paired.
    if !result.call_id.is_empty() {
        function_response["id"] = Value::String(result.call_id.clone());
    }
    Ok(json!({"functionResponse": function_response}))
}

fn convert_tools(tools: &[ToolDefinition]) -> Result<Vec<Value>, LLMError> {
    tools.iter().map(convert_declaration).collect()
}
