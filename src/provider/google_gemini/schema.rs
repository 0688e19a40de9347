//! JSON-schema to Gemini `Schema` translation.
//!
//! Gemini accepts an OpenAPI subset with upper-case type names. Keywords outside that
//! subset are rejected rather than dropped, so a declaration never silently loses a
//! constraint.

use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::ToolDefinition;

const TYPES: [&str; 7] = ["string", "number", "integer", "boolean", "array", "object", "null"];

/// Builds one `functionDeclarations` entry.
pub(crate) fn convert_declaration(tool: &ToolDefinition) -> Result<Value, LLMError> {
    tool.validate()?;
    let name = tool.name();
    let mut decl = Map::new();
    decl.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(description) = &tool.function.description {
        decl.insert(
            "description".to_string(),
            Value::String(description.clone()),
        );
    }
    if let Some(params) = &tool.function.parameters {
        // Gemini rejects OBJECT schemas without properties; a no-argument function
        // simply omits `parameters`.
        if !params.properties.is_empty() || !params.extra.is_empty() {
            let mut schema = params.extra.clone();
            schema.insert("type".to_string(), Value::String(params.kind.clone()));
            schema.insert(
                "properties".to_string(),
                Value::Object(params.properties.clone()),
            );
            if !params.required.is_empty() {
                schema.insert(
                    "required".to_string(),
                    Value::Array(params.required.iter().cloned().map(Value::String).collect()),
                );
            }
            decl.insert(
                "parameters".to_string(),
                convert_schema(name, "parameters", &Value::Object(schema))?,
            );
        }
    }
    Ok(Value::Object(decl))
}

/// Recursively rewrites one schema node.
pub(crate) fn convert_schema(tool: &str, path: &str, schema: &Value) -> Result<Value, LLMError> {
    let Some(node) = schema.as_object() else {
        return Err(LLMError::unsupported_tool(
            tool,
            format!("`{path}` must be a schema object"),
        ));
    };
    let mut out = Map::new();
    for (key, value) in node {
        match key.as_str() {
            "type" => {
                let (kind, nullable) = convert_type(tool, path, value)?;
                out.insert("type".to_string(), Value::String(kind));
                if nullable {
                    out.insert("nullable".to_string(), Value::Bool(true));
                }
            }
            "properties" => {
                let Some(props) = value.as_object() else {
                    return Err(LLMError::unsupported_tool(
                        tool,
                        format!("`{path}.properties` must be an object"),
                    ));
                };
                let mut converted = Map::new();
                for (prop, prop_schema) in props {
                    converted.insert(
                        prop.clone(),
                        convert_schema(tool, &format!("{path}.{prop}"), prop_schema)?,
                    );
                }
                out.insert("properties".to_string(), Value::Object(converted));
            }
            "items" => {
                out.insert(
                    "items".to_string(),
                    convert_schema(tool, &format!("{path}[]"), value)?,
                );
            }
            "description" | "required" | "enum" | "format" | "nullable" => {
                out.insert(key.clone(), value.clone());
            }
            other => {
                return Err(LLMError::unsupported_tool(
                    tool,
                    format!("schema keyword `{other}` at `{path}` has no Gemini equivalent"),
                ));
            }
        }
    }
    Ok(Value::Object(out))
}

/// Upper-cases a type name. `["T", "null"]` becomes `T` plus `nullable`.
fn convert_type(tool: &str, path: &str, value: &Value) -> Result<(String, bool), LLMError> {
    let unsupported = || {
        LLMError::unsupported_tool(tool, format!("unsupported type {value} at `{path}`"))
    };
    match value {
        Value::String(kind) if TYPES.contains(&kind.as_str()) && kind != "null" => {
            Ok((kind.to_ascii_uppercase(), false))
        }
        Value::Array(kinds) => {
            let mut nullable = false;
            let mut concrete = Vec::new();
            for kind in kinds {
                match kind.as_str() {
                    Some("null") => nullable = true,
                    Some(kind) if TYPES.contains(&kind) => concrete.push(kind),
                    _ => return Err(unsupported()),
                }
            }
            match concrete.as_slice() {
                [kind] => Ok((kind.to_ascii_uppercase(), nullable)),
                _ => Err(unsupported()),
            }
        }
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multiply_numbers_declaration_is_upper_cased() {
        let tool = ToolDefinition::function("multiply_numbers", "Multiply two integers")
            .with_parameter("a", json!({"type": "integer"}), true)
            .with_parameter("b", json!({"type": "integer"}), true);
        let decl = convert_declaration(&tool).unwrap();
        assert_eq!(
            decl,
            json!({
                "name": "multiply_numbers",
                "description": "Multiply two integers",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {"a": {"type": "INTEGER"}, "b": {"type": "INTEGER"}},
                    "required": ["a", "b"]
                }
            })
        );
    }

    #[test]
    fn nested_arrays_and_enums_are_translated() {
        let schema = json!({
            "type": "object",
            "properties": {
                "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]},
                "days": {"type": "array", "items": {"type": ["integer", "null"]}}
            }
        });
        let converted = convert_schema("forecast", "parameters", &schema).unwrap();
        assert_eq!(converted["properties"]["unit"]["type"], json!("STRING"));
        assert_eq!(converted["properties"]["unit"]["enum"], json!(["celsius", "fahrenheit"]));
        let items = &converted["properties"]["days"]["items"];
        assert_eq!(items["type"], json!("INTEGER"));
        assert_eq!(items["nullable"], json!(true));
    }

    #[test]
    fn unknown_keywords_fail_fast() {
        let tool: ToolDefinition = serde_json::from_value(json!({
            "type": "function",
            "function": {
                "name": "strict_tool",
                "parameters": {
                    "type": "object",
                    "properties": {"q": {"type": "string", "pattern": "^a"}}
                }
            }
        }))
        .unwrap();
        match convert_declaration(&tool) {
            Err(LLMError::UnsupportedToolSchema { tool, reason }) => {
                assert_eq!(tool, "strict_tool");
                assert!(reason.contains("pattern"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn no_argument_function_omits_parameters() {
        let tool: ToolDefinition = serde_json::from_value(json!({
            "type": "function",
            "function": {"name": "now", "parameters": {"type": "object", "properties": {}}}
        }))
        .unwrap();
        let decl = convert_declaration(&tool).unwrap();
        assert!(decl.get("parameters").is_none());
    }
}
