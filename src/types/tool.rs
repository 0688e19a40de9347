use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LLMError;

const FUNCTION_KIND: &str = "function";
const MAX_NAME_LEN: usize = 64;

fn function_kind() -> String {
    FUNCTION_KIND.to_string()
}

/// Canonical tool declaration in OpenAI-style JSON-schema form.
///
/// ```json
/// {"type": "function", "function": {"name": "...", "description": "...",
///   "parameters": {"type": "object", "properties": {...}, "required": [...]}}}
/// ```
///
/// # Examples
///
/// ```
/// # use muxllm::types::ToolDefinition;
/// # use serde_json::json;
/// let tool = ToolDefinition::function("multiply_numbers", "Multiply two integers")
///     .with_parameter("a", json!({"type": "integer"}), true)
///     .with_parameter("b", json!({"type": "integer"}), true);
/// assert!(tool.validate().is_ok());
/// assert_eq!(tool.required(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSchema>,
}

/// Top-level parameter object of a function.
///
/// Keywords other than `type`, `properties` and `required` land in `extra` so each
/// adapter can decide whether it can express them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default = "object_kind")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn object_kind() -> String {
    "object".to_string()
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            kind: object_kind(),
            properties: Map::new(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: None,
            },
        }
    }

    /// Declares one parameter, creating the parameter object on first use.
    pub fn with_parameter(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        let params = self.function.parameters.get_or_insert_with(ParameterSchema::default);
        if required && !params.required.contains(&name) {
            params.required.push(name.clone());
        }
        params.properties.insert(name, schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn required(&self) -> &[String] {
        self.function
            .parameters
            .as_ref()
            .map(|params| params.required.as_slice())
            .unwrap_or_default()
    }

    /// Rejects declarations no adapter can translate faithfully.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::UnsupportedToolSchema`] naming the offending tool.
    pub fn validate(&self) -> Result<(), LLMError> {
        let name = self.name();
        if self.kind != FUNCTION_KIND {
            return Err(LLMError::unsupported_tool(
                name,
                format!("tool type `{}` is not `function`", self.kind),
            ));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(LLMError::unsupported_tool(
                name,
                format!("name must be 1 to {MAX_NAME_LEN} characters"),
            ));
        }
        if !name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Err(LLMError::unsupported_tool(
                name,
                "name may only contain ASCII letters, digits, `_` and `-`",
            ));
        }
        let Some(params) = &self.function.parameters else {
            return Ok(());
        };
        if params.kind != "object" {
            return Err(LLMError::unsupported_tool(
                name,
                format!("parameters must have type `object`, got `{}`", params.kind),
            ));
        }
        for (prop, schema) in &params.properties {
            if !schema.is_object() {
                return Err(LLMError::unsupported_tool(
                    name,
                    format!("property `{prop}` must be a schema object"),
                ));
            }
        }
        if let Some(missing) = params
            .required
            .iter()
            .find(|req| !params.properties.contains_key(req.as_str()))
        {
            return Err(LLMError::unsupported_tool(
                name,
                format!("required parameter `{missing}` is not declared in properties"),
            ));
        }
        Ok(())
    }
}
