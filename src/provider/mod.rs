use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::registry::ModelRegistry;
use crate::types::{CapabilityDescriptor, ChatRequest, ChatResult, Message, ToolCall, ToolResult};

pub mod anthropic_messages;
pub mod catalog;
pub mod google_gemini;
pub mod openai_chat;
pub(crate) mod retry;

pub use anthropic_messages::AnthropicMessagesProvider;
pub use catalog::{ProviderKind, build_provider};
pub use google_gemini::GoogleGeminiProvider;
pub use openai_chat::OpenAiChatProvider;

/// Shared capability set every vendor adapter implements.
///
/// Adapters translate the canonical [`Message`] history into the vendor's request
/// body, perform exactly one HTTP call per [`LLMProvider::send`], and map the first
/// completion candidate back into a [`ChatResult`]. They never retry.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short vendor name used in errors and logs, such as `anthropic`.
    fn name(&self) -> &'static str;

    /// Availability and alias table consulted before any network call.
    fn registry(&self) -> &ModelRegistry;

    /// Resolves an alias (single hop) and checks availability.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::ModelUnavailable`] listing the permitted models.
    fn validate_model(&self, name: &str) -> Result<String, LLMError> {
        self.registry().resolve(name)
    }

    /// Sends the full history and returns the normalized first candidate.
    async fn send(&self, request: ChatRequest) -> Result<ChatResult, LLMError>;

    /// Vendor-native rendering of one canonical message.
    fn render_message(&self, message: &Message) -> Result<Value, LLMError>;

    /// Vendor-native rendering of a tool call inside an assistant turn.
    fn render_tool_call(&self, call: &ToolCall) -> Result<Value, LLMError>;

    /// Vendor-native rendering of a tool result turn.
    fn render_tool_result(&self, result: &ToolResult) -> Result<Value, LLMError>;

    /// Describes how the adapter behaves around tools and roles.
    fn capabilities(&self) -> CapabilityDescriptor;
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn LLMProvider>;

/// Rejects `stream: true`; this crate only performs complete request/response calls.
pub(crate) fn reject_streaming(options: &Map<String, Value>) -> Result<(), LLMError> {
    match options.get("stream") {
        Some(Value::Bool(true)) => Err(LLMError::UnsupportedFeature { feature: "stream" }),
        _ => Ok(()),
    }
}

/// Parses a 2xx body into the opaque payload and the narrow typed view adapters read.
pub(crate) fn decode_response<T: DeserializeOwned>(
    provider: &'static str,
    text: &str,
) -> Result<(Value, T), LLMError> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|err| LLMError::malformed(provider, format!("response is not JSON: {err}")))?;
    let parsed = T::deserialize(&raw)
        .map_err(|err| LLMError::malformed(provider, format!("unexpected response shape: {err}")))?;
    Ok((raw, parsed))
}

/// Extracts the vendor's error message, or falls back to the bare status.
pub(crate) fn vendor_failure(
    provider: &'static str,
    status: u16,
    body: &str,
    message: Option<String>,
    retry_after: Option<std::time::Duration>,
) -> LLMError {
    LLMError::VendorRequestFailed {
        provider,
        status: Some(status),
        message: message.unwrap_or_else(|| format!("status {status}")),
        body: if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        },
        retry_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn stream_option_is_rejected() {
        let mut options = Map::new();
        options.insert("stream".into(), json!(false));
        assert!(reject_streaming(&options).is_ok());
        options.insert("stream".into(), json!(true));
        assert!(matches!(
            reject_streaming(&options),
            Err(LLMError::UnsupportedFeature { feature: "stream" })
        ));
    }

    #[test]
    fn decode_response_keeps_raw_payload() {
        #[derive(Deserialize)]
        struct Narrow {
            id: String,
        }
        let (raw, narrow): (Value, Narrow) =
            decode_response("openai", r#"{"id":"x","extra":{"deep":true}}"#).unwrap();
        assert_eq!(narrow.id, "x");
        assert_eq!(raw["extra"]["deep"], json!(true));
    }

    #[test]
    fn decode_response_reports_malformed_json() {
        let err = decode_response::<Value>("google", "<html>").unwrap_err();
        assert!(matches!(
            err,
            LLMError::MalformedVendorResponse { provider: "google", .. }
        ));
    }
}
