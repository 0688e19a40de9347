use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpResponse, post_json_with_headers};
use crate::provider::{LLMProvider, decode_response, reject_streaming, retry::retry_after_from_headers};
use crate::registry::ModelRegistry;
use crate::types::{
    CapabilityDescriptor, ChatRequest, ChatResult, Message, ToolCall, ToolResult,
};

use super::error::parse_anthropic_error;
use super::request::{build_anthropic_body, convert_message, convert_tool_call, convert_tool_result};
use super::response::map_response;
use super::types::AnthropicMessageResponse;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";

/// Anthropic Messages adapter (Claude 3.x).
pub struct AnthropicMessagesProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) version: String,
    pub(crate) registry: ModelRegistry,
    pub(crate) timeout: Option<Duration>,
}

impl AnthropicMessagesProvider {
    /// Uses the public endpoint, `anthropic-version: 2023-06-01` and an open registry.
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            version: DEFAULT_VERSION.to_string(),
            registry: ModelRegistry::new(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `anthropic-version` header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), self.api_key.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("anthropic-version".to_string(), self.version.clone());
        headers
    }

    async fn send_request(&self, body: &Value) -> Result<HttpResponse, LLMError> {
        post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(),
            self.timeout,
            body,
        )
        .await
        .map_err(|err| err.into_vendor_failure(self.name()))
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let success = response.is_success();
        let retry_after = retry_after_from_headers(&response.headers);
        let text = response
            .into_string()
            .map_err(|err| err.into_vendor_failure(self.name()))?;
        if success {
            Ok(text)
        } else {
            warn!(provider = self.name(), status, "messages request failed");
            Err(parse_anthropic_error(self.name(), status, &text, retry_after))
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicMessagesProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResult, LLMError> {
        let model = self.validate_model(&request.model)?;
        reject_streaming(&request.options)?;
        let body = build_anthropic_body(&request, &model)?;
        debug!(
            provider = self.name(),
            model = %model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending messages request"
        );
        let response = self.send_request(&body).await?;
        let text = self.ensure_success(response)?;
        let (raw, parsed) = decode_response::<AnthropicMessageResponse>(self.name(), &text)?;
        map_response(parsed, raw, model, self.name())
    }

    /// System messages render as the top-level `{"system": ...}` fragment.
    fn render_message(&self, message: &Message) -> Result<Value, LLMError> {
        convert_message(message)
    }

    fn render_tool_call(&self, call: &ToolCall) -> Result<Value, LLMError> {
        convert_tool_call(call)
    }

    fn render_tool_result(&self, result: &ToolResult) -> Result<Value, LLMError> {
        convert_tool_result(result)
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_tools: true,
            supports_parallel_tool_calls: true,
            mixes_text_and_tool_calls: true,
            issues_tool_call_ids: true,
            inline_system_messages: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::http::{HttpRequest, HttpTransport};

    struct FixedTransport;

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
            assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
            assert_eq!(request.headers["x-api-key"], "ak-test");
            assert_eq!(request.headers["anthropic-version"], "2023-06-01");
            Ok(HttpResponse {
                status: 429,
                headers: HashMap::from([("retry-after".to_string(), "4".to_string())]),
                body: br#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn non_success_status_maps_to_vendor_failure() {
        let provider = AnthropicMessagesProvider::new(Arc::new(FixedTransport), "ak-test");
        let err = provider
            .send(ChatRequest::new("claude-3-haiku-20240307", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        match err {
            LLMError::VendorRequestFailed {
                status,
                message,
                retry_after,
                ..
            } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "slow down (rate_limit_error)");
                assert_eq!(retry_after, Some(Duration::from_secs(4)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn render_tool_result_is_correlated_block() {
        let provider = AnthropicMessagesProvider::new(Arc::new(FixedTransport), "ak-test");
        let rendered = provider
            .render_tool_result(&ToolResult {
                call_id: "toolu_1".into(),
                name: "get_weather".into(),
                content: "sunny".into(),
            })
            .unwrap();
        assert_eq!(
            rendered,
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny"})
        );
    }
}
