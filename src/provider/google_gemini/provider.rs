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

use super::error::parse_gemini_error;
use super::request::{build_gemini_body, convert_message, convert_tool_call, convert_tool_result};
use super::response::map_response;
use super::types::GeminiGenerateContentResponse;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini GenerateContent adapter.
pub struct GoogleGeminiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) registry: ModelRegistry,
    pub(crate) timeout: Option<Duration>,
}

impl GoogleGeminiProvider {
    /// Targets the public Generative Language endpoint with an open registry.
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            registry: ModelRegistry::new(),
            timeout: None,
        }
    }

    /// Overrides the base URL, making it easier to point at proxies or compatibility layers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
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

    /// Builds the endpoint URL for GenerateContent.
    pub(crate) fn endpoint(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model_path = normalize_model(model);
        if base.ends_with("/v1beta") {
            format!("{base}/{model_path}:generateContent")
        } else {
            format!("{base}/v1beta/{model_path}:generateContent")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-goog-api-key".to_string(), self.api_key.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers
    }

    async fn send_request(&self, url: String, body: &Value) -> Result<HttpResponse, LLMError> {
        post_json_with_headers(
            self.transport.as_ref(),
            url,
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
            warn!(provider = self.name(), status, "generateContent request failed");
            Err(parse_gemini_error(self.name(), status, &text, retry_after))
        }
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait]
impl LLMProvider for GoogleGeminiProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResult, LLMError> {
        let model = self.validate_model(&request.model)?;
        reject_streaming(&request.options)?;
        let body = build_gemini_body(&request)?;
        let endpoint = self.endpoint(&model);
        debug!(
            provider = self.name(),
            model = %model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            endpoint = %endpoint,
            "sending generateContent request"
        );
        let response = self.send_request(endpoint, &body).await?;
        let text = self.ensure_success(response)?;
        let (raw, parsed) = decode_response::<GeminiGenerateContentResponse>(self.name(), &text)?;
        map_response(parsed, raw, model, self.name())
    }

    /// System messages render as a `system_instruction` content without a role.
    fn render_message(&self, message: &Message) -> Result<Value, LLMError> {
        convert_message(message)
    }

    fn render_tool_call(&self, call: &ToolCall) -> Result<Value, LLMError> {
        Ok(convert_tool_call(call))
    }

    fn render_tool_result(&self, result: &ToolResult) -> Result<Value, LLMError> {
        convert_tool_result(result)
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_tools: true,
            supports_parallel_tool_calls: true,
            mixes_text_and_tool_calls: true,
            issues_tool_call_ids: false,
            inline_system_messages: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::http::{HttpRequest, HttpTransport};

    #[derive(Default)]
    struct CapturingTransport {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for CapturingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: br#"{"candidates":[{"content":{"role":"model","parts":[{"text":"4"}]},"finishReason":"STOP"}]}"#.to_vec(),
            })
        }
    }

    #[test]
    fn endpoint_normalizes_model_path() {
        let provider = GoogleGeminiProvider::new(Arc::new(CapturingTransport::default()), "g-key");
        assert_eq!(
            provider.endpoint("gemini-1.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert_eq!(
            provider
                .with_base_url("https://proxy.local/v1beta/")
                .endpoint("models/gemini-1.5-flash"),
            "https://proxy.local/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn send_uses_api_key_header_and_maps_text() {
        let transport = Arc::new(CapturingTransport::default());
        let provider = GoogleGeminiProvider::new(transport.clone(), "g-key");
        let result = provider
            .send(ChatRequest::new("gemini-1.5-pro", vec![Message::user("2+2?")]))
            .await
            .unwrap();
        assert_eq!(result.model, "gemini-1.5-pro");
        assert_eq!(result.message.as_deref(), Some("4"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].headers["x-goog-api-key"], "g-key");
        assert_eq!(
            seen[0].json_body().unwrap()["contents"],
            json!([{"role": "user", "parts": [{"text": "2+2?"}]}])
        );
    }

    #[test]
    fn non_success_status_becomes_vendor_failure() {
        let provider = GoogleGeminiProvider::new(Arc::new(CapturingTransport::default()), "g-key");
        let response = HttpResponse {
            status: 429,
            headers: HashMap::from([("Retry-After".to_string(), "3".to_string())]),
            body: br#"{"error":{"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#.to_vec(),
        };
        match provider.ensure_success(response) {
            Err(LLMError::VendorRequestFailed {
                status, retry_after, ..
            }) => {
                assert_eq!(status, Some(429));
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(3)));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let garbled = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: vec![0xff, 0xfe],
        };
        match provider.ensure_success(garbled) {
            Err(LLMError::VendorRequestFailed { status: None, .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
