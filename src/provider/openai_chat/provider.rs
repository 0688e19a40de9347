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

use super::error::parse_openai_error;
use super::request::{build_openai_body, convert_message, convert_tool_call};
use super::response::map_response;
use super::types::OpenAiChatResponse;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Chat Completions adapter.
///
/// The same wire format is served by several vendors; [`OpenAiChatProvider::with_name`],
/// [`OpenAiChatProvider::with_base_url`] and [`OpenAiChatProvider::with_registry`]
/// retarget it (see [`crate::provider::ProviderKind`]).
pub struct OpenAiChatProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) name: &'static str,
    pub(crate) registry: ModelRegistry,
    pub(crate) organization: Option<String>,
    pub(crate) timeout: Option<Duration>,
}

impl OpenAiChatProvider {
    /// Creates a provider targeting api.openai.com with an open model registry.
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            name: "openai",
            registry: ModelRegistry::new(),
            organization: None,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Name reported in errors and logs.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
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
        .map_err(|err| err.into_vendor_failure(self.name))
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let success = response.is_success();
        let retry_after = retry_after_from_headers(&response.headers);
        let text = response
            .into_string()
            .map_err(|err| err.into_vendor_failure(self.name))?;
        if success {
            Ok(text)
        } else {
            warn!(provider = self.name, status, "chat completion request failed");
            Err(parse_openai_error(self.name, status, &text, retry_after))
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAiChatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResult, LLMError> {
        let model = self.validate_model(&request.model)?;
        reject_streaming(&request.options)?;
        let body = build_openai_body(&request, &model)?;
        debug!(
            provider = self.name,
            model = %model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            endpoint = %self.endpoint(),
            "sending chat completion"
        );
        let response = self.send_request(&body).await?;
        let text = self.ensure_success(response)?;
        let (raw, parsed) = decode_response::<OpenAiChatResponse>(self.name, &text)?;
        map_response(parsed, raw, model, self.name)
    }

    fn render_message(&self, message: &Message) -> Result<Value, LLMError> {
        convert_message(message)
    }

    fn render_tool_call(&self, call: &ToolCall) -> Result<Value, LLMError> {
        convert_tool_call(call)
    }

    fn render_tool_result(&self, result: &ToolResult) -> Result<Value, LLMError> {
        convert_message(&Message::tool(result.clone()))
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_tools: true,
            supports_parallel_tool_calls: true,
            mixes_text_and_tool_calls: true,
            issues_tool_call_ids: true,
            inline_system_messages: true,
        }
    }
}
