use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::LlmConfig;
use crate::error::LLMError;
use crate::history;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::prompt::{DEFAULT_PROMPTS_DIR, Prompt};
use crate::provider::DynProvider;
use crate::provider::catalog::{ProviderKind, ProviderSettings, build_provider};
use crate::types::{
    CapabilityDescriptor, ChatOptions, ChatRequest, ChatResult, Message, ToolCall,
    ToolDefinition, ToolResult,
};

/// One conversation against one vendor.
///
/// History-mutating calls take `&mut self`; use one `Llm` per conversation.
///
/// # Examples
///
/// ```no_run
/// # use muxllm::{Llm, ProviderKind, types::ChatOptions};
/// # async fn run() -> Result<(), muxllm::LLMError> {
/// let mut llm = Llm::builder(ProviderKind::OpenAi, "gpt-4o-mini")
///     .system_prompt("You are a helpful assistant")
///     .build()?;
/// let reply = llm
///     .chat("Translate {spanish} to english", &[("spanish", "Hola")], ChatOptions::new())
///     .await?;
/// println!("{}", reply.message.unwrap_or_default());
/// assert_eq!(llm.history().len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct Llm {
    provider: DynProvider,
    model: String,
    system_prompt: Option<String>,
    prompts_dir: PathBuf,
    defaults: ChatOptions,
    history: Vec<Message>,
    /// Last non-empty tool list sent by `chat`; redeclared by later calls that pass none.
    tools: Vec<ToolDefinition>,
}

impl Llm {
    pub fn builder(kind: ProviderKind, model: impl Into<String>) -> LlmBuilder {
        LlmBuilder {
            kind,
            model: model.into(),
            settings: ProviderSettings::default(),
            transport: None,
            system_prompt: None,
            prompts_dir: None,
            defaults: ChatOptions::default(),
        }
    }

    /// Builds a conversation with the vendor's environment key and the default transport.
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Result<Self, LLMError> {
        Self::builder(kind, model).build()
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LLMError> {
        Self::from_config_with_transport(config, default_dyn_transport()?)
    }

    pub fn from_config_with_transport(
        config: &LlmConfig,
        transport: DynHttpTransport,
    ) -> Result<Self, LLMError> {
        let settings = config.provider_settings()?;
        let mut builder = Self::builder(config.provider, config.model.clone())
            .transport(transport)
            .default_options(config.default_options()?);
        builder.settings = settings;
        if let Some(system) = &config.system_prompt {
            builder = builder.system_prompt(system.clone());
        }
        if let Some(dir) = &config.prompts_dir {
            builder = builder.prompts_dir(dir.clone());
        }
        builder.build()
    }

    /// Wraps an already constructed adapter.
    pub fn with_provider(provider: DynProvider, model: impl Into<String>) -> Self {
        Self::assemble(
            provider,
            model.into(),
            None,
            PathBuf::from(DEFAULT_PROMPTS_DIR),
            ChatOptions::default(),
        )
    }

    fn assemble(
        provider: DynProvider,
        model: String,
        system_prompt: Option<String>,
        prompts_dir: PathBuf,
        defaults: ChatOptions,
    ) -> Self {
        let history = system_prompt.iter().map(Message::system).collect();
        Self {
            provider,
            model,
            system_prompt,
            prompts_dir,
            defaults,
            history,
            tools: Vec::new(),
        }
    }

    /// One-off query that leaves the history untouched.
    ///
    /// `text` is resolved as a template (see [`Prompt::resolve_in`]) and rendered with
    /// `vars`. Only the system prompt, if any, is sent along with it.
    pub async fn ask(
        &self,
        text: &str,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let content = self.render(text, vars)?;
        self.ask_rendered(content, options).await
    }

    /// Sends the accumulated history plus a new user turn.
    ///
    /// On success the user turn and the assistant turn are appended; on failure the
    /// history is left as it was.
    pub async fn chat(
        &mut self,
        text: &str,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let content = self.render(text, vars)?;
        self.chat_rendered(content, options).await
    }

    /// Records the result of a tool call so the next [`Llm::chat`] can see it.
    ///
    /// # Errors
    ///
    /// Fails when the adapter cannot correlate the result, for example an empty call
    /// id on vendors that require one.
    pub fn add_tool_response(
        &mut self,
        call: &ToolCall,
        content: impl Into<String>,
    ) -> Result<(), LLMError> {
        let result = ToolResult::for_call(call, content);
        self.provider.render_tool_result(&result)?;
        self.history.push(Message::tool(result));
        Ok(())
    }

    pub fn save_history(&self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        history::save_history(path, &self.history)
    }

    /// Replaces the whole history with the file's contents.
    pub fn load_history(&mut self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        self.history = history::load_history(path)?;
        self.tools.clear();
        Ok(())
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Drops every turn except the configured system prompt, and forgets the tools
    /// remembered by earlier [`Llm::chat`] calls.
    pub fn clear_history(&mut self) {
        self.history = self.system_prompt.iter().map(Message::system).collect();
        self.tools.clear();
    }

    /// Tools that a [`Llm::chat`] without tools of its own will still declare.
    pub fn active_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn capabilities(&self) -> CapabilityDescriptor {
        self.provider.capabilities()
    }

    fn render(&self, text: &str, vars: &[(&str, &str)]) -> Result<String, LLMError> {
        Ok(Prompt::resolve_in(text, &self.prompts_dir)?.render(vars))
    }

    pub(crate) async fn ask_rendered(
        &self,
        content: String,
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let mut messages: Vec<Message> = self.system_prompt.iter().map(Message::system).collect();
        messages.push(Message::user(content));
        self.dispatch(messages, options.merged_over(&self.defaults)).await
    }

    pub(crate) async fn chat_rendered(
        &mut self,
        content: String,
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let user = Message::user(content);
        let mut messages = self.history.clone();
        messages.push(user.clone());
        // Vendors such as Anthropic refuse tool_use/tool_result blocks without a
        // tools declaration, so a follow-up turn keeps the conversation's tools.
        let mut options = options.merged_over(&self.defaults);
        if options.tools.is_empty() && !self.tools.is_empty() {
            trace!(tools = self.tools.len(), "reusing conversation tools");
            options.tools = self.tools.clone();
        }
        let tools = options.tools.clone();
        let result = self.dispatch(messages, options).await?;
        self.history.push(user);
        self.history.push(result.to_message());
        if !tools.is_empty() {
            self.tools = tools;
        }
        Ok(result)
    }

    /// Sends `messages` with options already merged over the defaults.
    async fn dispatch(
        &self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let ChatOptions {
            model,
            tools,
            extra,
        } = options;
        let request = ChatRequest {
            messages,
            model: model.unwrap_or_else(|| self.model.clone()),
            tools,
            options: extra,
        };
        debug!(
            provider = self.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "dispatching chat request"
        );
        self.provider.send(request).await.inspect_err(|err| {
            warn!(provider = self.provider.name(), error = %err, "chat request failed");
        })
    }
}

/// Collects construction options for [`Llm`].
pub struct LlmBuilder {
    kind: ProviderKind,
    model: String,
    settings: ProviderSettings,
    transport: Option<DynHttpTransport>,
    system_prompt: Option<String>,
    prompts_dir: Option<PathBuf>,
    defaults: ChatOptions,
}

impl LlmBuilder {
    /// Explicit key; the vendor's environment variable is read otherwise.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn transport(mut self, transport: DynHttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Seeds the history with a system turn that survives [`Llm::clear_history`].
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    /// Options applied under every call's own options.
    pub fn default_options(mut self, options: ChatOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn build(self) -> Result<Llm, LLMError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_dyn_transport()?,
        };
        let provider = build_provider(self.kind, self.settings, transport)?;
        Ok(Llm::assemble(
            provider,
            self.model,
            self.system_prompt,
            self.prompts_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_DIR)),
            self.defaults,
        ))
    }
}

/// A conversation bound to one fixed template.
pub struct SinglePromptLlm {
    llm: Llm,
    prompt: Prompt,
}

impl SinglePromptLlm {
    /// Resolves `template` against the conversation's prompts directory.
    pub fn new(llm: Llm, template: &str) -> Result<Self, LLMError> {
        let prompt = Prompt::resolve_in(template, llm.prompts_dir())?;
        Ok(Self { llm, prompt })
    }

    pub fn from_prompt(llm: Llm, prompt: Prompt) -> Self {
        Self { llm, prompt }
    }

    /// Fresh exchange with the rendered template.
    pub async fn ask(
        &self,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        self.llm.ask_rendered(self.prompt.render(vars), options).await
    }

    /// Like [`Llm::chat`] with the rendered template as the user turn.
    pub async fn chat(
        &mut self,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let content = self.prompt.render(vars);
        self.llm.chat_rendered(content, options).await
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn llm(&self) -> &Llm {
        &self.llm
    }

    pub fn llm_mut(&mut self) -> &mut Llm {
        &mut self.llm
    }

    pub fn into_inner(self) -> Llm {
        self.llm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LLMProvider;
    use crate::registry::ModelRegistry;
    use crate::types::Role;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::{Arc, Mutex};

    /// Echoes the last user turn and records every request.
    struct EchoProvider {
        registry: ModelRegistry,
        seen: Mutex<Vec<ChatRequest>>,
        fail: bool,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                registry: ModelRegistry::new().with_alias("echo", "echo-1"),
                seen: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl LLMProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn registry(&self) -> &ModelRegistry {
            &self.registry
        }

        async fn send(&self, request: ChatRequest) -> Result<ChatResult, LLMError> {
            let model = self.validate_model(&request.model)?;
            let last = request
                .messages
                .last()
                .and_then(|message| message.content.clone())
                .unwrap_or_default();
            self.seen.lock().unwrap().push(request);
            if self.fail {
                return Err(LLMError::VendorRequestFailed {
                    provider: "echo",
                    status: Some(500),
                    message: "boom".into(),
                    body: None,
                    retry_after: None,
                });
            }
            Ok(ChatResult {
                model,
                message: Some(format!("echo: {last}")),
                tool_calls: Vec::new(),
                raw: Value::Null,
                finish_reason: None,
                usage: None,
            })
        }

        fn render_message(&self, message: &Message) -> Result<Value, LLMError> {
            Ok(serde_json::to_value(message).unwrap_or_default())
        }

        fn render_tool_call(&self, call: &ToolCall) -> Result<Value, LLMError> {
            Ok(json!({"id": call.id, "name": call.name}))
        }

        fn render_tool_result(&self, result: &ToolResult) -> Result<Value, LLMError> {
            if result.call_id.is_empty() {
                return Err(LLMError::validation("tool result needs an id"));
            }
            Ok(json!({"id": result.call_id, "content": result.content}))
        }

        fn capabilities(&self) -> CapabilityDescriptor {
            CapabilityDescriptor::default()
        }
    }

    fn llm_with(provider: Arc<EchoProvider>) -> Llm {
        Llm::assemble(
            provider,
            "echo".into(),
            Some("Be brief.".into()),
            PathBuf::from("does-not-exist"),
            ChatOptions::new().with_option("temperature", json!(0.5)),
        )
    }

    #[tokio::test]
    async fn system_prompt_seeds_history() {
        let llm = llm_with(Arc::new(EchoProvider::new()));
        assert_eq!(llm.history(), &[Message::system("Be brief.")]);
    }

    #[tokio::test]
    async fn chat_appends_user_and_assistant() {
        let provider = Arc::new(EchoProvider::new());
        let mut llm = llm_with(provider.clone());
        let result = llm
            .chat("Hi {name}", &[("name", "Ada")], ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(result.model, "echo-1");
        assert_eq!(
            llm.history(),
            &[
                Message::system("Be brief."),
                Message::user("Hi Ada"),
                Message::assistant("echo: Hi Ada"),
            ]
        );
        assert_eq!(provider.seen.lock().unwrap()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn failed_chat_leaves_history_untouched() {
        let mut llm = llm_with(Arc::new(EchoProvider::failing()));
        let err = llm.chat("hello", &[], ChatOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(llm.history().len(), 1);
    }

    #[tokio::test]
    async fn ask_does_not_touch_history() {
        let provider = Arc::new(EchoProvider::new());
        let mut llm = llm_with(provider.clone());
        llm.chat("first", &[], ChatOptions::new()).await.unwrap();
        llm.ask("side question", &[], ChatOptions::new()).await.unwrap();
        assert_eq!(llm.history().len(), 3);

        let seen = provider.seen.lock().unwrap();
        let roles: Vec<Role> = seen[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[tokio::test]
    async fn options_merge_with_caller_precedence() {
        let provider = Arc::new(EchoProvider::new());
        let llm = llm_with(provider.clone());
        llm.ask(
            "q",
            &[],
            ChatOptions::new()
                .with_option("temperature", json!(0.9))
                .with_option("max_tokens", json!(10)),
        )
        .await
        .unwrap();
        let seen = provider.seen.lock().unwrap();
        let mut expected = Map::new();
        expected.insert("temperature".into(), json!(0.9));
        expected.insert("max_tokens".into(), json!(10));
        assert_eq!(seen[0].options, expected);
    }

    #[tokio::test]
    async fn per_call_model_override_is_validated() {
        let llm = Llm::assemble(
            Arc::new(EchoProvider {
                registry: ModelRegistry::new().with_available(["echo-1"]),
                ..EchoProvider::new()
            }),
            "echo-1".into(),
            None,
            PathBuf::from(DEFAULT_PROMPTS_DIR),
            ChatOptions::default(),
        );
        let err = llm
            .ask("q", &[], ChatOptions::new().with_model("echo-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn tool_response_is_validated_by_adapter() {
        let mut llm = llm_with(Arc::new(EchoProvider::new()));
        let call = ToolCall::new("", "get_weather", Map::new());
        assert!(llm.add_tool_response(&call, "sunny").is_err());
        assert_eq!(llm.history().len(), 1);

        let call = ToolCall::new("1", "get_weather", Map::new());
        llm.add_tool_response(&call, "sunny").unwrap();
        let last = llm.history().last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn clear_history_keeps_system_prompt() {
        let mut llm = llm_with(Arc::new(EchoProvider::new()));
        llm.chat("hello", &[], ChatOptions::new()).await.unwrap();
        llm.clear_history();
        assert_eq!(llm.history(), &[Message::system("Be brief.")]);
    }

    #[tokio::test]
    async fn chat_without_tools_reuses_conversation_tools() {
        let provider = Arc::new(EchoProvider::new());
        let mut llm = llm_with(provider.clone());
        let lookup = ToolDefinition::function("lookup", "Look something up");
        llm.chat("first", &[], ChatOptions::new().with_tool(lookup.clone()))
            .await
            .unwrap();
        llm.chat("second", &[], ChatOptions::new()).await.unwrap();
        llm.ask("side", &[], ChatOptions::new()).await.unwrap();

        {
            let seen = provider.seen.lock().unwrap();
            assert_eq!(seen[1].tools, vec![lookup.clone()]);
            assert!(seen[2].tools.is_empty());
        }
        assert_eq!(llm.active_tools(), &[lookup]);

        llm.clear_history();
        assert!(llm.active_tools().is_empty());
        llm.chat("third", &[], ChatOptions::new()).await.unwrap();
        assert!(provider.seen.lock().unwrap()[3].tools.is_empty());
    }

    #[tokio::test]
    async fn failed_chat_does_not_remember_tools() {
        let mut llm = llm_with(Arc::new(EchoProvider::failing()));
        let lookup = ToolDefinition::function("lookup", "Look something up");
        let _ = llm
            .chat("first", &[], ChatOptions::new().with_tool(lookup))
            .await;
        assert!(llm.active_tools().is_empty());
    }

    #[tokio::test]
    async fn single_prompt_renders_fixed_template() {
        let provider = Arc::new(EchoProvider::new());
        let mut single = SinglePromptLlm::from_prompt(
            llm_with(provider.clone()),
            Prompt::inline("Translate {spanish} to english"),
        );
        let result = single
            .ask(&[("spanish", "Hola, como estas?")], ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(
            result.message.as_deref(),
            Some("echo: Translate Hola, como estas? to english")
        );
        assert_eq!(single.llm().history().len(), 1);

        single
            .chat(&[("spanish", "Buenos dias")], ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(single.llm().history().len(), 3);
    }
}
