//! Synchronous wrapper over [`Llm`].

use std::path::Path;

use tokio::runtime::{Builder, Runtime};

use crate::error::LLMError;
use crate::llm::Llm;
use crate::types::{ChatOptions, ChatResult, Message, ToolCall};

/// Drives an [`Llm`] on an owned current-thread runtime.
///
/// Must not be used from inside another tokio runtime.
pub struct BlockingLlm {
    llm: Llm,
    runtime: Runtime,
}

impl BlockingLlm {
    pub fn new(llm: Llm) -> Result<Self, LLMError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| LLMError::InvalidConfig {
                field: "runtime".to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self { llm, runtime })
    }

    pub fn ask(
        &self,
        text: &str,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        self.runtime.block_on(self.llm.ask(text, vars, options))
    }

    pub fn chat(
        &mut self,
        text: &str,
        vars: &[(&str, &str)],
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        self.runtime.block_on(self.llm.chat(text, vars, options))
    }

    pub fn add_tool_response(
        &mut self,
        call: &ToolCall,
        content: impl Into<String>,
    ) -> Result<(), LLMError> {
        self.llm.add_tool_response(call, content)
    }

    pub fn history(&self) -> &[Message] {
        self.llm.history()
    }

    pub fn save_history(&self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        self.llm.save_history(path)
    }

    pub fn load_history(&mut self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        self.llm.load_history(path)
    }

    pub fn inner(&self) -> &Llm {
        &self.llm
    }

    pub fn into_inner(self) -> Llm {
        self.llm
    }
}
