//! Provider-agnostic chat over OpenAI-compatible vendors, Anthropic and Gemini.
//!
//! [`Llm`] keeps one conversation's history in the canonical [`types::Message`]
//! model and hands it to a vendor adapter ([`LLMProvider`]) selected once from
//! [`ProviderKind`]. Templates with `{name}` placeholders are resolved by
//! [`Prompt`].

pub mod blocking;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod llm;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod types;

pub use blocking::BlockingLlm;
pub use config::LlmConfig;
pub use error::LLMError;
pub use llm::{Llm, LlmBuilder, SinglePromptLlm};
pub use prompt::Prompt;
pub use provider::{LLMProvider, ProviderKind};
pub use registry::ModelRegistry;
pub use types::*;
