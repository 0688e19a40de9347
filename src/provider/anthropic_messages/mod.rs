//! Anthropic Messages adapter.

mod error;
mod provider;
mod request;
mod response;
mod types;

pub use provider::AnthropicMessagesProvider;
pub use request::DEFAULT_MAX_TOKENS;
