//! OpenAI Chat Completions adapter, shared by every OpenAI-compatible vendor
//! (OpenAI itself, Groq, Fireworks).

mod error;
mod provider;
mod request;
mod response;
mod types;

pub use provider::OpenAiChatProvider;
