//! Google Gemini `generateContent` adapter.

mod error;
mod provider;
mod request;
mod response;
mod schema;
mod types;

pub use provider::GoogleGeminiProvider;
