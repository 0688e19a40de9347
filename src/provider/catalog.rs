//! Closed set of supported vendors with their endpoints, credentials and model tables.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::registry::ModelRegistry;

use super::{AnthropicMessagesProvider, DynProvider, GoogleGeminiProvider, OpenAiChatProvider};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
const FIREWORKS_BASE_URL: &str = "https://api.fireworks.ai/inference";

/// Vendor selected once when a conversation is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(alias = "openai")]
    OpenAi,
    Groq,
    Fireworks,
    Anthropic,
    #[serde(alias = "gemini")]
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Groq,
        ProviderKind::Fireworks,
        ProviderKind::Anthropic,
        ProviderKind::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Fireworks => "fireworks",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
        }
    }

    /// Environment variable consulted when no API key is passed explicitly.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Fireworks => "FIREWORKS_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Google => "GEMINI_API_KEY",
        }
    }

    /// Availability and alias table for the vendor.
    pub fn registry(&self) -> ModelRegistry {
        match self {
            ProviderKind::OpenAi | ProviderKind::Google => ModelRegistry::new(),
            ProviderKind::Groq => {
                let aliases = [
                    ("llama3-8b-instruct", "llama3-8b-8192"),
                    ("llama3-70b-instruct", "llama3-70b-8192"),
                    ("mixtral-8x7b-instruct", "mixtral-8x7b-32768"),
                    ("gemma-7b-instruct", "gemma-7b-it"),
                ];
                ModelRegistry::new()
                    .with_available(aliases.iter().map(|(_, target)| *target))
                    .with_aliases(aliases)
            }
            ProviderKind::Fireworks => ModelRegistry::new().with_aliases([
                (
                    "llama3-8b-instruct",
                    "accounts/fireworks/models/llama-v3-8b-instruct",
                ),
                (
                    "llama3-70b-instruct",
                    "accounts/fireworks/models/llama-v3-70b-instruct",
                ),
                ("firefunction-v2", "accounts/fireworks/models/firefunction-v2"),
                (
                    "mixtral-8x7b-instruct",
                    "accounts/fireworks/models/mixtral-8x7b-instruct",
                ),
            ]),
            ProviderKind::Anthropic => {
                let aliases = [
                    ("claude-3-5-sonnet", "claude-3-5-sonnet-20240620"),
                    ("claude-3-opus", "claude-3-opus-20240229"),
                    ("claude-3-sonnet", "claude-3-sonnet-20240229"),
                    ("claude-3-haiku", "claude-3-haiku-20240307"),
                ];
                ModelRegistry::new()
                    .with_available(aliases.iter().map(|(_, target)| *target))
                    .with_aliases(aliases)
            }
        }
    }

    /// Reads the vendor's API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Auth`] when the variable is unset or empty.
    pub fn api_key_from_env(&self) -> Result<String, LLMError> {
        let var = self.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LLMError::Auth {
                message: format!(
                    "no API key given for {} and environment variable {var} is not set",
                    self.as_str()
                ),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            "fireworks" => Ok(ProviderKind::Fireworks),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            other => Err(LLMError::InvalidConfig {
                field: "provider".to_string(),
                reason: format!("unknown provider `{other}`"),
            }),
        }
    }
}

/// Connection settings shared by every adapter.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Explicit key; falls back to [`ProviderKind::api_key_env`] when `None`.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

/// Instantiates the adapter for `kind`.
///
/// # Errors
///
/// Returns [`LLMError::Auth`] when no credential can be resolved.
pub fn build_provider(
    kind: ProviderKind,
    settings: ProviderSettings,
    transport: DynHttpTransport,
) -> Result<DynProvider, LLMError> {
    let api_key = match settings.api_key {
        Some(key) if !key.is_empty() => key,
        _ => kind.api_key_from_env()?,
    };
    let registry = kind.registry();
    let provider: DynProvider = match kind {
        ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::Fireworks => {
            let default_base = match kind {
                ProviderKind::Groq => Some(GROQ_BASE_URL),
                ProviderKind::Fireworks => Some(FIREWORKS_BASE_URL),
                _ => None,
            };
            let mut provider = OpenAiChatProvider::new(transport, api_key)
                .with_name(kind.as_str())
                .with_registry(registry)
                .with_timeout(settings.timeout);
            if let Some(base) = settings.base_url.as_deref().or(default_base) {
                provider = provider.with_base_url(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicMessagesProvider::new(transport, api_key)
                .with_registry(registry)
                .with_timeout(settings.timeout);
            if let Some(base) = settings.base_url {
                provider = provider.with_base_url(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Google => {
            let mut provider = GoogleGeminiProvider::new(transport, api_key)
                .with_registry(registry)
                .with_timeout(settings.timeout);
            if let Some(base) = settings.base_url {
                provider = provider.with_base_url(base);
            }
            Arc::new(provider)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse, HttpTransport};
    use async_trait::async_trait;

    struct NoopTransport;

    #[async_trait]
    impl HttpTransport for NoopTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
            Err(LLMError::transport("offline"))
        }
    }

    fn settings() -> ProviderSettings {
        ProviderSettings {
            api_key: Some("key".into()),
            ..Default::default()
        }
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!(matches!(
            "cohere".parse::<ProviderKind>(),
            Err(LLMError::InvalidConfig { .. })
        ));
        let kind: ProviderKind = serde_json::from_str(r#""open_ai""#).unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
    }

    #[test]
    fn groq_aliases_resolve_and_registry_is_closed() {
        let registry = ProviderKind::Groq.registry();
        assert!(!registry.is_open());
        assert_eq!(registry.resolve("llama3-8b-instruct").unwrap(), "llama3-8b-8192");
        assert!(matches!(
            registry.resolve("gpt-4"),
            Err(LLMError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn anthropic_alias_is_canonicalized() {
        let registry = ProviderKind::Anthropic.registry();
        assert_eq!(
            registry.resolve("claude-3-5-sonnet").unwrap(),
            "claude-3-5-sonnet-20240620"
        );
    }

    #[test]
    fn open_vendors_accept_any_model() {
        assert!(ProviderKind::OpenAi.registry().is_open());
        assert!(ProviderKind::Google.registry().is_open());
        let fireworks = ProviderKind::Fireworks.registry();
        assert_eq!(
            fireworks.resolve("firefunction-v2").unwrap(),
            "accounts/fireworks/models/firefunction-v2"
        );
        assert_eq!(fireworks.resolve("custom/model").unwrap(), "custom/model");
    }

    #[test]
    fn build_provider_names_each_vendor() {
        for kind in ProviderKind::ALL {
            let provider = build_provider(kind, settings(), Arc::new(NoopTransport)).unwrap();
            assert_eq!(provider.name(), kind.as_str());
        }
    }
}
