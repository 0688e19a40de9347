use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::provider::catalog::{ProviderKind, ProviderSettings};
use crate::types::ChatOptions;

/// Serializable description of one conversation's backend.
///
/// # Examples
///
/// ```
/// # use muxllm::config::{Credential, LlmConfig};
/// # use muxllm::provider::ProviderKind;
/// let config: LlmConfig = serde_json::from_str(r#"{
///     "provider": "anthropic",
///     "model": "claude-3-5-sonnet",
///     "credential": {"type": "env", "var": "MY_ANTHROPIC_KEY"},
///     "system_prompt": "Be brief.",
///     "options": {"max_tokens": 256}
/// }"#).unwrap();
/// assert_eq!(config.provider, ProviderKind::Anthropic);
/// assert_eq!(config.credential, Credential::Env { var: "MY_ANTHROPIC_KEY".into() });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Directory searched for named templates; `prompts` when unset.
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Default pass-through options, e.g. `temperature` or `max_tokens`.
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Where the API key comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    ApiKey { key: String },
    Bearer { token: String },
    /// Read from a custom environment variable.
    Env { var: String },
    /// Use the vendor's default environment variable.
    #[default]
    None,
}

impl LlmConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            credential: Credential::None,
            base_url: None,
            system_prompt: None,
            prompts_dir: None,
            timeout_secs: None,
            options: Map::new(),
        }
    }

    /// Resolves the credential to a concrete key.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Auth`] when the referenced environment variable is unset.
    pub fn resolve_api_key(&self) -> Result<String, LLMError> {
        match &self.credential {
            Credential::ApiKey { key } => Ok(key.clone()),
            Credential::Bearer { token } => Ok(token.clone()),
            Credential::Env { var } => match std::env::var(var) {
                Ok(key) if !key.trim().is_empty() => Ok(key),
                _ => Err(LLMError::Auth {
                    message: format!(
                        "provider {} expects its key in environment variable {var}, which is not set",
                        self.provider
                    ),
                }),
            },
            Credential::None => self.provider.api_key_from_env(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings, LLMError> {
        if self.model.trim().is_empty() {
            return Err(LLMError::InvalidConfig {
                field: "model".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(LLMError::InvalidConfig {
                field: "timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(ProviderSettings {
            api_key: Some(self.resolve_api_key()?),
            base_url: self.base_url.clone(),
            timeout: self.timeout(),
        })
    }

    /// Default options applied under every call's own options.
    pub fn default_options(&self) -> Result<ChatOptions, LLMError> {
        ChatOptions::from_map(self.options.clone()).map_err(|err| LLMError::InvalidConfig {
            field: "options".to_string(),
            reason: err.to_string(),
        })
    }
}
