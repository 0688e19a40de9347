//! Per-adapter model availability and alias table.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::LLMError;

/// Which model names an adapter accepts, and how caller-facing aliases map onto
/// vendor identifiers.
///
/// An empty `available` set is an open policy: every name is accepted. Alias lookup
/// is a single hop and always happens before the availability check.
///
/// # Examples
///
/// ```
/// # use muxllm::registry::ModelRegistry;
/// let registry = ModelRegistry::new()
///     .with_alias("claude-3-haiku", "claude-3-haiku-20240307")
///     .with_available(["claude-3-haiku-20240307"]);
/// assert_eq!(registry.resolve("claude-3-haiku").unwrap(), "claude-3-haiku-20240307");
/// assert!(registry.resolve("claude-2").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    available: BTreeSet<String>,
    alias: BTreeMap<String, String>,
}

impl ModelRegistry {
    /// Open registry with no aliases.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.alias.insert(alias.into(), target.into());
        self
    }

    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.alias
            .extend(aliases.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_available<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available.extend(models.into_iter().map(Into::into));
        self
    }

    /// `true` when every model name is accepted.
    pub fn is_open(&self) -> bool {
        self.available.is_empty()
    }

    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(String::as_str)
    }

    /// Follows one alias hop, or returns the name unchanged.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Resolves `name` to the identifier sent to the vendor.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::ModelUnavailable`] when the registry is closed and the
    /// resolved name is not listed.
    pub fn resolve(&self, name: &str) -> Result<String, LLMError> {
        let resolved = self.canonical(name);
        if self.is_open() || self.available.contains(resolved) {
            Ok(resolved.to_string())
        } else {
            Err(LLMError::ModelUnavailable {
                model: resolved.to_string(),
                available: self.available.iter().cloned().collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed() -> ModelRegistry {
        ModelRegistry::new()
            .with_aliases([("llama3-8b-instruct", "llama3-8b-8192"), ("a", "b"), ("b", "c")])
            .with_available(["llama3-8b-8192", "b", "c"])
    }

    #[test]
    fn open_registry_accepts_any_name() {
        let registry = ModelRegistry::new().with_alias("short", "long-name");
        assert!(registry.is_open());
        assert_eq!(registry.resolve("anything-at-all").unwrap(), "anything-at-all");
        assert_eq!(registry.resolve("short").unwrap(), "long-name");
    }

    #[test]
    fn closed_registry_rejects_unknown_names() {
        match closed().resolve("gpt-4") {
            Err(LLMError::ModelUnavailable { model, available }) => {
                assert_eq!(model, "gpt-4");
                assert_eq!(available, vec!["b", "c", "llama3-8b-8192"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn alias_resolution_is_single_hop() {
        assert_eq!(closed().resolve("a").unwrap(), "b");
    }

    #[test]
    fn resolving_a_canonical_name_is_idempotent() {
        let registry = closed();
        let once = registry.resolve("llama3-8b-instruct").unwrap();
        assert_eq!(once, "llama3-8b-8192");
        assert_eq!(registry.resolve(&once).unwrap(), once);
    }
}
