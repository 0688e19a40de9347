//! Prompt templates with `{name}` placeholders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::LLMError;

/// Directory searched first when a template is referenced by name.
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Where a template's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// Found by name under the prompts directory.
    Named(PathBuf),
    /// Read from a literal filesystem path.
    File(PathBuf),
    /// The source string itself.
    Inline,
}

/// A text template plus default placeholder values.
///
/// # Examples
///
/// ```
/// # use muxllm::prompt::Prompt;
/// let prompt = Prompt::inline("Translate {spanish} to english");
/// assert_eq!(
///     prompt.render(&[("spanish", "Hola, como estas?")]),
///     "Translate Hola, como estas? to english"
/// );
/// assert_eq!(prompt.render(&[]), "Translate {spanish} to english");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    template: String,
    source: PromptSource,
    defaults: BTreeMap<String, String>,
}

impl Prompt {
    pub fn inline(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            source: PromptSource::Inline,
            defaults: BTreeMap::new(),
        }
    }

    /// Resolves `source` against [`DEFAULT_PROMPTS_DIR`] in the working directory.
    pub fn resolve(source: &str) -> Result<Self, LLMError> {
        Self::resolve_in(source, Path::new(DEFAULT_PROMPTS_DIR))
    }

    /// Looks for `<prompts_dir>/<source>`, then `source` as a path, and otherwise
    /// treats `source` as the template text.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Io`] when a matching file exists but cannot be read.
    pub fn resolve_in(source: &str, prompts_dir: &Path) -> Result<Self, LLMError> {
        if looks_like_path(source) {
            let named = prompts_dir.join(source);
            if named.is_file() {
                trace!(path = %named.display(), "template resolved from prompts directory");
                return Ok(Self::from_file(&named)?.with_source(PromptSource::Named(named)));
            }
            let literal = PathBuf::from(source);
            if literal.is_file() {
                trace!(path = %literal.display(), "template resolved from path");
                return Ok(Self::from_file(&literal)?.with_source(PromptSource::File(literal)));
            }
        }
        Ok(Self::inline(source))
    }

    fn from_file(path: &Path) -> Result<Self, LLMError> {
        let template = fs::read_to_string(path).map_err(|source| LLMError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::inline(template))
    }

    fn with_source(mut self, source: PromptSource) -> Self {
        self.source = source;
        self
    }

    /// Binds a value used whenever a render call does not supply `key`.
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn with_defaults<I, K, V>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults
            .extend(defaults.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    /// Fills placeholders from `vars`, then from the bound defaults.
    ///
    /// Unknown placeholders are left verbatim. Substituted values are not scanned
    /// again, so a value containing `{x}` is inserted literally.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        substitute(&self.template, |name| {
            vars.iter()
                .rev()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
                .or_else(|| self.defaults.get(name).map(String::as_str))
        })
    }
}

/// Renders an ad-hoc template without constructing a [`Prompt`].
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    Prompt::inline(template).render(vars)
}

fn looks_like_path(source: &str) -> bool {
    !source.is_empty() && !source.contains('\n') && source.len() < 1024
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

fn substitute<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_placeholder_name(&after[..end]) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
