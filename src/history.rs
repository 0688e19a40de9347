//! JSON persistence for conversation history.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::LLMError;
use crate::types::Message;

/// Writes `messages` as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`LLMError::Io`] when the file cannot be written.
pub fn save_history(path: impl AsRef<Path>, messages: &[Message]) -> Result<(), LLMError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(messages).map_err(|err| LLMError::InvalidHistory {
        message: err.to_string(),
    })?;
    fs::write(path, json).map_err(|source| LLMError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), messages = messages.len(), "history saved");
    Ok(())
}

/// Reads a history file written by [`save_history`].
///
/// Every record is checked with [`Message::validate`].
///
/// # Errors
///
/// Returns [`LLMError::Io`] when the file cannot be read and
/// [`LLMError::InvalidHistory`] when its contents are not a valid message list.
pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<Message>, LLMError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LLMError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let messages: Vec<Message> =
        serde_json::from_str(&text).map_err(|err| LLMError::InvalidHistory {
            message: format!("{}: {err}", path.display()),
        })?;
    for (index, message) in messages.iter().enumerate() {
        message.validate().map_err(|err| LLMError::InvalidHistory {
            message: format!("record {index}: {err}"),
        })?;
    }
    debug!(path = %path.display(), messages = messages.len(), "history loaded");
    Ok(messages)
}
