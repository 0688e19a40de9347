use std::time::Duration;

use serde::Deserialize;

use crate::error::LLMError;
use crate::provider::vendor_failure;

/// Parses `{"type": "error", "error": {"type", "message"}}` bodies.
pub(crate) fn parse_anthropic_error(
    provider: &'static str,
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        r#type: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .map(|error| {
            let message = error.message.unwrap_or_else(|| "unknown error".to_string());
            match error.r#type {
                Some(kind) if !kind.is_empty() => format!("{message} ({kind})"),
                _ => message,
            }
        });
    vendor_failure(provider, status, body, message, retry_after)
}
