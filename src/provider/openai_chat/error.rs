use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::LLMError;
use crate::provider::vendor_failure;

/// Parses `{"error": {"message", "type", "code"}}` bodies returned by OpenAI-compatible
/// servers.
pub(crate) fn parse_openai_error(
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
        code: Option<Value>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .map(|error| {
            let message = error.message.unwrap_or_else(|| "unknown error".to_string());
            match error.code {
                Some(Value::String(code)) => format!("{message} ({code})"),
                Some(Value::Number(code)) => format!("{message} ({code})"),
                _ => message,
            }
        });
    vendor_failure(provider, status, body, message, retry_after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_and_code() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        match parse_openai_error("openai", 401, body, None) {
            LLMError::VendorRequestFailed {
                provider,
                status,
                message,
                body: raw,
                ..
            } => {
                assert_eq!(provider, "openai");
                assert_eq!(status, Some(401));
                assert_eq!(message, "Incorrect API key provided (invalid_api_key)");
                assert_eq!(raw.as_deref(), Some(body));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keeps_retry_hint_and_falls_back_to_status() {
        match parse_openai_error("groq", 503, "upstream unavailable", Some(Duration::from_secs(3))) {
            LLMError::VendorRequestFailed {
                message,
                retry_after,
                ..
            } => {
                assert_eq!(message, "status 503");
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
