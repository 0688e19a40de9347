use std::time::Duration;

use serde::Deserialize;

use crate::error::LLMError;
use crate::provider::vendor_failure;

/// Parses `{"error": {"code", "message", "status"}}` bodies returned by Google.
pub(crate) fn parse_gemini_error(
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
        status: Option<String>,
    }

    // Error responses are sometimes wrapped in a one-element array.
    let parsed = serde_json::from_str::<ErrorBody>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorBody>>(body)
            .ok()
            .and_then(|mut list| (!list.is_empty()).then(|| list.remove(0)))
    });
    let message = parsed.and_then(|parsed| parsed.error).map(|error| {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        match error.status {
            Some(rpc) if !rpc.is_empty() => format!("{message} ({rpc})"),
            _ => message,
        }
    });
    vendor_failure(provider, status, body, message, retry_after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rpc_status() {
        let body = r#"{
  "error": {
    "code": 400,
    "message": "API key not valid. Please pass a valid API key.",
    "status": "INVALID_ARGUMENT"
  }
}"#;
        match parse_gemini_error("google", 400, body, None) {
            LLMError::VendorRequestFailed {
                status, message, ..
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(
                    message,
                    "API key not valid. Please pass a valid API key. (INVALID_ARGUMENT)"
                );
            }
            other => panic!("expected VendorRequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn parses_array_wrapped_error() {
        let body = r#"[{"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}}]"#;
        match parse_gemini_error("google", 429, body, Some(Duration::from_secs(30))) {
            LLMError::VendorRequestFailed {
                message,
                retry_after,
                ..
            } => {
                assert_eq!(message, "Resource exhausted (RESOURCE_EXHAUSTED)");
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected VendorRequestFailed, got {other:?}"),
        }
    }
}
