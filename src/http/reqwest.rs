use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};

use crate::error::LLMError;

use super::{DynHttpTransport, HttpRequest, HttpResponse, HttpTransport};

/// [`HttpTransport`] over a shared reqwest [`Client`].
///
/// Vendor calls are JSON POSTs with per-adapter auth headers and an optional
/// per-call deadline. Header validation happens before the connection is opened,
/// so a malformed key fails locally.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Uses a caller-configured client, e.g. one with a proxy or custom TLS roots.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport around a client with reqwest's defaults.
    pub fn default_client() -> Result<Self, LLMError> {
        let client = Client::builder()
            .build()
            .map_err(|err| LLMError::transport(format!("failed to create reqwest client: {err}")))?;
        Ok(Self::new(client))
    }

    fn prepare(&self, request: HttpRequest) -> Result<RequestBuilder, LLMError> {
        let HttpRequest {
            url,
            headers,
            body,
            timeout,
        } = request;
        let builder = self.client.post(url).headers(header_map(headers)?).body(body);
        Ok(match timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        })
    }
}

fn header_map(headers: HashMap<String, String>) -> Result<HeaderMap, LLMError> {
    headers
        .into_iter()
        .map(|(name, value)| {
            let name = HeaderName::try_from(name)
                .map_err(|err| LLMError::transport(format!("invalid header name: {err}")))?;
            let value = HeaderValue::try_from(value)
                .map_err(|err| LLMError::transport(format!("invalid value for header {name}: {err}")))?;
            Ok((name, value))
        })
        .collect()
}

/// Keeps the headers the adapters read (`retry-after` and friends); values that are
/// not visible ASCII are dropped.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

fn send_error(err: reqwest::Error) -> LLMError {
    let what = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    LLMError::transport(format!("request {what}: {err}"))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        let response = self.prepare(request)?.send().await.map_err(send_error)?;
        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers());
        let body = response.bytes().await.map_err(send_error)?;
        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Shared reqwest-backed transport used when the caller does not inject one.
pub fn default_dyn_transport() -> Result<DynHttpTransport, LLMError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::post_json("https://api.example.com/v1/chat", br#"{"model":"m"}"#.to_vec())
            .with_headers(HashMap::from([(
                "x-api-key".to_string(),
                "secret".to_string(),
            )]))
            .with_timeout(Some(Duration::from_secs(9)))
    }

    #[test]
    fn prepared_request_is_a_json_post_with_adapter_headers() {
        let built = ReqwestTransport::default()
            .prepare(request())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.url().as_str(), "https://api.example.com/v1/chat");
        assert_eq!(built.headers()["x-api-key"], "secret");
        assert_eq!(built.headers()["content-type"], "application/json");
        assert_eq!(built.timeout(), Some(&Duration::from_secs(9)));
        assert_eq!(
            built.body().and_then(|body| body.as_bytes()),
            Some(&br#"{"model":"m"}"#[..])
        );
    }

    #[test]
    fn bad_header_fails_before_sending() {
        let mut bad = request();
        bad.headers.insert("x-api-key".to_string(), "line\nbreak".to_string());
        match ReqwestTransport::default().prepare(bad) {
            Err(LLMError::Transport { message }) => {
                assert!(message.contains("x-api-key"), "unexpected message: {message}");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected header validation to fail"),
        }
    }

    #[test]
    fn response_headers_skip_opaque_values() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("12"));
        headers.insert("x-blob", HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap());
        let flat = flatten_headers(&headers);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["retry-after"], "12");
    }
}
