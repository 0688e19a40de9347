use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the chat facade and its adapters.
///
/// The first four variants form the caller-facing taxonomy: validation failures that
/// never reach the network (`ModelUnavailable`, `UnsupportedToolSchema`) are kept apart
/// from vendor-side failures (`VendorRequestFailed`, `MalformedVendorResponse`) so
/// callers can decide whether a retry makes sense. Nothing in this crate retries.
#[derive(Debug, Error)]
pub enum LLMError {
    /// The requested model is not served by the selected provider.
    #[error("Model {model} is not available. Available models are {}", .available.join(", "))]
    ModelUnavailable {
        /// Model name after alias resolution.
        model: String,
        /// Permitted model identifiers, sorted.
        available: Vec<String>,
    },
    /// A canonical tool definition cannot be expressed in the vendor's declaration format.
    #[error("tool `{tool}` cannot be translated: {reason}")]
    UnsupportedToolSchema { tool: String, reason: String },
    /// The vendor answered with a non-2xx status or could not be reached at all.
    #[error("{provider} request failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    VendorRequestFailed {
        /// Provider name, such as `anthropic`.
        provider: &'static str,
        /// HTTP status, `None` when the transport failed before a response arrived.
        status: Option<u16>,
        /// Vendor error message when one could be extracted.
        message: String,
        /// Raw vendor error body, kept verbatim.
        body: Option<String>,
        /// Wait hint taken from the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// The vendor answered 2xx but the payload lacks the fields the adapter needs.
    #[error("malformed {provider} response: {message}")]
    MalformedVendorResponse {
        provider: &'static str,
        message: String,
    },
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Reports invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Signals validation failures in the canonical request.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Declares that a capability is not supported by this crate or provider.
    #[error("feature unsupported: {feature}")]
    UnsupportedFeature { feature: &'static str },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
    /// File access failed while reading a template or reading/writing history.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A persisted history file does not hold a valid message sequence.
    #[error("invalid history: {message}")]
    InvalidHistory { message: String },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use muxllm::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::MalformedVendorResponse`] for the given provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use muxllm::error::LLMError;
    ///
    /// let err = LLMError::malformed("google", "response has no candidates");
    /// assert!(matches!(err, LLMError::MalformedVendorResponse { provider: "google", .. }));
    /// ```
    pub fn malformed<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::MalformedVendorResponse {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported_tool<N: Into<String>, R: Into<String>>(tool: N, reason: R) -> Self {
        Self::UnsupportedToolSchema {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Rewrites a raw transport failure as a vendor failure without a status.
    ///
    /// Adapters call this so that callers only ever see `VendorRequestFailed` for
    /// anything that went wrong on the way to or from the vendor.
    pub(crate) fn into_vendor_failure(self, provider: &'static str) -> Self {
        match self {
            Self::Transport { message } => Self::VendorRequestFailed {
                provider,
                status: None,
                message,
                body: None,
                retry_after: None,
            },
            other => other,
        }
    }

    /// Returns the HTTP status carried by a vendor failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::VendorRequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` for failures detected before any network call.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. }
                | Self::UnsupportedToolSchema { .. }
                | Self::Validation { .. }
                | Self::UnsupportedFeature { .. }
        )
    }
}
