use crate::response::Response;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type used for transport and interceptor failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline error types
///
/// Configuration errors (`MissingUrl`, `InvalidUrl`) are raised before the
/// transport is invoked. `Status` is the classified HTTP failure and carries
/// the full response. `Transport`, `Interceptor` and `Body` wrap the failing
/// error, which stays reachable through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// The request URL resolved to an empty string
    #[error("Missing url")]
    MissingUrl,

    /// The resolved URL is not an absolute URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The resolved URL that failed to parse
        url: String,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Response status was >= 400 after all response interceptors ran
    #[error("Request failed with status code: {}", .0.status_code)]
    Status(Box<Response>),

    /// The request was cancelled through its cancellation token
    #[error("Request was cancelled")]
    Cancelled,

    /// The transport rejected the request
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// A request or response interceptor failed
    #[error("Interceptor failed: {0}")]
    Interceptor(#[source] BoxError),

    /// Reading the response body failed
    #[error("Failed to read response body: {0}")]
    Body(#[source] BoxError),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// JSON serialization or deserialization error
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid header value in client configuration
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// TLS setup for the default transport failed
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),
}

impl FetchError {
    /// Response carried by a classified HTTP failure
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Status(response) => Some(response),
            _ => None,
        }
    }

    /// Status code of a classified HTTP failure
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|r| r.status_code)
    }

    /// Consume the error and return the response of a classified HTTP failure
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchError::Status(response) => Some(*response),
            _ => None,
        }
    }

    /// Whether the request was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Returns `true` if the error is a classified HTTP failure (status >= 400).
#[must_use]
pub fn is_status_error(err: &FetchError) -> bool {
    matches!(err, FetchError::Status(_))
}

/// Errors produced by [`HyperTransport`](crate::HyperTransport).
///
/// Returned boxed inside [`FetchError::Transport`]; downcast the source to
/// match on a specific failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Single request attempt timed out
    #[error("Request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// URL scheme rejected by the transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },

    /// Request building failed (invalid method, URI or header)
    #[error("Failed to build request: {0}")]
    Request(#[from] http::Error),

    /// Form URL encoding error
    #[error("Form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// Network or connection failure
    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        TransportError::Connection(Box::new(err))
    }
}
