//! HTTP client error types.

use std::fmt;

use thiserror::Error;

use crate::Response;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Boxed error returned by user supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// A body was supplied but no marshaler is configured.
    #[error("body marshaler is not set")]
    MissingMarshaler,

    /// A decode destination was supplied but no unmarshaler is configured.
    #[error("result destination is provided but body unmarshaler is not set")]
    MissingUnmarshaler,

    /// The body marshaler failed.
    #[error("body marshaling: {0}")]
    Marshal(#[source] CodecError),

    /// The body unmarshaler failed.
    #[error("body unmarshaling: {0}")]
    Unmarshal(#[source] CodecError),

    /// A request-ready hook failed. No request was sent.
    #[error("on request ready hook: {0}")]
    RequestHook(#[source] BoxError),

    /// The response-ready hook failed.
    #[error("on response ready hook: {0}")]
    ResponseHook(#[source] BoxError),

    /// The server answered with a status outside of 2xx.
    #[error("{status_line}:{status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Status line, e.g. `404 Not Found`.
        status_line: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// The response body was already read and closed.
    #[error("Response body already consumed")]
    BodyConsumed,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification of [`HttpClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing codec, malformed URL or header.
    Configuration,
    /// Encode or decode failure.
    Codec,
    /// A ready hook returned an error.
    Hook,
    /// Network, timeout or cancellation.
    Transport,
    /// Non-2xx response.
    Status,
}

impl HttpClientError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingMarshaler
            | Self::MissingUnmarshaler
            | Self::InvalidUrl(_)
            | Self::RequestBuild(_) => ErrorCategory::Configuration,
            Self::Marshal(_) | Self::Unmarshal(_) | Self::Json(_) => ErrorCategory::Codec,
            Self::RequestHook(_) | Self::ResponseHook(_) => ErrorCategory::Hook,
            Self::Status { .. } => ErrorCategory::Status,
            Self::BodyConsumed | Self::Http(_) => ErrorCategory::Transport,
        }
    }

    /// Check if this is a timeout error, including one hit while a decoder
    /// was still reading the response body.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Http(e) | Self::Unmarshal(CodecError::Body(e)) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_connect())
    }

    /// Check if this is a non-2xx status error.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// Get the HTTP status code if this is a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors reported by body codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No body was given to the marshaler.
    #[error("body is missing")]
    MissingBody,

    /// No destination was given to the unmarshaler.
    #[error("result destination is missing")]
    MissingDestination,

    /// No source stream was given to the unmarshaler.
    #[error("reader is missing")]
    MissingReader,

    /// The marshaler does not handle this kind of body.
    #[error("unsupported body type for {codec}: {kind}")]
    UnsupportedBody {
        /// Codec name.
        codec: &'static str,
        /// Body kind.
        kind: &'static str,
    },

    /// The unmarshaler does not handle this kind of destination.
    #[error("unsupported result destination for {codec}: {kind}")]
    UnsupportedDestination {
        /// Codec name.
        codec: &'static str,
        /// Destination kind.
        kind: &'static str,
    },

    /// JSON encode/decode error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Form encoding error.
    #[error(transparent)]
    Form(#[from] serde_urlencoded::ser::Error),

    /// Base64 decoding error.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// Stream error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The response body could not be read from the connection.
    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),

    /// Error raised by a custom codec.
    #[error("{0}")]
    Other(BoxError),
}

impl CodecError {
    /// Wrap an arbitrary error from a custom codec.
    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }
}

/// Error returned by [`Request::execute`](crate::Request::execute).
///
/// Wraps an [`HttpClientError`] with an optional captured stack trace and,
/// for failures that happen after a response arrived, the response itself.
pub struct RequestError {
    error: HttpClientError,
    stack: Option<String>,
    response: Option<Response>,
}

impl RequestError {
    pub(crate) fn new(error: HttpClientError, stack: Option<String>) -> Self {
        Self {
            error,
            stack,
            response: None,
        }
    }

    pub(crate) fn with_response(mut self, response: Option<Response>) -> Self {
        self.response = response;
        self
    }

    /// The wrapped error.
    pub fn error(&self) -> &HttpClientError {
        &self.error
    }

    /// Consume the envelope and return the wrapped error.
    pub fn into_error(self) -> HttpClientError {
        self.error
    }

    /// Captured stack trace, if stack traces were enabled.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Response received before the failure, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Mutable access to the response received before the failure.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Take ownership of the response received before the failure.
    pub fn into_response(self) -> Option<Response> {
        self.response
    }

    /// Split into the wrapped error and the response.
    pub fn into_parts(self) -> (HttpClientError, Option<Response>) {
        (self.error, self.response)
    }

    /// Shortcut for [`HttpClientError::category`].
    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }

    /// Shortcut for [`HttpClientError::status_code`].
    pub fn status_code(&self) -> Option<u16> {
        self.error.status_code()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stack {
            Some(stack) => write!(f, "{}\nStack trace:\n{}", self.error, stack),
            None => write!(f, "{}", self.error),
        }
    }
}

impl fmt::Debug for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestError")
            .field("error", &self.error)
            .field("stack", &self.stack.is_some())
            .field("response", &self.response.as_ref().map(|r| r.status()))
            .finish()
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<HttpClientError> for RequestError {
    fn from(error: HttpClientError) -> Self {
        Self::new(error, None)
    }
}
