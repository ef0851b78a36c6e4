//! Request, response and error hooks.

use std::sync::Arc;

use crate::{Body, BoxError, RequestError, Response};

/// Hook run once the outgoing request is fully prepared, after the codec
/// hooks. Returning an error aborts the call before anything is sent.
pub type OnRequestReady =
    Arc<dyn Fn(&mut reqwest::Request) -> Result<(), BoxError> + Send + Sync>;

/// Hook run as soon as a response is received, before the status check.
pub type OnResponseReady = Arc<dyn Fn(&Response) -> Result<(), BoxError> + Send + Sync>;

/// Hook run for every failed call. Used for side effects only.
pub type OnError = Arc<dyn Fn(&ErrorContext<'_>) + Send + Sync>;

/// Everything known about a failed call.
pub struct ErrorContext<'a> {
    /// Snapshot of the outgoing request, if it was built.
    pub request: Option<&'a reqwest::Request>,
    /// Response, if one was received.
    pub response: Option<&'a Response>,
    /// The error about to be returned.
    pub error: &'a RequestError,
    /// Body as supplied by the caller.
    pub body: Option<&'a Body>,
}

/// Staged request body, readable from a request-ready hook without
/// consuming it. `None` for requests without a body or with a streaming one.
pub fn request_body_bytes(request: &reqwest::Request) -> Option<&[u8]> {
    request.body().and_then(|body| body.as_bytes())
}

/// Request-ready hook that logs outgoing requests with `tracing`.
pub fn logging_request_hook(
    log_headers: bool,
) -> impl Fn(&mut reqwest::Request) -> Result<(), BoxError> + Send + Sync + 'static {
    move |request: &mut reqwest::Request| {
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            body_len = ?request_body_bytes(request).map(|b| b.len()),
            "Sending HTTP request"
        );

        if log_headers {
            for (name, value) in request.headers() {
                tracing::trace!(
                    header = %name,
                    value = ?value,
                    "Request header"
                );
            }
        }

        Ok(())
    }
}

/// Response-ready hook that logs responses with `tracing`.
pub fn logging_response_hook(
    log_headers: bool,
) -> impl Fn(&Response) -> Result<(), BoxError> + Send + Sync + 'static {
    move |response: &Response| {
        tracing::debug!(
            status = %response.status(),
            url = %response.url(),
            "Received HTTP response"
        );

        if log_headers {
            for (name, value) in response.headers() {
                tracing::trace!(
                    header = %name,
                    value = ?value,
                    "Response header"
                );
            }
        }

        Ok(())
    }
}
