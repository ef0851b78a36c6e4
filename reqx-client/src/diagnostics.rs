//! Error enrichment and diagnostic dumps.
//!
//! When dumping is enabled, every failed call renders the outgoing request,
//! the response (if any) and the body the caller originally supplied, and
//! hands the text to a [`DiagnosticSink`]. The default sink emits a
//! `tracing` error event.

use std::backtrace::Backtrace;
use std::sync::Arc;

use http::HeaderMap;

use crate::hooks::{ErrorContext, OnError, request_body_bytes};
use crate::{Body, Response};

/// Receiver of rendered diagnostic dumps.
pub type DiagnosticSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Capture the current call stack.
pub fn capture_stack() -> String {
    Backtrace::force_capture().to_string()
}

/// Sink that emits dumps as `tracing` error events.
pub fn tracing_sink() -> DiagnosticSink {
    Arc::new(|dump: &str| {
        tracing::error!(target: "reqx_client::dump", "{}", dump);
    })
}

/// Error hook rendering the failed call into `sink`.
pub fn dump_hook(sink: DiagnosticSink) -> OnError {
    Arc::new(move |context: &ErrorContext<'_>| sink(&render_dump(context)))
}

/// Render a failed call.
pub fn render_dump(context: &ErrorContext<'_>) -> String {
    let mut out = format!("Error: {}\n", context.error.error());
    if let Some(request) = context.request {
        out.push_str(&render_request(request));
    }
    if let Some(response) = context.response {
        out.push_str(&render_response(response));
    }
    out.push_str(&render_body(context.body));
    out
}

/// Render the request line, headers and staged body.
pub fn render_request(request: &reqwest::Request) -> String {
    let body = request_body_bytes(request)
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|body| !body.is_empty())
        .unwrap_or_else(|| "<empty>".to_string());

    format!(
        "Request: {} {}\nRequest headers:\n{}\nRequest body: {}\n",
        request.method(),
        request.url(),
        render_headers(request.headers()),
        body
    )
}

/// Render the status, headers and buffered body of a response.
pub fn render_response(response: &Response) -> String {
    let body = match response.buffered_body() {
        Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(bytes).into_owned(),
        Some(_) => "<empty>".to_string(),
        None if response.is_closed() => "<closed>".to_string(),
        None => "<unread>".to_string(),
    };

    format!(
        "Response status: {}\nResponse status code: {}\nResponse headers:\n{}\nResponse body: {}\n",
        response.status_line(),
        response.status().as_u16(),
        render_headers(response.headers()),
        body
    )
}

/// Render the body as the caller supplied it.
pub fn render_body(body: Option<&Body>) -> String {
    let rendered = match body {
        None => "<nil>".to_string(),
        Some(Body::Text(text)) => text.clone(),
        Some(Body::Bytes(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(Body::Reader(_)) => "<stream>".to_string(),
        Some(Body::Value(value)) => value.describe(),
    };
    format!("Original body: {}\n", rendered)
}

fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())))
        .collect::<Vec<_>>()
        .join("\n")
}
