//! Option set shared between a client and the requests it creates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{self, DiagnosticSink};
use crate::hooks::{OnError, OnRequestReady, OnResponseReady};
use crate::{BodyMarshaler, BodyUnmarshaler};

/// Headers, codecs, hooks and diagnostics settings.
///
/// A client owns one option set and every request starts from it. Cloning
/// copies the header map and the error hook list; codecs and single hooks
/// are shared since they are immutable.
///
/// Header names are stored lower-cased, so `X-Token` and `x-token` refer to
/// the same entry and the last write wins.
#[derive(Clone, Default)]
pub struct RequestOptions {
    body_marshaler: Option<Arc<dyn BodyMarshaler>>,
    body_unmarshaler: Option<Arc<dyn BodyUnmarshaler>>,
    headers: HashMap<String, String>,
    on_request_ready: Option<OnRequestReady>,
    on_response_ready: Option<OnResponseReady>,
    on_error: Vec<OnError>,
    stack_trace_enabled: bool,
}

impl RequestOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the body marshaler.
    pub fn set_body_marshaler(&mut self, marshaler: Arc<dyn BodyMarshaler>) {
        self.body_marshaler = Some(marshaler);
    }

    /// Replace the body unmarshaler.
    pub fn set_body_unmarshaler(&mut self, unmarshaler: Arc<dyn BodyUnmarshaler>) {
        self.body_unmarshaler = Some(unmarshaler);
    }

    /// Remove the body marshaler. Requests with a body then fail before
    /// dispatch.
    pub fn clear_body_marshaler(&mut self) {
        self.body_marshaler = None;
    }

    /// Remove the body unmarshaler. Requests with a decode destination then
    /// fail after the response arrives.
    pub fn clear_body_unmarshaler(&mut self) {
        self.body_unmarshaler = None;
    }

    /// Set a header, overwriting any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Set several headers, overwriting previous values.
    pub fn set_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
    }

    /// Replace the request-ready hook.
    pub fn set_on_request_ready(&mut self, hook: OnRequestReady) {
        self.on_request_ready = Some(hook);
    }

    /// Replace the response-ready hook.
    pub fn set_on_response_ready(&mut self, hook: OnResponseReady) {
        self.on_response_ready = Some(hook);
    }

    /// Append an error hook.
    pub fn add_on_error(&mut self, hook: OnError) {
        self.on_error.push(hook);
    }

    /// Dump failed calls through `tracing` and enable stack traces.
    pub fn enable_dump_on_error(&mut self) {
        self.enable_dump_on_error_to(diagnostics::tracing_sink());
    }

    /// Dump failed calls into `sink` and enable stack traces.
    ///
    /// Replaces every previously registered error hook, so enabling the
    /// dump twice still leaves exactly one hook installed.
    pub fn enable_dump_on_error_to(&mut self, sink: DiagnosticSink) {
        self.stack_trace_enabled = true;
        self.on_error = vec![diagnostics::dump_hook(sink)];
    }

    /// Enable or disable stack trace capture.
    pub fn set_stack_trace_enabled(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    /// Configured body marshaler.
    pub fn body_marshaler(&self) -> Option<&Arc<dyn BodyMarshaler>> {
        self.body_marshaler.as_ref()
    }

    /// Configured body unmarshaler.
    pub fn body_unmarshaler(&self) -> Option<&Arc<dyn BodyUnmarshaler>> {
        self.body_unmarshaler.as_ref()
    }

    /// Configured headers, keyed by lower-cased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Configured request-ready hook.
    pub fn on_request_ready(&self) -> Option<&OnRequestReady> {
        self.on_request_ready.as_ref()
    }

    /// Configured response-ready hook.
    pub fn on_response_ready(&self) -> Option<&OnResponseReady> {
        self.on_response_ready.as_ref()
    }

    /// Registered error hooks, in call order.
    pub fn error_hooks(&self) -> &[OnError] {
        &self.on_error
    }

    /// Whether errors carry a captured stack trace.
    pub fn stack_trace_enabled(&self) -> bool {
        self.stack_trace_enabled
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("body_marshaler", &self.body_marshaler.is_some())
            .field("body_unmarshaler", &self.body_unmarshaler.is_some())
            .field("headers", &self.headers)
            .field("on_request_ready", &self.on_request_ready.is_some())
            .field("on_response_ready", &self.on_response_ready.is_some())
            .field("on_error", &self.on_error.len())
            .field("stack_trace_enabled", &self.stack_trace_enabled)
            .finish()
    }
}
