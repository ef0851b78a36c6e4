//! HTTP client implementation.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http::Method;
use tracing::debug;
use url::Url;

use crate::diagnostics::DiagnosticSink;
use crate::hooks::ErrorContext;
use crate::{
    Body, BodyMarshaler, BodyUnmarshaler, BoxError, HttpClientConfig, HttpClientError,
    RawBodyMarshaler, RawBodyUnmarshaler, ReqwestTransport, Request, RequestOptions, Response,
    Result, Transport, config::DEFAULT_TIMEOUT,
};

/// HTTP client holding a transport and the default options for every
/// request it creates.
///
/// Setters consume and return the client so configuration can be chained.
/// Cloning is cheap and yields an independent configuration branch: the
/// clone shares the connection pool but changing its headers, codecs,
/// hooks or timeout never affects the original.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    base_url: Option<Url>,
    options: Arc<RequestOptions>,
}

impl HttpClient {
    /// Create a client with a 20 second timeout and raw passthrough codecs.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Create a client from `config`.
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?;

        let mut client = Self::with_transport(transport).timeout(config.timeout);
        client.base_url = base_url;

        let options = Arc::make_mut(&mut client.options);
        options.set_headers(config.default_headers);
        options.set_stack_trace_enabled(config.stack_trace);

        debug!(
            timeout = ?config.timeout,
            base_url = ?config.base_url,
            "Created HTTP client"
        );
        Ok(client)
    }

    /// Create a client dispatching through a custom transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        let mut options = RequestOptions::new();
        options.set_body_marshaler(Arc::new(RawBodyMarshaler));
        options.set_body_unmarshaler(Arc::new(RawBodyUnmarshaler));

        Self {
            transport: Arc::new(transport),
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
            options: Arc::new(options),
        }
    }

    /// Default options for new requests.
    pub fn request_options(&self) -> &RequestOptions {
        &self.options
    }

    /// Timeout applied to requests that don't set their own.
    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Base URL relative targets are resolved against.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn shared_options(&self) -> &Arc<RequestOptions> {
        &self.options
    }

    fn options_mut(&mut self) -> &mut RequestOptions {
        Arc::make_mut(&mut self.options)
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the body marshaler.
    pub fn body_marshaler(mut self, marshaler: impl BodyMarshaler + 'static) -> Self {
        self.options_mut().set_body_marshaler(Arc::new(marshaler));
        self
    }

    /// Set the body unmarshaler.
    pub fn body_unmarshaler(mut self, unmarshaler: impl BodyUnmarshaler + 'static) -> Self {
        self.options_mut().set_body_unmarshaler(Arc::new(unmarshaler));
        self
    }

    /// Set a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options_mut().set_header(name, value);
        self
    }

    /// Set several default headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options_mut().set_headers(headers);
        self
    }

    /// Set bearer authentication.
    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Set basic authentication.
    pub fn basic_auth(
        self,
        username: impl Into<String>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.header("Authorization", basic_credentials(username, password))
    }

    /// Set the request-ready hook.
    pub fn on_request_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.options_mut().set_on_request_ready(Arc::new(hook));
        self
    }

    /// Set the response-ready hook.
    pub fn on_response_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.options_mut().set_on_response_ready(Arc::new(hook));
        self
    }

    /// Add an error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ErrorContext<'_>) + Send + Sync + 'static,
    {
        self.options_mut().add_on_error(Arc::new(hook));
        self
    }

    /// Dump failed calls through `tracing`. Also enables stack traces.
    pub fn dump_on_error(mut self) -> Self {
        self.options_mut().enable_dump_on_error();
        self
    }

    /// Dump failed calls into `sink`. Also enables stack traces.
    pub fn dump_on_error_to<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let sink: DiagnosticSink = Arc::new(sink);
        self.options_mut().enable_dump_on_error_to(sink);
        self
    }

    /// Enable or disable stack traces in returned errors.
    pub fn stack_trace(mut self, enabled: bool) -> Self {
        self.options_mut().set_stack_trace_enabled(enabled);
        self
    }

    /// Create a request with any method.
    pub fn request<'a>(
        &self,
        method: Method,
        target: impl Into<String>,
        body: Option<Body>,
    ) -> Request<'a> {
        Request::new(self, method, target.into(), body)
    }

    /// Create a GET request.
    pub fn get<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::GET, target, None)
    }

    /// Create a POST request.
    pub fn post<'a>(&self, target: impl Into<String>, body: impl Into<Body>) -> Request<'a> {
        self.request(Method::POST, target, Some(body.into()))
    }

    /// Create a PUT request.
    pub fn put<'a>(&self, target: impl Into<String>, body: impl Into<Body>) -> Request<'a> {
        self.request(Method::PUT, target, Some(body.into()))
    }

    /// Create a PATCH request.
    pub fn patch<'a>(&self, target: impl Into<String>, body: impl Into<Body>) -> Request<'a> {
        self.request(Method::PATCH, target, Some(body.into()))
    }

    /// Create a DELETE request.
    pub fn delete<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::DELETE, target, None)
    }

    /// Create an OPTIONS request.
    pub fn options<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::OPTIONS, target, None)
    }

    /// Create a CONNECT request.
    pub fn connect<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::CONNECT, target, None)
    }

    /// Create a HEAD request.
    pub fn head<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::HEAD, target, None)
    }

    /// Create a TRACE request.
    pub fn trace<'a>(&self, target: impl Into<String>) -> Request<'a> {
        self.request(Method::TRACE, target, None)
    }

    /// Send a raw request through the transport, bypassing codecs and hooks.
    /// The client timeout applies unless the request sets its own.
    pub async fn send(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        request.timeout_mut().get_or_insert(self.timeout);
        self.transport.send(request).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("options", &self.options)
            .finish()
    }
}

pub(crate) fn basic_credentials(
    username: impl Into<String>,
    password: Option<impl Into<String>>,
) -> String {
    let credentials = match password {
        Some(p) => format!("{}:{}", username.into(), p.into()),
        None => format!("{}:", username.into()),
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}
