//! Request builder and executor.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, HeaderValue, Method};
use tracing::debug;
use url::Url;

use crate::client::basic_credentials;
use crate::diagnostics::{self, DiagnosticSink};
use crate::hooks::{ErrorContext, OnRequestReady};
use crate::response::is_success_status;
use crate::{
    Body, BodyMarshaler, BodyUnmarshaler, BoxError, Destination, HttpClient,
    HttpClientError, RequestError, RequestOptions, Response, Transport,
};

/// A single HTTP call.
///
/// Created by the [`HttpClient`] factories, it starts out sharing the
/// client's [`RequestOptions`]. The first setter called on the request
/// copies them, so request-level changes never leak back into the client.
/// [`execute`](Self::execute) consumes the request.
pub struct Request<'a> {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    base_url: Option<Url>,
    method: Method,
    target: String,
    query: Vec<(String, String)>,
    body: Option<Body>,
    destination: Option<Destination<'a>>,
    options: Arc<RequestOptions>,
}

/// Ready hooks in the order they run.
enum ReadyHook<'o> {
    Marshaler(&'o dyn BodyMarshaler),
    Unmarshaler(&'o dyn BodyUnmarshaler),
    User(&'o OnRequestReady),
}

impl ReadyHook<'_> {
    fn run(&self, request: &mut reqwest::Request) -> Result<(), BoxError> {
        match self {
            Self::Marshaler(m) => m.on_request_ready(request).map_err(BoxError::from),
            Self::Unmarshaler(u) => u.on_request_ready(request).map_err(BoxError::from),
            Self::User(hook) => hook(request),
        }
    }
}

impl<'a> Request<'a> {
    pub(crate) fn new(
        client: &HttpClient,
        method: Method,
        target: String,
        body: Option<Body>,
    ) -> Self {
        Self {
            transport: Arc::clone(client.transport()),
            timeout: client.default_timeout(),
            base_url: client.base_url().cloned(),
            method,
            target,
            query: Vec::new(),
            body,
            destination: None,
            options: Arc::clone(client.shared_options()),
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL or path as given.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Body as given.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Effective options for this request.
    pub fn request_options(&self) -> &RequestOptions {
        &self.options
    }

    /// Whether the response body will be decoded and closed by
    /// [`execute`](Self::execute).
    pub fn decodes_body(&self) -> bool {
        self.destination.is_some()
    }

    fn options_mut(&mut self) -> &mut RequestOptions {
        Arc::make_mut(&mut self.options)
    }

    /// Decode the response body into `destination` with the configured
    /// unmarshaler, then close it.
    ///
    /// Without this the body is left unread and the caller owns it.
    pub fn write_body_to(mut self, destination: Destination<'a>) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a timeout for this request only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the body marshaler for this request only.
    pub fn body_marshaler(mut self, marshaler: impl BodyMarshaler + 'static) -> Self {
        self.options_mut().set_body_marshaler(Arc::new(marshaler));
        self
    }

    /// Set the body unmarshaler for this request only.
    pub fn body_unmarshaler(mut self, unmarshaler: impl BodyUnmarshaler + 'static) -> Self {
        self.options_mut().set_body_unmarshaler(Arc::new(unmarshaler));
        self
    }

    /// Set a header, overriding a client header of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options_mut().set_header(name, value);
        self
    }

    /// Set several headers, overriding client headers of the same names.
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

    /// Replace the request-ready hook for this request only.
    pub fn on_request_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut reqwest::Request) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.options_mut().set_on_request_ready(Arc::new(hook));
        self
    }

    /// Replace the response-ready hook for this request only.
    pub fn on_response_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.options_mut().set_on_response_ready(Arc::new(hook));
        self
    }

    /// Add an error hook for this request only.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ErrorContext<'_>) + Send + Sync + 'static,
    {
        self.options_mut().add_on_error(Arc::new(hook));
        self
    }

    /// Dump this request through `tracing` if it fails.
    pub fn dump_on_error(mut self) -> Self {
        self.options_mut().enable_dump_on_error();
        self
    }

    /// Dump this request into `sink` if it fails.
    pub fn dump_on_error_to<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let sink: DiagnosticSink = Arc::new(sink);
        self.options_mut().enable_dump_on_error_to(sink);
        self
    }

    /// Enable or disable stack traces for this request.
    pub fn stack_trace(mut self, enabled: bool) -> Self {
        self.options_mut().set_stack_trace_enabled(enabled);
        self
    }

    fn build_url(&self) -> crate::Result<Url> {
        let mut url = match &self.base_url {
            Some(base) => base
                .join(&self.target)
                .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?,
            None => Url::parse(&self.target)
                .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?,
        };

        if !self.query.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                query_pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Build the transport request: URL, staged body, headers and timeout.
    fn build_request(&self, staged: Option<Vec<u8>>) -> crate::Result<reqwest::Request> {
        let mut request = reqwest::Request::new(self.method.clone(), self.build_url()?);

        if let Some(staged) = staged {
            *request.body_mut() = Some(reqwest::Body::from(staged));
        }

        for (name, value) in self.options.headers() {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| HttpClientError::RequestBuild(format!("header {:?}: {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| HttpClientError::RequestBuild(format!("header {}: {}", name, e)))?;
            request.headers_mut().insert(name, value);
        }

        *request.timeout_mut() = Some(self.timeout);
        Ok(request)
    }

    /// Run the call.
    ///
    /// Encodes the body, builds the request, runs the ready hooks (codec
    /// hooks first, the user hook last), sends it once, runs the
    /// response-ready hook, rejects non-2xx statuses and, when a destination
    /// was given, decodes and closes the body.
    ///
    /// Failures before a response arrived carry no response. Response-hook,
    /// status and decode failures carry the response in the returned
    /// [`RequestError`].
    pub async fn execute(mut self) -> Result<Response, RequestError> {
        let options = Arc::clone(&self.options);
        let mut body = self.body.take();
        let mut destination = self.destination.take();
        let decode = destination.is_some();
        let mut ready_hooks = Vec::new();

        let staged = match body.as_mut() {
            Some(original) => {
                let Some(marshaler) = options.body_marshaler() else {
                    return Err(fail(
                        &options,
                        decode,
                        HttpClientError::MissingMarshaler,
                        None,
                        None,
                        body.as_ref(),
                    )
                    .await);
                };
                ready_hooks.push(ReadyHook::Marshaler(&**marshaler));

                let mut staged = Vec::new();
                if let Err(e) = marshaler.marshal(Some(original), &mut staged) {
                    return Err(fail(
                        &options,
                        decode,
                        HttpClientError::Marshal(e),
                        None,
                        None,
                        body.as_ref(),
                    )
                    .await);
                }
                Some(staged)
            }
            None => None,
        };

        let mut request = match self.build_request(staged) {
            Ok(request) => request,
            Err(e) => return Err(fail(&options, decode, e, None, None, body.as_ref()).await),
        };

        if let Some(unmarshaler) = options.body_unmarshaler() {
            ready_hooks.push(ReadyHook::Unmarshaler(&**unmarshaler));
        }
        if let Some(hook) = options.on_request_ready() {
            ready_hooks.push(ReadyHook::User(hook));
        }
        for hook in &ready_hooks {
            if let Err(e) = hook.run(&mut request) {
                return Err(fail(
                    &options,
                    decode,
                    HttpClientError::RequestHook(e),
                    Some(&request),
                    None,
                    body.as_ref(),
                )
                .await);
            }
        }

        // The request is moved into the transport; keep a copy for error hooks.
        let snapshot = if options.error_hooks().is_empty() {
            None
        } else {
            request.try_clone()
        };

        debug!(
            method = %request.method(),
            url = %request.url(),
            decode,
            "Dispatching HTTP request"
        );

        let mut response = match self.transport.send(request).await {
            Ok(response) => Response::from_reqwest(response),
            Err(e) => {
                return Err(fail(
                    &options,
                    decode,
                    e,
                    snapshot.as_ref(),
                    None,
                    body.as_ref(),
                )
                .await);
            }
        };

        debug!(status = %response.status(), "Received HTTP response");

        if let Some(hook) = options.on_response_ready()
            && let Err(e) = hook(&response)
        {
            return Err(fail(
                &options,
                decode,
                HttpClientError::ResponseHook(e),
                snapshot.as_ref(),
                Some(response),
                body.as_ref(),
            )
            .await);
        }

        if !is_success_status(response.status()) {
            let error = HttpClientError::Status {
                status: response.status().as_u16(),
                status_line: response.status_line(),
            };
            return Err(fail(
                &options,
                decode,
                error,
                snapshot.as_ref(),
                Some(response),
                body.as_ref(),
            )
            .await);
        }

        let Some(destination) = destination.as_mut() else {
            return Ok(response);
        };

        let Some(unmarshaler) = options.body_unmarshaler() else {
            return Err(fail(
                &options,
                decode,
                HttpClientError::MissingUnmarshaler,
                snapshot.as_ref(),
                Some(response),
                body.as_ref(),
            )
            .await);
        };

        let mut source = response.take_stream();
        let decoded = unmarshaler
            .unmarshal(Some(destination), source.as_mut())
            .await;
        drop(source);

        match decoded {
            Ok(()) => Ok(response),
            Err(e) => Err(fail(
                &options,
                decode,
                HttpClientError::Unmarshal(e),
                snapshot.as_ref(),
                Some(response),
                body.as_ref(),
            )
            .await),
        }
    }
}

/// Enrich `error`, hand it to the error hooks and wrap it for the caller.
///
/// When error hooks are installed the response body is buffered first so the
/// dump can show it and the caller can still read it afterwards. When the
/// caller asked for decoding, the body is closed before returning.
async fn fail(
    options: &RequestOptions,
    close_body: bool,
    error: HttpClientError,
    request: Option<&reqwest::Request>,
    mut response: Option<Response>,
    body: Option<&Body>,
) -> RequestError {
    debug!(error = %error, "HTTP request failed");

    let stack = options
        .stack_trace_enabled()
        .then(diagnostics::capture_stack);
    let failure = RequestError::new(error, stack);

    if !options.error_hooks().is_empty() {
        if let Some(response) = response.as_mut()
            && let Err(e) = response.buffer().await
        {
            debug!(error = %e, "Could not buffer response body for error hooks");
        }

        let context = ErrorContext {
            request,
            response: response.as_ref(),
            error: &failure,
            body,
        };
        for hook in options.error_hooks() {
            hook(&context);
        }
    }

    if close_body && let Some(response) = response.as_mut() {
        response.close();
    }

    failure.with_response(response)
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("destination", &self.destination)
            .field("timeout", &self.timeout)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::{HttpClientError, JsonBodyMarshaler, JsonBodyUnmarshaler};

    /// Transport that counts calls and answers with a fixed response.
    struct CountingTransport {
        calls: Arc<AtomicUsize>,
        status: u16,
        body: &'static str,
    }

    impl CountingTransport {
        fn new(status: u16, body: &'static str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                calls: Arc::clone(&calls),
                status,
                body,
            };
            (transport, calls)
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _request: reqwest::Request) -> crate::Result<reqwest::Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    fn client(status: u16, body: &'static str) -> (HttpClient, Arc<AtomicUsize>) {
        let (transport, calls) = CountingTransport::new(status, body);
        (HttpClient::with_transport(transport), calls)
    }

    #[tokio::test]
    async fn test_request_hook_failure_skips_dispatch() {
        let (client, calls) = client(200, "ok");
        let err = client
            .get("http://localhost/items")
            .on_request_ready(|_| Err("denied".into()))
            .execute()
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err.error(), HttpClientError::RequestHook(_)));
        assert!(err.response().is_none());
        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_request_setters_do_not_touch_client() {
        let (client, _) = client(200, "ok");
        let client = client.header("X-Shared", "client");

        let request = client
            .get("http://localhost/")
            .header("X-Shared", "request")
            .stack_trace(true);

        assert_eq!(request.request_options().header("x-shared"), Some("request"));
        assert_eq!(client.request_options().header("x-shared"), Some("client"));
        assert!(!client.request_options().stack_trace_enabled());
    }

    #[tokio::test]
    async fn test_user_hook_sees_codec_headers() {
        let (client, calls) = client(200, "{}");
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);

        let client = client
            .body_marshaler(JsonBodyMarshaler)
            .body_unmarshaler(JsonBodyUnmarshaler)
            .header("X-Client", "1");

        client
            .post("http://localhost/items", Body::json(serde_json::json!({"name": "a"})))
            .header("X-Request", "2")
            .on_request_ready(move |request| {
                let headers = request.headers();
                *captured.lock() = Some((
                    headers.get("content-type").cloned(),
                    headers.get("accept").cloned(),
                    headers.get("x-client").cloned(),
                    headers.get("x-request").cloned(),
                ));
                Ok(())
            })
            .execute()
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (content_type, accept, x_client, x_request) = seen.lock().take().unwrap();
        assert_eq!(content_type.unwrap(), "application/json");
        assert_eq!(accept.unwrap(), "application/json");
        assert_eq!(x_client.unwrap(), "1");
        assert_eq!(x_request.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_request_header_overrides_client_header() {
        let (client, _) = client(200, "");
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);

        client
            .header("Authorization", "Bearer client")
            .get("http://localhost/")
            .header("authorization", "Bearer request")
            .on_request_ready(move |request| {
                *captured.lock() = request.headers().get("authorization").cloned();
                Ok(())
            })
            .execute()
            .await
            .unwrap();

        assert_eq!(seen.lock().take().unwrap(), "Bearer request");
    }

    #[tokio::test]
    async fn test_missing_marshaler() {
        let (client, calls) = client(200, "ok");
        let mut request = client.post("http://localhost/", "hello");
        request.options_mut().clear_body_marshaler();

        let err = request.execute().await.unwrap_err();
        assert!(matches!(err.error(), HttpClientError::MissingMarshaler));
        assert!(err.response().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_marshal_failure_keeps_original_body() {
        let (client, calls) = client(200, "ok");
        let seen = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&seen);

        let err = client
            .post("http://localhost/", Body::json(vec![1, 2, 3]))
            .on_error(move |ctx| {
                *captured.lock() = format!("{:?}", ctx.body);
            })
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err.error(), HttpClientError::Marshal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().contains("[1, 2, 3]"));
    }

    #[tokio::test]
    async fn test_missing_unmarshaler_returns_response() {
        let (client, calls) = client(200, "payload");
        let mut out = String::new();
        let mut request = client.get("http://localhost/").write_body_to(Destination::text(&mut out));
        request.options_mut().clear_body_unmarshaler();

        let err = request.execute().await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err.error(), HttpClientError::MissingUnmarshaler));
        assert!(err.to_string().contains("unmarshaler"));
        assert!(err.response().is_some());
    }

    #[tokio::test]
    async fn test_status_error_carries_code_and_response() {
        let (client, _) = client(404, "missing");
        let mut err = client
            .get("http://localhost/missing")
            .execute()
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("404"));
        let response = err.response_mut().unwrap();
        assert_eq!(response.text().await.unwrap(), "missing");
    }

    #[tokio::test]
    async fn test_response_hook_failure_keeps_response() {
        let (client, _) = client(200, "ok");
        let err = client
            .get("http://localhost/")
            .on_response_ready(|_| Err("rejected".into()))
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err.error(), HttpClientError::ResponseHook(_)));
        assert_eq!(err.response().unwrap().status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stack_trace_in_message() {
        let (client, _) = client(500, "boom");
        let err = client
            .stack_trace(true)
            .get("http://localhost/")
            .execute()
            .await
            .unwrap_err();

        assert!(err.stack_trace().is_some());
        let message = err.to_string();
        assert!(message.starts_with("500 Internal Server Error:500"));
        assert!(message.contains("\nStack trace:\n"));
    }

    #[tokio::test]
    async fn test_dump_sink_receives_dump_and_body_stays_readable() {
        let (client, _) = client(500, "server said no");
        let dumps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&dumps);

        let mut err = client
            .dump_on_error_to(move |dump| sink.lock().push(dump.to_string()))
            .post("http://localhost/upload", "hello")
            .execute()
            .await
            .unwrap_err();

        let dumps = dumps.lock();
        assert_eq!(dumps.len(), 1);
        assert!(dumps[0].contains("Request: POST http://localhost/upload"));
        assert!(dumps[0].contains("Response status code: 500"));
        assert!(dumps[0].contains("server said no"));
        assert!(dumps[0].contains("Original body: hello"));
        assert!(err.stack_trace().is_some());

        let response = err.response_mut().unwrap();
        assert_eq!(response.text().await.unwrap(), "server said no");
    }

    #[tokio::test]
    async fn test_decode_closes_body() {
        let (client, _) = client(200, r#"{"status":"success"}"#);
        let mut out: HashMap<String, String> = HashMap::new();

        let mut response = client
            .body_unmarshaler(JsonBodyUnmarshaler)
            .get("http://localhost/")
            .write_body_to(Destination::value(&mut out))
            .execute()
            .await
            .unwrap();

        assert!(response.is_closed());
        assert!(matches!(
            response.text().await,
            Err(HttpClientError::BodyConsumed)
        ));
        assert_eq!(out.get("status").map(String::as_str), Some("success"));
    }

    #[tokio::test]
    async fn test_decode_ignores_trailing_values() {
        let (client, _) = client(200, "{\"a\":1}\n{\"b\":2}");
        let mut out = serde_json::Value::Null;

        let response = client
            .body_unmarshaler(JsonBodyUnmarshaler)
            .get("http://localhost/")
            .write_body_to(Destination::value(&mut out))
            .execute()
            .await
            .unwrap();

        assert!(response.is_closed());
        assert_eq!(out, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_decode_failure_closes_body() {
        let (client, _) = client(200, "not json");
        let mut out: HashMap<String, String> = HashMap::new();

        let err = client
            .body_unmarshaler(JsonBodyUnmarshaler)
            .get("http://localhost/")
            .write_body_to(Destination::value(&mut out))
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err.error(), HttpClientError::Unmarshal(_)));
        assert!(err.response().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_passthrough_leaves_body_to_caller() {
        let (client, _) = client(200, "raw body");
        let mut response = client.get("http://localhost/").execute().await.unwrap();

        assert!(!response.is_closed());
        assert_eq!(response.text().await.unwrap(), "raw body");
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let (client, calls) = client(200, "");
        let err = client.get("not a url").execute().await.unwrap_err();
        assert!(matches!(err.error(), HttpClientError::InvalidUrl(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_pairs_are_appended() {
        let (client, _) = client(200, "");
        let seen = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&seen);

        client
            .get("http://localhost/api/items?sort=asc")
            .query("page", "2")
            .query("q", "a b")
            .on_request_ready(move |request| {
                *captured.lock() = request.url().to_string();
                Ok(())
            })
            .execute()
            .await
            .unwrap();

        assert_eq!(*seen.lock(), "http://localhost/api/items?sort=asc&page=2&q=a+b");
    }
}
