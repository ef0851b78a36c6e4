//! HTTP response wrapper.

use std::collections::VecDeque;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use hyper::ext::ReasonPhrase;
use serde::de::DeserializeOwned;

use crate::{CodecError, HttpClientError, Result};

/// State of the response body. The body can be read once from the stream;
/// buffering keeps it around for later reads until it is closed.
enum ResponseBody {
    Streaming(reqwest::Response),
    Buffered(Bytes),
    Closed,
}

/// HTTP response wrapper.
///
/// The body is a single-consumer resource. When a request was executed with
/// [`Request::write_body_to`](crate::Request::write_body_to) the executor
/// reads and closes it; otherwise the caller owns it and it is released when
/// the response is dropped or [`close`](Self::close)d.
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    version: Version,
    headers: HeaderMap,
    url: url::Url,
    body: ResponseBody,
}

impl Response {
    /// Wrap a reqwest response without reading its body.
    pub(crate) fn from_reqwest(response: reqwest::Response) -> Self {
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned());

        Self {
            status: response.status(),
            reason,
            version: response.version(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            body: ResponseBody::Streaming(response),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status line, e.g. `404 Not Found`.
    ///
    /// Uses the reason phrase the server sent, falling back to the canonical
    /// one for the status code.
    pub fn status_line(&self) -> String {
        let reason = self.reason.as_deref().or(self.status.canonical_reason());
        match reason {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the response URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Get the content length if available.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// The body, if it has been buffered.
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether the body has been read and released.
    pub fn is_closed(&self) -> bool {
        matches!(self.body, ResponseBody::Closed)
    }

    /// Read the whole body into memory, keeping it for later reads.
    pub async fn buffer(&mut self) -> Result<&Bytes> {
        if let ResponseBody::Streaming(_) = self.body
            && let Some(bytes) = self.take_body().await?
        {
            self.body = ResponseBody::Buffered(bytes);
        }
        match &self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            _ => Err(HttpClientError::BodyConsumed),
        }
    }

    /// Get the response body as bytes.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        self.buffer().await.cloned()
    }

    /// Get the response body as text.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.buffer().await?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Parse the response body as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.buffer().await?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Consume the response and return the body as bytes.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        self.take_body().await?.ok_or(HttpClientError::BodyConsumed)
    }

    /// Release the body. Later reads fail with
    /// [`HttpClientError::BodyConsumed`].
    pub fn close(&mut self) {
        self.body = ResponseBody::Closed;
    }

    /// Hand the unread body over as a stream and close it here. Returns
    /// `None` if it was closed already.
    pub(crate) fn take_stream(&mut self) -> Option<BodyStream> {
        match std::mem::replace(&mut self.body, ResponseBody::Closed) {
            ResponseBody::Streaming(response) => Some(BodyStream {
                source: StreamSource::Response(response),
            }),
            ResponseBody::Buffered(bytes) => Some(BodyStream::from(bytes)),
            ResponseBody::Closed => None,
        }
    }

    /// Read the body and close it. Returns `None` if it was closed already.
    pub(crate) async fn take_body(&mut self) -> Result<Option<Bytes>> {
        match std::mem::replace(&mut self.body, ResponseBody::Closed) {
            ResponseBody::Streaming(response) => Ok(Some(response.bytes().await?)),
            ResponseBody::Buffered(bytes) => Ok(Some(bytes)),
            ResponseBody::Closed => Ok(None),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            ResponseBody::Streaming(_) => "streaming",
            ResponseBody::Buffered(_) => "buffered",
            ResponseBody::Closed => "closed",
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &body)
            .finish()
    }
}

/// Response body read chunk by chunk by a
/// [`BodyUnmarshaler`](crate::BodyUnmarshaler).
pub struct BodyStream {
    source: StreamSource,
}

enum StreamSource {
    Response(reqwest::Response),
    Chunks(VecDeque<Bytes>),
}

impl BodyStream {
    /// Stream over in-memory chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Self {
            source: StreamSource::Chunks(chunks.into_iter().collect()),
        }
    }

    /// Next chunk of the body, or `None` at the end.
    pub async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, CodecError> {
        match &mut self.source {
            StreamSource::Response(response) => response.chunk().await.map_err(CodecError::Body),
            StreamSource::Chunks(chunks) => Ok(chunks.pop_front()),
        }
    }

    /// Read the rest of the body into memory.
    pub async fn read_to_end(&mut self) -> std::result::Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

impl From<Bytes> for BodyStream {
    fn from(bytes: Bytes) -> Self {
        Self::from_chunks([bytes])
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            StreamSource::Response(_) => f.write_str("BodyStream::Response"),
            StreamSource::Chunks(chunks) => write!(f, "BodyStream::Chunks({})", chunks.len()),
        }
    }
}

/// Whether `status` is in the 2xx range.
pub fn is_success_status(status: StatusCode) -> bool {
    (200..300).contains(&status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> Response {
        let inner = http::Response::builder()
            .status(status)
            .header("content-type", "text/plain")
            .body(body)
            .unwrap();
        Response::from_reqwest(reqwest::Response::from(inner))
    }

    #[test]
    fn test_status_helpers() {
        let resp = response(404, "");
        assert_eq!(resp.status_line(), "404 Not Found");
        assert!(resp.is_client_error());
        assert!(!resp.is_success());
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(response(599, "").status_line(), "599");
    }

    #[test]
    fn test_success_range() {
        assert!(is_success_status(StatusCode::OK));
        assert!(is_success_status(StatusCode::from_u16(299).unwrap()));
        assert!(!is_success_status(StatusCode::from_u16(300).unwrap()));
        assert!(!is_success_status(StatusCode::from_u16(199).unwrap()));
    }

    #[tokio::test]
    async fn test_buffer_allows_rereads() {
        let mut resp = response(200, "payload");
        assert!(resp.buffered_body().is_none());
        assert_eq!(resp.text().await.unwrap(), "payload");
        assert_eq!(resp.bytes().await.unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(resp.buffered_body().unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_closed_body_is_consumed() {
        let mut resp = response(200, "payload");
        resp.close();
        assert!(resp.is_closed());
        assert!(matches!(resp.bytes().await, Err(HttpClientError::BodyConsumed)));
    }

    #[tokio::test]
    async fn test_take_body_closes_once() {
        let mut resp = response(200, "payload");
        let first = resp.take_body().await.unwrap();
        assert_eq!(first.as_deref(), Some(&b"payload"[..]));
        assert!(resp.take_body().await.unwrap().is_none());
        assert!(resp.is_closed());
    }

    #[test]
    fn test_status_line_keeps_server_reason() {
        let mut inner = http::Response::builder().status(418).body("").unwrap();
        inner
            .extensions_mut()
            .insert(ReasonPhrase::from_static(b"Out Of Tea"));
        let resp = Response::from_reqwest(reqwest::Response::from(inner));
        assert_eq!(resp.status_line(), "418 Out Of Tea");

        assert_eq!(response(418, "").status_line(), "418 I'm a teapot");
    }

    #[tokio::test]
    async fn test_take_stream_closes_body() {
        let mut resp = response(200, "streamed");
        let mut stream = resp.take_stream().unwrap();
        assert!(resp.is_closed());
        assert!(resp.take_stream().is_none());
        assert_eq!(stream.read_to_end().await.unwrap(), b"streamed");
        assert!(stream.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_from_chunks() {
        let mut stream = BodyStream::from_chunks([
            Bytes::from_static(b"ab"),
            Bytes::from_static(b"cd"),
        ]);
        assert_eq!(stream.chunk().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(stream.read_to_end().await.unwrap(), b"cd");
    }

    #[tokio::test]
    async fn test_json_body() {
        let mut resp = response(200, r#"{"ok":true}"#);
        let value: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(value["ok"], true);
    }
}
