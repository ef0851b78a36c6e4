//! Request body marshalers.

use std::io::{self, Write};

use base64::Engine;
use http::HeaderValue;
use http::header::CONTENT_TYPE;

use crate::{Body, CodecError};

/// Encodes request bodies.
///
/// Besides encoding, a marshaler gets a chance to prepare the outgoing
/// request (typically by stamping `Content-Type`) right before the
/// user's request-ready hook runs.
pub trait BodyMarshaler: Send + Sync {
    /// Encode `body` into `writer`.
    fn marshal(&self, body: Option<&mut Body>, writer: &mut dyn Write) -> Result<(), CodecError>;

    /// Prepare the outgoing request.
    fn on_request_ready(&self, _request: &mut reqwest::Request) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Marshals bodies as JSON and sets `Content-Type: application/json`.
///
/// The encoded document is followed by a newline, as a streaming JSON
/// encoder would write it. Text bodies become JSON strings and byte bodies
/// become base64 encoded JSON strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyMarshaler;

impl JsonBodyMarshaler {
    /// Create a JSON marshaler.
    pub fn new() -> Self {
        Self
    }
}

impl BodyMarshaler for JsonBodyMarshaler {
    fn marshal(&self, body: Option<&mut Body>, writer: &mut dyn Write) -> Result<(), CodecError> {
        let body = body.ok_or(CodecError::MissingBody)?;
        match body {
            Body::Value(value) => value.write_json(&mut *writer)?,
            Body::Text(text) => serde_json::to_writer(&mut *writer, text.as_str())?,
            Body::Bytes(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::to_writer(&mut *writer, &encoded)?
            }
            Body::Reader(_) => {
                return Err(CodecError::UnsupportedBody {
                    codec: "json",
                    kind: "reader",
                });
            }
        }
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn on_request_ready(&self, request: &mut reqwest::Request) -> Result<(), CodecError> {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }
}

/// Passes bytes, text and readers through unchanged.
///
/// This is the client default. Structured values are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBodyMarshaler;

impl RawBodyMarshaler {
    /// Create a raw passthrough marshaler.
    pub fn new() -> Self {
        Self
    }
}

impl BodyMarshaler for RawBodyMarshaler {
    fn marshal(&self, body: Option<&mut Body>, writer: &mut dyn Write) -> Result<(), CodecError> {
        match body.ok_or(CodecError::MissingBody)? {
            Body::Bytes(bytes) => writer.write_all(bytes)?,
            Body::Text(text) => writer.write_all(text.as_bytes())?,
            Body::Reader(reader) => {
                io::copy(reader, writer)?;
            }
            Body::Value(_) => {
                return Err(CodecError::UnsupportedBody {
                    codec: "raw",
                    kind: "value",
                });
            }
        }
        Ok(())
    }
}

/// Marshals structured bodies as `application/x-www-form-urlencoded`.
///
/// Text and byte bodies are assumed to be encoded already.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormBodyMarshaler;

impl FormBodyMarshaler {
    /// Create a form marshaler.
    pub fn new() -> Self {
        Self
    }
}

impl BodyMarshaler for FormBodyMarshaler {
    fn marshal(&self, body: Option<&mut Body>, writer: &mut dyn Write) -> Result<(), CodecError> {
        match body.ok_or(CodecError::MissingBody)? {
            Body::Value(value) => writer.write_all(value.to_form()?.as_bytes())?,
            Body::Text(text) => writer.write_all(text.as_bytes())?,
            Body::Bytes(bytes) => writer.write_all(bytes)?,
            Body::Reader(_) => {
                return Err(CodecError::UnsupportedBody {
                    codec: "form",
                    kind: "reader",
                });
            }
        }
        Ok(())
    }

    fn on_request_ready(&self, request: &mut reqwest::Request) -> Result<(), CodecError> {
        request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::io::Cursor;

    #[derive(Debug, Serialize)]
    struct Order {
        item: String,
        quantity: u32,
    }

    fn encode(marshaler: &dyn BodyMarshaler, mut body: Body) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        marshaler.marshal(Some(&mut body), &mut out)?;
        Ok(out)
    }

    fn empty_request() -> reqwest::Request {
        reqwest::Request::new(
            http::Method::POST,
            url::Url::parse("http://localhost/").unwrap(),
        )
    }

    #[test]
    fn test_json_marshals_value_with_newline() {
        let body = Body::json(Order {
            item: "widget".into(),
            quantity: 5,
        });
        let out = encode(&JsonBodyMarshaler, body).unwrap();
        assert_eq!(out, b"{\"item\":\"widget\",\"quantity\":5}\n");
    }

    #[test]
    fn test_json_marshals_text_and_bytes() {
        assert_eq!(encode(&JsonBodyMarshaler, "hi".into()).unwrap(), b"\"hi\"\n");
        assert_eq!(
            encode(&JsonBodyMarshaler, b"hi".as_slice().into()).unwrap(),
            b"\"aGk=\"\n"
        );
    }

    #[test]
    fn test_json_rejects_missing_body_and_reader() {
        let mut out = Vec::new();
        let err = JsonBodyMarshaler.marshal(None, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::MissingBody));

        let err = encode(&JsonBodyMarshaler, Body::reader(Cursor::new(b"x".to_vec()))).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedBody { codec: "json", .. }));
    }

    #[test]
    fn test_json_sets_content_type() {
        let mut request = empty_request();
        JsonBodyMarshaler.on_request_ready(&mut request).unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(encode(&RawBodyMarshaler, "hello".into()).unwrap(), b"hello");
        assert_eq!(
            encode(&RawBodyMarshaler, vec![0u8, 159, 146, 150].into()).unwrap(),
            vec![0u8, 159, 146, 150]
        );
        assert_eq!(
            encode(&RawBodyMarshaler, Body::reader(Cursor::new(b"streamed".to_vec()))).unwrap(),
            b"streamed"
        );
    }

    #[test]
    fn test_raw_rejects_structured_value() {
        let err = encode(&RawBodyMarshaler, Body::json(vec![1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "unsupported body type for raw: value");
    }

    #[test]
    fn test_raw_leaves_headers_alone() {
        let mut request = empty_request();
        RawBodyMarshaler.on_request_ready(&mut request).unwrap();
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_form_marshaler() {
        let body = Body::json(Order {
            item: "a b".into(),
            quantity: 2,
        });
        assert_eq!(encode(&FormBodyMarshaler, body).unwrap(), b"item=a+b&quantity=2");

        let mut request = empty_request();
        FormBodyMarshaler.on_request_ready(&mut request).unwrap();
        assert_eq!(
            request.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
    }
}
