//! Response body unmarshalers.

use std::io;

use async_trait::async_trait;
use base64::Engine;
use http::HeaderValue;
use http::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::{BodyStream, CodecError, Destination};

/// Decodes response bodies into caller supplied destinations.
///
/// The body arrives as a [`BodyStream`]; implementations pull chunks as they
/// need them, so sinks can be filled without holding the whole body.
#[async_trait]
pub trait BodyUnmarshaler: Send + Sync {
    /// Decode `source` into `destination`.
    async fn unmarshal(
        &self,
        destination: Option<&mut Destination<'_>>,
        source: Option<&mut BodyStream>,
    ) -> Result<(), CodecError>;

    /// Prepare the outgoing request, typically by setting `Accept`.
    fn on_request_ready(&self, _request: &mut reqwest::Request) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Decodes JSON response bodies and sets `Accept: application/json`.
///
/// Only the first JSON value of the body is decoded; trailing data is
/// ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyUnmarshaler;

impl JsonBodyUnmarshaler {
    /// Create a JSON unmarshaler.
    pub fn new() -> Self {
        Self
    }
}

fn first_value<T: DeserializeOwned>(document: &[u8]) -> serde_json::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(document);
    serde::Deserialize::deserialize(&mut deserializer)
}

#[async_trait]
impl BodyUnmarshaler for JsonBodyUnmarshaler {
    async fn unmarshal(
        &self,
        destination: Option<&mut Destination<'_>>,
        source: Option<&mut BodyStream>,
    ) -> Result<(), CodecError> {
        let source = source.ok_or(CodecError::MissingReader)?;
        let destination = destination.ok_or(CodecError::MissingDestination)?;

        match destination {
            Destination::Value(value) => {
                let document = source.read_to_end().await?;
                (**value).read_json(&mut document.as_slice())?;
            }
            Destination::Text(text) => {
                let document = source.read_to_end().await?;
                **text = first_value(&document)?;
            }
            Destination::Bytes(buffer) => {
                let document = source.read_to_end().await?;
                let encoded: String = first_value(&document)?;
                **buffer = base64::engine::general_purpose::STANDARD.decode(encoded)?;
            }
            Destination::Writer(_) => {
                return Err(CodecError::UnsupportedDestination {
                    codec: "json",
                    kind: "writer",
                });
            }
        }
        Ok(())
    }

    fn on_request_ready(&self, request: &mut reqwest::Request) -> Result<(), CodecError> {
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(())
    }
}

/// Copies response bodies verbatim into writers, byte buffers or strings.
///
/// Writers receive the body chunk by chunk as it arrives. This is the client
/// default. Structured destinations are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBodyUnmarshaler;

impl RawBodyUnmarshaler {
    /// Create a raw passthrough unmarshaler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BodyUnmarshaler for RawBodyUnmarshaler {
    async fn unmarshal(
        &self,
        destination: Option<&mut Destination<'_>>,
        source: Option<&mut BodyStream>,
    ) -> Result<(), CodecError> {
        let source = source.ok_or(CodecError::MissingReader)?;
        let destination = destination.ok_or(CodecError::MissingDestination)?;

        match destination {
            Destination::Writer(writer) => {
                while let Some(chunk) = source.chunk().await? {
                    writer.write_all(&chunk)?;
                }
                writer.flush()?;
            }
            Destination::Bytes(buffer) => {
                **buffer = source.read_to_end().await?;
            }
            Destination::Text(text) => {
                let read = source.read_to_end().await?;
                **text = String::from_utf8(read)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
            Destination::Value(_) => {
                return Err(CodecError::UnsupportedDestination {
                    codec: "raw",
                    kind: "value",
                });
            }
        }
        Ok(())
    }
}
