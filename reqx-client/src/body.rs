//! Request body values and response decode destinations.

use std::fmt;
use std::io::{Read, Write};

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A structured value that codecs can serialize.
///
/// Implemented for every `Serialize + Debug` type; the `Debug` output is
/// what the diagnostic dump prints for the original body.
pub trait SerializeBody: Send + Sync {
    /// Write the value as JSON.
    fn write_json(&self, writer: &mut dyn Write) -> serde_json::Result<()>;

    /// Encode the value as `application/x-www-form-urlencoded`.
    fn to_form(&self) -> Result<String, serde_urlencoded::ser::Error>;

    /// Human readable rendering.
    fn describe(&self) -> String;
}

impl<T> SerializeBody for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn write_json(&self, writer: &mut dyn Write) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }

    fn to_form(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self)
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

/// Request body as supplied by the caller, before marshaling.
pub enum Body {
    /// Raw bytes.
    Bytes(Bytes),
    /// Text.
    Text(String),
    /// Readable stream, drained by the marshaler.
    Reader(Box<dyn Read + Send + Sync>),
    /// Structured value.
    Value(Box<dyn SerializeBody>),
}

impl Body {
    /// Wrap a structured value.
    pub fn json<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Self::Value(Box::new(value))
    }

    /// Wrap a readable stream.
    pub fn reader(reader: impl Read + Send + Sync + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Short name of the variant, used in codec errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Reader(_) => "reader",
            Self::Value(_) => "value",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(&v.describe()).finish(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::json(value)
    }
}

/// A value the JSON unmarshaler can decode into.
pub trait DeserializeBody {
    /// Replace `self` with the first JSON value read from `reader`.
    ///
    /// Anything after that value is left unread.
    fn read_json(&mut self, reader: &mut dyn Read) -> serde_json::Result<()>;
}

impl<T: DeserializeOwned> DeserializeBody for T {
    fn read_json(&mut self, reader: &mut dyn Read) -> serde_json::Result<()> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        *self = serde::Deserialize::deserialize(&mut deserializer)?;
        Ok(())
    }
}

/// Where a decoded response body is written.
pub enum Destination<'a> {
    /// Byte buffer, replaced with the body.
    Bytes(&'a mut Vec<u8>),
    /// Text cell, replaced with the body.
    Text(&'a mut String),
    /// Sink the body is copied into.
    Writer(&'a mut (dyn Write + Send)),
    /// Structured value.
    Value(&'a mut (dyn DeserializeBody + Send)),
}

impl<'a> Destination<'a> {
    /// Decode into a byte buffer.
    pub fn bytes(buffer: &'a mut Vec<u8>) -> Self {
        Self::Bytes(buffer)
    }

    /// Decode into a string.
    pub fn text(text: &'a mut String) -> Self {
        Self::Text(text)
    }

    /// Copy into a writer.
    pub fn writer<W: Write + Send + 'a>(writer: &'a mut W) -> Self {
        Self::Writer(writer)
    }

    /// Deserialize into a structured value.
    pub fn value<T: DeserializeOwned + Send + 'a>(value: &'a mut T) -> Self {
        Self::Value(value)
    }

    /// Short name of the variant, used in codec errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Writer(_) => "writer",
            Self::Value(_) => "value",
        }
    }
}

impl fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Destination::{}", self.kind())
    }
}
