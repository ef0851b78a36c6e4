//! # Reqx HTTP Client
//!
//! A request-execution pipeline over a pooled HTTP transport: pluggable
//! body codecs, request/response hooks, status checking and diagnostic
//! dumps of failed calls.
//!
//! ## Features
//!
//! - **Body Codecs**: JSON, form and raw passthrough marshalers/unmarshalers
//! - **Copy-on-write Options**: Request-level settings never leak into the client
//! - **Hooks**: Inspect or amend the prepared request and the received response
//! - **Status Checking**: Any non-2xx status is an error that still carries the response
//! - **Diagnostics**: Stack traces and request/response dumps on failure
//! - **Single Attempt**: No implicit retries; one `execute` is one request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reqx_client::HttpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new();
//!
//!     let mut response = client
//!         .get("https://api.example.com/users")
//!         .execute()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     println!("Body: {}", response.text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## JSON Round Trip
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use reqx_client::{Body, Destination, HttpClient, JsonBodyMarshaler, JsonBodyUnmarshaler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new()
//!         .body_marshaler(JsonBodyMarshaler)
//!         .body_unmarshaler(JsonBodyUnmarshaler)
//!         .bearer_auth("token")
//!         .dump_on_error();
//!
//!     let mut created: HashMap<String, serde_json::Value> = HashMap::new();
//!     client
//!         .post(
//!             "https://api.example.com/orders",
//!             Body::json(serde_json::json!({"item": "widget", "quantity": 5})),
//!         )
//!         .write_body_to(Destination::value(&mut created))
//!         .execute()
//!         .await?;
//!
//!     println!("Created: {:?}", created);
//!     Ok(())
//! }
//! ```

mod body;
mod client;
mod config;
pub mod diagnostics;
mod error;
pub mod hooks;
mod marshal;
mod options;
mod request;
mod response;
mod transport;
mod unmarshal;

pub use body::{Body, DeserializeBody, Destination, SerializeBody};
pub use client::HttpClient;
pub use config::{DEFAULT_TIMEOUT, HttpClientConfig, HttpClientConfigBuilder};
pub use diagnostics::DiagnosticSink;
pub use error::{BoxError, CodecError, ErrorCategory, HttpClientError, RequestError, Result};
pub use hooks::{ErrorContext, OnError, OnRequestReady, OnResponseReady};
pub use marshal::{BodyMarshaler, FormBodyMarshaler, JsonBodyMarshaler, RawBodyMarshaler};
pub use options::RequestOptions;
pub use request::Request;
pub use response::{BodyStream, Response, is_success_status};
pub use transport::{ReqwestTransport, Transport};
pub use unmarshal::{BodyUnmarshaler, JsonBodyUnmarshaler, RawBodyUnmarshaler};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use reqx_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::body::{Body, Destination};
    pub use crate::client::HttpClient;
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::error::{HttpClientError, RequestError, Result};
    pub use crate::hooks::ErrorContext;
    pub use crate::marshal::{BodyMarshaler, FormBodyMarshaler, JsonBodyMarshaler, RawBodyMarshaler};
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::unmarshal::{BodyUnmarshaler, JsonBodyUnmarshaler, RawBodyUnmarshaler};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
