//! Transport the executor dispatches requests through.

use async_trait::async_trait;

use crate::{HttpClientConfig, Result};

/// Sends a fully prepared request and returns the raw response.
///
/// One call is one attempt: implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`.
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with reqwest defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Build a client from `config`.
    ///
    /// The request timeout is not baked into the client; the executor sets it
    /// on every request so clones of an [`HttpClient`](crate::HttpClient) can
    /// use different timeouts over the same connection pool.
    pub fn from_config(config: &HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        Ok(Self {
            inner: builder.build()?,
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        Ok(self.inner.execute(request).await?)
    }
}
