//! Transport primitive: one request, one response body.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// A transport request failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be completed (connection, TLS, timeout).
    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: Url },
}

/// Issues one GET request and returns the raw response body.
///
/// The sync pipeline treats the transport as a black box: anything it
/// reports surfaces as a network error. Implementations own their timeout
/// policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

/// HTTP transport backed by a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Create a transport with a 30 second request timeout.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            user_agent: "pokedex-sync/0.1".to_string(),
        }
    }

    /// Replace the underlying HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                TransportError::Request(Box::new(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;

        debug!(url = %url, bytes = body.len(), "HTTP fetch finished");
        Ok(body.to_vec())
    }
}
