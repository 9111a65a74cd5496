//! Network seam for the gateway.
//!
//! ### Contract
//! - Any response the server produced, whatever its status, is `Ok`.
//! - Transport failures (offline, DNS, TLS, timeout, abort) are `Err`.
//!
//! Timeouts come from the HTTP client itself; the gateway layers no timer
//! of its own on top.

#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};
use waypost_core::{AppConfig, Error};

use crate::message::{Request, Response, ResponseSource};

pub use self::url::{UrlError, canonicalize};

/// Transport-level fetch failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NetworkError::Timeout } else { NetworkError::Transport(err.to_string()) }
    }
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Timeout => Error::FetchTimeout("request timed out".into()),
            NetworkError::Transport(msg) => Error::Network(msg),
        }
    }
}

/// Something that can put a request on the wire.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent string (default: "waypost/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { user_agent: "waypost/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for NetworkConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: &NetworkConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?;

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(Response { status, headers, body, source: ResponseSource::Network })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_config_default() {
        let config = NetworkConfig::default();
        assert_eq!(config.user_agent, "waypost/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_network_config_from_app_config() {
        let app = AppConfig { timeout_ms: 1500, user_agent: "annonces/2".into(), ..Default::default() };
        let config = NetworkConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.user_agent, "annonces/2");
    }

    #[test]
    fn test_network_error_maps_to_core_error() {
        assert!(matches!(Error::from(NetworkError::Timeout), Error::FetchTimeout(_)));
        assert!(matches!(Error::from(NetworkError::Transport("offline".into())), Error::Network(_)));
    }

    #[tokio::test]
    async fn test_http_network_new() {
        assert!(HttpNetwork::new(&NetworkConfig::default()).is_ok());
    }
}
