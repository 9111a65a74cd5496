//! Request and response descriptors flowing through the gateway.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use waypost_core::CachedResponse;
use waypost_core::cache::hash::compute_cache_key;

/// An outgoing request as seen by the gateway.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    /// Value of the `Accept` header, used to pick an offline fallback.
    pub accept: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { url: url.into(), method, accept: None, headers: Vec::new() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Cache key of this request's identity (method + URL).
    pub fn cache_key(&self) -> String {
        compute_cache_key(self.method.as_str(), &self.url)
    }
}

/// Which offline fallback produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    OfflineDocument,
    PlaceholderImage,
    ErrorPayload,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback(FallbackKind),
}

/// A complete, buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: StatusCode, content_type: &str, body: impl Into<Bytes>, source: ResponseSource) -> Self {
        let headers = vec![("content-type".to_string(), content_type.to_string())];
        Self { status, headers, body: body.into(), source }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Rebuild a response from a stored snapshot.
    ///
    /// Returns None if the stored status is not a valid HTTP status.
    pub fn from_cached(entry: CachedResponse) -> Option<Self> {
        let status = StatusCode::from_u16(entry.status).ok()?;
        Some(Self { status, headers: entry.headers, body: Bytes::from(entry.body), source: ResponseSource::Cache })
    }

    /// Snapshot this response for storage under `request`'s identity.
    pub fn to_cached(&self, request: &Request) -> CachedResponse {
        CachedResponse {
            key_hash: request.cache_key(),
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            status: self.status.as_u16(),
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
