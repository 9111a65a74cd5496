//! Offline fallback synthesis.
//!
//! When neither cache nor network can answer, the caller still gets a
//! response shaped like what it asked for. The table maps a content
//! category, derived from the `Accept` header, to a generator.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use waypost_core::{CacheDb, GenerationNames};

use crate::message::{FallbackKind, Request, Response, ResponseSource};

/// What kind of content a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    Html,
    Image,
    Other,
}

impl ContentCategory {
    /// Derive the category from an `Accept` header.
    ///
    /// HTML wins over images: navigations advertise both.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let Some(accept) = accept.map(str::to_ascii_lowercase) else {
            return ContentCategory::Other;
        };
        if accept.contains("text/html") {
            ContentCategory::Html
        } else if accept.contains("image/") {
            ContentCategory::Image
        } else {
            ContentCategory::Other
        }
    }
}

/// Produces a response for a request that could not be served.
#[async_trait]
pub trait FallbackGenerator: Send + Sync {
    async fn generate(&self, request: &Request, db: &CacheDb, names: &GenerationNames) -> Response;
}

const BUILTIN_OFFLINE_HTML: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>Offline</title></head>
<body><main><h1>You are offline</h1><p>This page is not available offline. Check your connection and try again.</p></main></body>
</html>";

/// Serves the pre-cached offline document from the static generation.
pub struct OfflineDocument {
    key: String,
}

impl OfflineDocument {
    /// `url` must be the canonical URL the document was installed under.
    pub fn new(url: &str) -> Self {
        Self { key: Request::get(url).cache_key() }
    }
}

#[async_trait]
impl FallbackGenerator for OfflineDocument {
    async fn generate(&self, _request: &Request, db: &CacheDb, names: &GenerationNames) -> Response {
        match db.get_entry(&names.static_name, &self.key).await {
            Ok(Some(entry)) => {
                if let Some(mut response) = Response::from_cached(entry) {
                    response.source = ResponseSource::Fallback(FallbackKind::OfflineDocument);
                    return response;
                }
            }
            Ok(None) => tracing::warn!(generation = %names.static_name, "offline document missing from cache"),
            Err(e) => tracing::warn!(error = %e, "offline document lookup failed"),
        }

        Response::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "text/html; charset=utf-8",
            BUILTIN_OFFLINE_HTML,
            ResponseSource::Fallback(FallbackKind::OfflineDocument),
        )
    }
}

const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300" role="img" aria-label="Image unavailable offline">"##,
    r##"<rect width="400" height="300" fill="#e5e7eb"/>"##,
    r##"<text x="200" y="150" text-anchor="middle" dominant-baseline="middle" font-family="sans-serif" font-size="18" fill="#6b7280">Image unavailable offline</text>"##,
    "</svg>"
);

/// Inline SVG placeholder; needs no storage.
pub struct PlaceholderImage;

#[async_trait]
impl FallbackGenerator for PlaceholderImage {
    async fn generate(&self, _request: &Request, _db: &CacheDb, _names: &GenerationNames) -> Response {
        let mut response = Response::new(
            StatusCode::OK,
            "image/svg+xml",
            PLACEHOLDER_SVG,
            ResponseSource::Fallback(FallbackKind::PlaceholderImage),
        );
        response.headers.push(("cache-control".to_string(), "no-store".to_string()));
        response
    }
}

/// Machine-readable error code carried by the JSON fallback.
pub const OFFLINE_ERROR_CODE: &str = "OFFLINE";

/// Structured JSON error with a 503 status.
pub struct ErrorPayload;

#[async_trait]
impl FallbackGenerator for ErrorPayload {
    async fn generate(&self, request: &Request, _db: &CacheDb, _names: &GenerationNames) -> Response {
        let body = serde_json::json!({
            "error": "offline",
            "code": OFFLINE_ERROR_CODE,
            "message": "You are offline and this content is not available in the cache.",
            "url": request.url,
        });
        Response::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "application/json",
            body.to_string(),
            ResponseSource::Fallback(FallbackKind::ErrorPayload),
        )
    }
}

/// Category → generator table.
#[derive(Clone)]
pub struct FallbackTable {
    generators: HashMap<ContentCategory, Arc<dyn FallbackGenerator>>,
}

impl FallbackTable {
    /// Default table: offline document, placeholder image, JSON error.
    pub fn new(offline_document_url: &str) -> Self {
        let mut generators: HashMap<ContentCategory, Arc<dyn FallbackGenerator>> = HashMap::new();
        generators.insert(ContentCategory::Html, Arc::new(OfflineDocument::new(offline_document_url)));
        generators.insert(ContentCategory::Image, Arc::new(PlaceholderImage));
        generators.insert(ContentCategory::Other, Arc::new(ErrorPayload));
        Self { generators }
    }

    /// Replace the generator for `category`.
    pub fn with(mut self, category: ContentCategory, generator: Arc<dyn FallbackGenerator>) -> Self {
        self.generators.insert(category, generator);
        self
    }

    /// Synthesize the fallback for `request`.
    pub async fn resolve(&self, request: &Request, db: &CacheDb, names: &GenerationNames) -> Response {
        let category = ContentCategory::from_accept(request.accept.as_deref());
        tracing::info!(url = %request.url, ?category, "serving offline fallback");
        match self.generators.get(&category) {
            Some(generator) => generator.generate(request, db, names).await,
            None => ErrorPayload.generate(request, db, names).await,
        }
    }
}
