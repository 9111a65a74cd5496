//! The request interception gateway.
//!
//! One gateway is built per deployed version, with its configuration,
//! storage and network injected. It classifies every request and either
//! lets it pass straight through or runs the bound strategy.

use std::sync::Arc;
use waypost_core::{AppConfig, CacheDb, Error, GenerationNames};

use crate::classify::{BypassReason, Classifier, Interception, Strategy};
use crate::fallback::FallbackTable;
use crate::fetch::{Network, canonicalize};
use crate::message::Request;
use crate::strategy::{self, Resolution, StrategyContext};

/// What the gateway decided for a request.
#[derive(Debug)]
pub enum Dispatch {
    /// Not intercepted; the caller talks to the network directly.
    Passthrough(BypassReason),
    Handled { strategy: Strategy, resolution: Resolution },
}

/// Request interception gateway for one version.
pub struct Gateway {
    classifier: Classifier,
    ctx: StrategyContext,
}

impl Gateway {
    /// Build the gateway for `config`'s version.
    pub fn new(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let classifier = Classifier::from_config(config)?;
        let offline_url = canonicalize(&config.offline_document, classifier.origin())
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.offline_document)))?;
        let fallbacks = FallbackTable::new(offline_url.as_str());

        Ok(Self::with_fallbacks(classifier, db, network, config.generations(), fallbacks))
    }

    /// Build a gateway with a custom fallback table.
    pub fn with_fallbacks(
        classifier: Classifier, db: CacheDb, network: Arc<dyn Network>, names: GenerationNames,
        fallbacks: FallbackTable,
    ) -> Self {
        Self { classifier, ctx: StrategyContext { db, network, names, fallbacks: Arc::new(fallbacks) } }
    }

    pub fn names(&self) -> &GenerationNames {
        &self.ctx.names
    }

    pub fn version(&self) -> &str {
        &self.ctx.names.version
    }

    pub fn classify(&self, request: &Request) -> Interception {
        self.classifier.classify(request)
    }

    /// Classify `request` and run its strategy.
    ///
    /// Intercepted requests always resolve to a response.
    pub async fn dispatch(&self, request: &Request) -> Dispatch {
        match self.classifier.classify(request) {
            Interception::Bypass(reason) => {
                tracing::trace!(url = %request.url, ?reason, "passing through");
                Dispatch::Passthrough(reason)
            }
            Interception::Intercept { url, strategy } => {
                let canonical = Request { url: url.to_string(), ..request.clone() };
                tracing::debug!(url = %canonical.url, ?strategy, "intercepted");
                let resolution = strategy::resolve(strategy, &canonical, &self.ctx).await;
                Dispatch::Handled { strategy, resolution }
            }
        }
    }

    /// Serve `request` end to end.
    ///
    /// Passthrough requests go to the network untouched, and only their
    /// transport errors surface here.
    pub async fn fetch(&self, request: &Request) -> Result<(Option<Strategy>, Resolution), Error> {
        match self.dispatch(request).await {
            Dispatch::Handled { strategy, resolution } => Ok((Some(strategy), resolution)),
            Dispatch::Passthrough(BypassReason::InvalidUrl) => {
                Err(Error::InvalidUrl(request.url.clone()))
            }
            Dispatch::Passthrough(_) => {
                let forwarded = match self.classifier.origin().join(request.url.trim()) {
                    Ok(url) => Request { url: url.to_string(), ..request.clone() },
                    Err(_) => request.clone(),
                };
                let response = self.ctx.network.fetch(&forwarded).await?;
                Ok((None, Resolution::ready(response)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockNetwork;
    use crate::message::{FallbackKind, ResponseSource};
    use reqwest::{Method, StatusCode};

    async fn gateway(network: Arc<MockNetwork>) -> (Gateway, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let gateway = Gateway::new(&AppConfig::default(), db.clone(), network).unwrap();
        (gateway, db)
    }

    #[tokio::test]
    async fn test_static_asset_scenario() {
        let network = Arc::new(MockNetwork::new());
        network.route("http://localhost:3000/_next/static/chunk-a1b2.js", 200, "application/javascript", "x");
        let (gateway, db) = gateway(network.clone()).await;
        let request = Request::get("/_next/static/chunk-a1b2.js");

        let (strategy, first) = gateway.fetch(&request).await.unwrap();
        assert_eq!(strategy, Some(Strategy::CacheFirst));
        assert_eq!(first.response.source, ResponseSource::Network);
        assert_eq!(db.count_entries(&gateway.names().static_name).await.unwrap(), 1);

        let (_, second) = gateway.fetch(&request).await.unwrap();
        assert_eq!(second.response.source, ResponseSource::Cache);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_relative_and_absolute_share_entry() {
        let network = Arc::new(MockNetwork::new());
        network.route("http://localhost:3000/images/a.png", 200, "image/png", "png");
        let (gateway, _db) = gateway(network.clone()).await;

        gateway.fetch(&Request::get("/images/a.png")).await.unwrap();
        let (_, again) = gateway.fetch(&Request::get("http://LOCALHOST:3000/images/a.png#x")).await.unwrap();
        assert_eq!(again.response.source, ResponseSource::Cache);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_excluded_requests_never_cached() {
        let network = Arc::new(MockNetwork::new());
        let hmr = "http://localhost:3000/_next/webpack-hmr";
        network.route(hmr, 200, "text/event-stream", "data: ok");
        let (gateway, db) = gateway(network.clone()).await;

        for _ in 0..3 {
            let (strategy, resolution) = gateway.fetch(&Request::get(hmr)).await.unwrap();
            assert_eq!(strategy, None);
            assert_eq!(resolution.response.source, ResponseSource::Network);
        }
        assert_eq!(network.calls_to(hmr), 3);
        assert!(!db.contains_key(&Request::get(hmr).cache_key()).await.unwrap());
        assert!(db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutating_methods_bypass_cache() {
        let network = Arc::new(MockNetwork::new());
        let api = "http://localhost:3000/api/listings";
        network.route(api, 200, "application/json", "{}");
        let (gateway, db) = gateway(network.clone()).await;

        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let request = Request::new(method.clone(), api);
            assert!(matches!(gateway.dispatch(&request).await, Dispatch::Passthrough(BypassReason::Method)));
            gateway.fetch(&request).await.unwrap();
            assert!(!db.contains_key(&request.cache_key()).await.unwrap());
        }
        assert!(db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_transport_error_surfaces() {
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let (gateway, _db) = gateway(network).await;

        let result = gateway.fetch(&Request::new(Method::POST, "/api/listings")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_offline_api_scenario() {
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let (gateway, _db) = gateway(network).await;

        let (strategy, resolution) = gateway.fetch(&Request::get("/api/listings?category=autos")).await.unwrap();
        assert_eq!(strategy, Some(Strategy::NetworkFirst));
        assert_eq!(resolution.response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resolution.response.source, ResponseSource::Fallback(FallbackKind::ErrorPayload));
    }

    #[tokio::test]
    async fn test_offline_fallback_by_accept() {
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let (gateway, _db) = gateway(network).await;

        let (_, page) = gateway.fetch(&Request::get("/communaute").with_accept("text/html")).await.unwrap();
        assert_eq!(page.response.source, ResponseSource::Fallback(FallbackKind::OfflineDocument));

        let (_, image) = gateway.fetch(&Request::get("/uploads/a.webp").with_accept("image/webp")).await.unwrap();
        assert_eq!(image.response.source, ResponseSource::Fallback(FallbackKind::PlaceholderImage));
    }
}
