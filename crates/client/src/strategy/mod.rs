//! Resolution strategies.
//!
//! Each strategy is an independent `resolve(request, context)` function.
//! None of them ever fails: network and storage errors degrade through the
//! strategy's chain and end at the offline fallback.
//!
//! Only successful (2xx) responses are ever written to a generation. A
//! non-2xx network response is still returned to the caller unchanged.

pub mod cache_first;
pub mod network_first;
pub mod stale_while_revalidate;

use reqwest::Method;
use std::sync::Arc;
use tokio::task::JoinHandle;
use waypost_core::{CacheDb, GenerationNames};

use crate::classify::Strategy;
use crate::fallback::FallbackTable;
use crate::fetch::Network;
use crate::message::{Request, Response};

/// Everything a strategy needs, shared by all requests of one version.
#[derive(Clone)]
pub struct StrategyContext {
    pub db: CacheDb,
    pub network: Arc<dyn Network>,
    pub names: GenerationNames,
    pub fallbacks: Arc<FallbackTable>,
}

/// A strategy's answer.
#[derive(Debug)]
pub struct Resolution {
    pub response: Response,
    /// Background refresh still in flight, if any.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Resolution {
    pub fn ready(response: Response) -> Self {
        Self { response, revalidation: None }
    }

    /// Wait for any background refresh, then yield the response.
    pub async fn settle(self) -> Response {
        if let Some(handle) = self.revalidation
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "revalidation task failed");
        }
        self.response
    }
}

/// Run `strategy` for `request`.
pub async fn resolve(strategy: Strategy, request: &Request, ctx: &StrategyContext) -> Resolution {
    match strategy {
        Strategy::CacheFirst => cache_first::resolve(request, ctx).await,
        Strategy::NetworkFirst => network_first::resolve(request, ctx).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate::resolve(request, ctx).await,
    }
}

impl StrategyContext {
    /// Read an entry; storage failures count as a miss.
    pub(crate) async fn lookup(&self, generation: &str, request: &Request) -> Option<Response> {
        match self.db.get_entry(generation, &request.cache_key()).await {
            Ok(Some(entry)) => {
                tracing::debug!(url = %request.url, generation, "cache hit");
                Response::from_cached(entry)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(url = %request.url, generation, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write a successful GET response; anything else is skipped.
    pub(crate) async fn store(&self, generation: &str, request: &Request, response: &Response) {
        if request.method != Method::GET {
            return;
        }
        if !response.is_success() {
            tracing::debug!(url = %request.url, status = response.status.as_u16(), "not caching unsuccessful response");
            return;
        }
        if let Err(e) = self.db.put_entry(generation, &response.to_cached(request)).await {
            tracing::warn!(url = %request.url, generation, error = %e, "cache write failed");
        }
    }

    pub(crate) async fn offline(&self, request: &Request) -> Response {
        self.fallbacks.resolve(request, &self.db, &self.names).await
    }
}
