//! Stale-while-revalidate: answer from the dynamic generation at once and
//! refresh it in the background.
//!
//! The cache read completes before the refresh is spawned, and the refresh
//! replaces the entry in a single write, so concurrent readers see either
//! the old or the new snapshot.

use super::{Resolution, StrategyContext};
use crate::message::Request;

pub async fn resolve(request: &Request, ctx: &StrategyContext) -> Resolution {
    let generation = ctx.names.dynamic_name.as_str();

    if let Some(cached) = ctx.lookup(generation, request).await {
        let ctx = ctx.clone();
        let request = request.clone();
        let revalidation = tokio::spawn(async move {
            revalidate(&request, &ctx).await;
        });
        return Resolution { response: cached, revalidation: Some(revalidation) };
    }

    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(generation, request, &response).await;
            Resolution::ready(response)
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "page unavailable and not cached");
            Resolution::ready(ctx.offline(request).await)
        }
    }
}

async fn revalidate(request: &Request, ctx: &StrategyContext) {
    match ctx.network.fetch(request).await {
        Ok(response) => ctx.store(&ctx.names.dynamic_name, request, &response).await,
        Err(e) => tracing::debug!(url = %request.url, error = %e, "background revalidation failed"),
    }
}
