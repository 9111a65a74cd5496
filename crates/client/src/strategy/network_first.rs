//! Network-first: prefer a live response, fall back to the dynamic generation.

use super::{Resolution, StrategyContext};
use crate::message::Request;

pub async fn resolve(request: &Request, ctx: &StrategyContext) -> Resolution {
    let generation = ctx.names.dynamic_name.as_str();

    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(generation, request, &response).await;
            Resolution::ready(response)
        }
        Err(e) => {
            tracing::info!(url = %request.url, error = %e, "network unavailable, trying cache");
            match ctx.lookup(generation, request).await {
                Some(cached) => Resolution::ready(cached),
                None => Resolution::ready(ctx.offline(request).await),
            }
        }
    }
}
