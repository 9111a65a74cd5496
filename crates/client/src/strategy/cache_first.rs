//! Cache-first: serve from the static generation, fetch only on a miss.

use super::{Resolution, StrategyContext};
use crate::message::Request;

pub async fn resolve(request: &Request, ctx: &StrategyContext) -> Resolution {
    let generation = ctx.names.static_name.as_str();

    if let Some(cached) = ctx.lookup(generation, request).await {
        return Resolution::ready(cached);
    }

    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(generation, request, &response).await;
            Resolution::ready(response)
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "static asset unavailable");
            Resolution::ready(ctx.offline(request).await)
        }
    }
}
