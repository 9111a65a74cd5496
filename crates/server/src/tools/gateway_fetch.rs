//! gateway_fetch tool implementation.
//!
//! Serves a request through the active version's gateway.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::{Method, Request, ResponseSource, Strategy};
use waypost_core::Error;

use super::json_result;
use crate::error::ToolError;
use crate::state::AppState;

/// Input parameters for gateway_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayFetchParams {
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Accept header; selects the offline fallback shape.
    #[serde(default)]
    pub accept: Option<String>,

    /// Wait for a background revalidation to finish before returning.
    #[serde(default)]
    pub wait_revalidation: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for gateway_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GatewayFetchOutput {
    pub url: String,
    pub status: u16,
    pub source: ResponseSource,
    /// Strategy used; absent for pass-through requests.
    pub strategy: Option<Strategy>,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// A background revalidation was started and not awaited.
    pub revalidating: bool,
}

/// Implementation of the gateway_fetch tool.
pub async fn fetch_impl(state: &AppState, params: GatewayFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("unsupported method: {}", params.method)))?;

    let mut request = Request::new(method, params.url.clone());
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let gateway = state.lifecycle.gateway().await?;
    let (strategy, resolution) = gateway.fetch(&request).await?;

    let revalidating = resolution.revalidation.is_some() && !params.wait_revalidation;
    let response = if params.wait_revalidation { resolution.settle().await } else { resolution.response };

    let output = GatewayFetchOutput {
        url: params.url,
        status: response.status.as_u16(),
        source: response.source,
        strategy,
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        revalidating,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{manifest_network, test_state};
    use crate::tools::output_json;

    fn params(url: &str) -> GatewayFetchParams {
        GatewayFetchParams { url: url.into(), method: default_method(), accept: None, wait_revalidation: false }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let state = test_state(manifest_network()).await;
        assert!(fetch_impl(&state, params(" ")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_bad_method() {
        let state = test_state(manifest_network()).await;
        let result = fetch_impl(&state, GatewayFetchParams { method: "GE T".into(), ..params("/") }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_static_asset_from_precache() {
        let network = manifest_network();
        let state = test_state(network.clone()).await;
        let calls = network.calls();

        let result = fetch_impl(&state, params("/icons/icon-192x192.png")).await.unwrap();
        let output = output_json(&result);
        assert_eq!(output["source"], "cache");
        assert_eq!(output["strategy"], "cache_first");
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_fetch_offline_api() {
        let network = manifest_network();
        let state = test_state(network.clone()).await;
        network.set_offline(true);

        let result = fetch_impl(&state, params("/api/listings?category=autos")).await.unwrap();
        let output = output_json(&result);
        assert_eq!(output["status"], 503);
        assert_eq!(output["strategy"], "network_first");
        let body: serde_json::Value = serde_json::from_str(output["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["code"], "OFFLINE");
    }

    #[tokio::test]
    async fn test_fetch_page_waits_for_revalidation() {
        let network = manifest_network();
        let state = test_state(network.clone()).await;
        network.route("http://localhost:3000/communaute", 200, "text/html", "v1");
        fetch_impl(&state, params("/communaute")).await.unwrap();

        network.route("http://localhost:3000/communaute", 200, "text/html", "v2");
        let waited = GatewayFetchParams { wait_revalidation: true, ..params("/communaute") };
        let output = output_json(&fetch_impl(&state, waited).await.unwrap());
        assert_eq!(output["body"], "v1");
        assert_eq!(output["revalidating"], false);

        let output = output_json(&fetch_impl(&state, params("/communaute")).await.unwrap());
        assert_eq!(output["body"], "v2");
        assert_eq!(output["revalidating"], true);
    }

    #[tokio::test]
    async fn test_fetch_without_active_version() {
        let network = manifest_network();
        network.set_offline(true);
        let state = test_state(network).await;
        assert!(fetch_impl(&state, params("/")).await.is_err());
    }
}
