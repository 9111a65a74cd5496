//! gateway_control tool implementation.
//!
//! Posts a control message and waits for its reply.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::{AppState, CONTROL_REPLY_TIMEOUT};

/// Parameters for the gateway_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayControlParams {
    /// Control message, e.g. `{"type": "GET_VERSION"}`.
    /// Recognized types: SKIP_WAITING, GET_VERSION, CLEAR_CACHE.
    pub message: serde_json::Value,
}

/// Implementation of the gateway_control tool.
pub async fn control_impl(state: &AppState, params: GatewayControlParams) -> Result<CallToolResult, McpError> {
    let reply = state.control.request(params.message, CONTROL_REPLY_TIMEOUT).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{manifest_network, test_state};
    use crate::tools::output_json;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_version() {
        let state = test_state(manifest_network()).await;
        let params = GatewayControlParams { message: json!({"type": "GET_VERSION"}) };

        let output = output_json(&control_impl(&state, params).await.unwrap());
        assert_eq!(output["type"], "VERSION");
        assert_eq!(output["version"], "v1");
        assert_eq!(output["cache"], "waypost-static-v1");
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let state = test_state(manifest_network()).await;
        let params = GatewayControlParams { message: json!({"type": "CLEAR_CACHE"}) };

        let output = output_json(&control_impl(&state, params).await.unwrap());
        assert_eq!(output["type"], "CACHE_CLEARED");
        assert!(state.lifecycle.db().list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let state = test_state(manifest_network()).await;
        let params = GatewayControlParams { message: json!({"type": "SHUTDOWN"}) };
        assert!(control_impl(&state, params).await.is_err());
    }
}
