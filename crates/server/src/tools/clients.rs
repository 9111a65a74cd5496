//! client_open, client_navigate, client_close and client_list tool implementations.
//!
//! Clients stand in for open application instances. While any client is
//! open, a newly installed version waits instead of taking over.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::{ClientId, ClientInfo};

use super::json_result;
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the client_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientOpenParams {
    /// URL the client is showing, absolute or relative to the origin.
    #[serde(default = "default_client_url")]
    pub url: String,
}

fn default_client_url() -> String {
    "/".into()
}

/// Parameters for the client_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientCloseParams {
    pub id: ClientId,
}

/// Parameters for the client_navigate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientNavigateParams {
    pub id: ClientId,
    /// New URL, absolute or relative to the origin.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ClientListOutput {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub clients: Vec<ClientInfo>,
}

pub async fn open_impl(state: &AppState, params: ClientOpenParams) -> Result<CallToolResult, McpError> {
    let url = state
        .config
        .resolve_url(&params.url)
        .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let id = state.lifecycle.open_client(url.as_str()).await;
    let info = state.lifecycle.clients().get(id).await.ok_or(ToolError::UnknownClient(id))?;
    json_result(&info)
}

/// Close a client. Closing the last one activates a waiting version.
pub async fn close_impl(state: &AppState, params: ClientCloseParams) -> Result<CallToolResult, McpError> {
    if !state.lifecycle.close_client(params.id).await? {
        return Err(ToolError::UnknownClient(params.id).into());
    }
    list_impl(state).await
}

pub async fn navigate_impl(state: &AppState, params: ClientNavigateParams) -> Result<CallToolResult, McpError> {
    let url = state
        .config
        .resolve_url(&params.url)
        .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let clients = state.lifecycle.clients();
    if !clients.navigate(params.id, url.as_str()).await {
        return Err(ToolError::UnknownClient(params.id).into());
    }
    let info = clients.get(params.id).await.ok_or(ToolError::UnknownClient(params.id))?;
    json_result(&info)
}

pub async fn list_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let output = ClientListOutput {
        active_version: state.lifecycle.active_version().await,
        waiting_version: state.lifecycle.waiting_version().await,
        clients: state.lifecycle.clients().list().await,
    };
    json_result(&output)
}
