//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::{
    cache::{CachePurgeParams, generations_impl, purge_impl},
    clients::{
        ClientCloseParams, ClientNavigateParams, ClientOpenParams, close_impl, list_impl, navigate_impl, open_impl,
    },
    control::{GatewayControlParams, control_impl},
    gateway_fetch::{GatewayFetchParams, fetch_impl},
    notifications::{NotificationClickParams, PushNotifyParams, notification_click_impl, push_notify_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for waypost.
#[derive(Clone)]
pub struct GatewayServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl GatewayServer {
    /// Create a new server handler over shared gateway state.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    /// Serve a request through the active version.
    ///
    /// Intercepted requests are resolved cache-first, network-first or
    /// stale-while-revalidate depending on their class; the rest pass
    /// straight through to the network.
    #[tool(
        description = "Fetch a URL through the offline gateway. Returns status, body, the strategy used and whether the response came from the network, the cache or an offline fallback."
    )]
    async fn gateway_fetch(&self, params: Parameters<GatewayFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Send a control message ({\"type\": \"SKIP_WAITING\" | \"GET_VERSION\" | \"CLEAR_CACHE\"}) and wait for its reply."
    )]
    async fn gateway_control(&self, params: Parameters<GatewayControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.state, params.0).await
    }

    #[tool(description = "Build the notification shown for a push message. Payload is JSON {body, url} or plain text.")]
    async fn push_notify(&self, params: Parameters<PushNotifyParams>) -> Result<CallToolResult, McpError> {
        push_notify_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Handle a notification click: focus a client already on the URL, otherwise open one."
    )]
    async fn notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.state, params.0).await
    }

    #[tool(description = "Register an open application instance on a URL.")]
    async fn client_open(&self, params: Parameters<ClientOpenParams>) -> Result<CallToolResult, McpError> {
        open_impl(&self.state, params.0).await
    }

    #[tool(description = "Point an open application instance at a new URL.")]
    async fn client_navigate(&self, params: Parameters<ClientNavigateParams>) -> Result<CallToolResult, McpError> {
        navigate_impl(&self.state, params.0).await
    }

    #[tool(description = "Close an application instance by id. Closing the last one activates a waiting version.")]
    async fn client_close(&self, params: Parameters<ClientCloseParams>) -> Result<CallToolResult, McpError> {
        close_impl(&self.state, params.0).await
    }

    #[tool(description = "List open application instances with the active and waiting versions.")]
    async fn client_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.state).await
    }

    #[tool(description = "List cache generations and their entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.state).await
    }

    /// Purge cache generations.
    ///
    /// Deleting a current generation is allowed; the affected requests fall
    /// back to the network until repopulated.
    #[tool(description = "Delete one cache generation by name, or all generations.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "waypost".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
