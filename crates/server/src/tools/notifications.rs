//! push_notify and notification_click tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::{Notification, PushPayload, on_notification_click};

use super::json_result;
use crate::state::AppState;

/// Parameters for the push_notify tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyParams {
    /// Raw push data: a JSON object with optional `body` and `url`, or plain text.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Deep link of the clicked notification, absolute or relative to the origin.
    pub url: String,
}

/// Build the notification a push message would display.
pub async fn push_notify_impl(state: &AppState, params: PushNotifyParams) -> Result<CallToolResult, McpError> {
    let payload = PushPayload::parse(params.payload.as_deref().map(str::as_bytes));
    let notification = Notification::from_payload(payload, &state.config);
    tracing::info!(url = %notification.url, "push notification shown");
    json_result(&notification)
}

/// Route a click on a notification to an open client, or open a new one.
pub async fn notification_click_impl(
    state: &AppState, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let payload = PushPayload { url: Some(params.url), ..PushPayload::default() };
    let notification = Notification::from_payload(payload, &state.config);
    let controller = state.lifecycle.active_version().await;

    let action = on_notification_click(&notification, state.lifecycle.clients(), controller).await;
    json_result(&action)
}
