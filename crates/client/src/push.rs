//! Push notifications: payload parsing and click routing.

use serde::{Deserialize, Serialize};
use waypost_core::AppConfig;

use crate::clients::{ClientId, ClientRegistry};

/// Inbound push payload. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse raw push data.
    ///
    /// JSON objects supply `title`/`body`/`url`. Any other non-empty text is used
    /// as the body. Missing data yields an empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_slice::<PushPayload>(data) {
            Ok(payload) => payload,
            Err(e) => {
                let text = String::from_utf8_lossy(data).trim().to_string();
                tracing::debug!(error = %e, "push payload is not JSON, using it as text");
                Self { body: (!text.is_empty()).then_some(text), ..Self::default() }
            }
        }
    }
}

/// A notification ready to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Absolute deep link opened on click.
    pub url: String,
}

impl Notification {
    /// Build a notification, filling gaps from configuration defaults.
    pub fn from_payload(payload: PushPayload, config: &AppConfig) -> Self {
        let target = payload.url.unwrap_or_else(|| config.notification_default_url.clone());
        let url = config
            .resolve_url(&target)
            .map(|u| u.to_string())
            .unwrap_or(target);

        Self {
            title: payload.title.unwrap_or_else(|| config.notification_title.clone()),
            body: payload.body.unwrap_or_else(|| config.notification_default_body.clone()),
            icon: config.notification_icon.clone(),
            url,
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    /// An instance was already on the URL and got focus.
    Focus { client: ClientId },
    /// A new instance was opened on the URL.
    Open { client: ClientId, url: String },
}

/// Route a notification click to an existing instance or a new one.
pub async fn on_notification_click(
    notification: &Notification, clients: &ClientRegistry, controller: Option<String>,
) -> ClickAction {
    if let Some(client) = clients.find_by_url(&notification.url).await
        && clients.focus(client).await
    {
        tracing::debug!(client, url = %notification.url, "focused existing client");
        return ClickAction::Focus { client };
    }

    let client = clients.open(&notification.url, controller).await;
    tracing::debug!(client, url = %notification.url, "opened client for notification");
    ClickAction::Open { client, url: notification.url.clone() }
}
