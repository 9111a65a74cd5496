//! Open application instances ("clients") and which version controls them.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type ClientId = u64;

/// One open application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    /// Version serving this client's requests, if any.
    pub controller: Option<String>,
    pub focused: bool,
}

#[derive(Debug, Default)]
struct Clients {
    next_id: ClientId,
    open: BTreeMap<ClientId, ClientInfo>,
}

/// Registry of open clients, shared across the lifecycle and notifications.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<RwLock<Clients>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened client and give it focus.
    pub async fn open(&self, url: &str, controller: Option<String>) -> ClientId {
        let mut clients = self.inner.write().await;
        clients.next_id += 1;
        let id = clients.next_id;
        for client in clients.open.values_mut() {
            client.focused = false;
        }
        clients
            .open
            .insert(id, ClientInfo { id, url: url.to_string(), controller, focused: true });
        tracing::debug!(client = id, url, "client opened");
        id
    }

    pub async fn navigate(&self, id: ClientId, url: &str) -> bool {
        let mut clients = self.inner.write().await;
        match clients.open.get_mut(&id) {
            Some(client) => {
                client.url = url.to_string();
                true
            }
            None => false,
        }
    }

    /// Move focus to `id`. Returns false if it is not open.
    pub async fn focus(&self, id: ClientId) -> bool {
        let mut clients = self.inner.write().await;
        if !clients.open.contains_key(&id) {
            return false;
        }
        for client in clients.open.values_mut() {
            client.focused = client.id == id;
        }
        true
    }

    pub async fn close(&self, id: ClientId) -> bool {
        self.inner.write().await.open.remove(&id).is_some()
    }

    /// First open client currently showing `url`.
    pub async fn find_by_url(&self, url: &str) -> Option<ClientId> {
        self.inner
            .read()
            .await
            .open
            .values()
            .find(|c| c.url == url)
            .map(|c| c.id)
    }

    pub async fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.inner.read().await.open.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        self.inner.read().await.open.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.open.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.open.is_empty()
    }

    /// Put every open client under `version`. Returns how many were claimed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.inner.write().await;
        for client in clients.open.values_mut() {
            client.controller = Some(version.to_string());
        }
        clients.open.len()
    }
}
