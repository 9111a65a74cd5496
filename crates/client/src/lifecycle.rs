//! Version lifecycle: installing → waiting → active → redundant.
//!
//! Installing pre-caches the manifest as one all-or-nothing batch. A freshly
//! installed version waits while an older one still controls open clients,
//! unless told to skip waiting. Activation deletes every generation that is
//! not current for the new version, then claims all open clients.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use url::Url;
use waypost_core::{AppConfig, CacheDb, Error, GenerationNames};

use crate::clients::{ClientId, ClientRegistry};
use crate::fetch::{Network, canonicalize};
use crate::gateway::Gateway;
use crate::message::Request;

/// State of one deployed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

#[derive(Default)]
struct Slots {
    active: Option<Arc<Gateway>>,
    waiting: Option<Arc<Gateway>>,
    states: HashMap<String, WorkerState>,
}

/// Owns the active and waiting versions.
pub struct Lifecycle {
    db: CacheDb,
    network: Arc<dyn Network>,
    clients: ClientRegistry,
    slots: RwLock<Slots>,
    /// Serializes install and activation.
    transition: Mutex<()>,
}

impl Lifecycle {
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self {
            db,
            network,
            clients: ClientRegistry::new(),
            slots: RwLock::new(Slots::default()),
            transition: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub async fn state(&self, version: &str) -> Option<WorkerState> {
        self.slots.read().await.states.get(version).copied()
    }

    pub async fn active_version(&self) -> Option<String> {
        self.slots.read().await.active.as_ref().map(|g| g.version().to_string())
    }

    pub async fn waiting_version(&self) -> Option<String> {
        self.slots.read().await.waiting.as_ref().map(|g| g.version().to_string())
    }

    /// Generation names of the active version.
    pub async fn active_names(&self) -> Option<GenerationNames> {
        self.slots.read().await.active.as_ref().map(|g| g.names().clone())
    }

    /// Gateway of the active version.
    pub async fn gateway(&self) -> Result<Arc<Gateway>, Error> {
        self.slots.read().await.active.clone().ok_or(Error::NotActive)
    }

    /// Register a client, controlled by the active version if there is one.
    pub async fn open_client(&self, url: &str) -> ClientId {
        let controller = self.active_version().await;
        self.clients.open(url, controller).await
    }

    /// Close a client. When the last one goes, a waiting version activates.
    ///
    /// Returns false if `id` was not open.
    pub async fn close_client(&self, id: ClientId) -> Result<bool, Error> {
        let _transition = self.transition.lock().await;
        if !self.clients.close(id).await {
            return Ok(false);
        }

        let has_waiting = self.slots.read().await.waiting.is_some();
        if has_waiting && self.clients.is_empty().await {
            tracing::info!(client = id, "last client closed, activating waiting version");
            self.activate_waiting().await?;
        }
        Ok(true)
    }

    /// Install the version described by `config`.
    ///
    /// Returns the state the version ends up in (`Active` or `Waiting`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any manifest resource cannot be
    /// fetched successfully. The version becomes redundant and the active
    /// version keeps serving.
    pub async fn install(&self, config: &AppConfig) -> Result<WorkerState, Error> {
        let _transition = self.transition.lock().await;
        let names = config.generations();

        if self.active_version().await.as_deref() == Some(names.version.as_str()) {
            tracing::debug!(version = %names.version, "version already active");
            return Ok(WorkerState::Active);
        }

        let gateway = Arc::new(Gateway::new(config, self.db.clone(), self.network.clone())?);
        self.set_state(&names.version, WorkerState::Installing).await;
        tracing::info!(version = %names.version, resources = config.install_manifest.len(), "installing");

        if let Err(e) = self.precache(config, &names).await {
            tracing::error!(version = %names.version, error = %e, "install failed");
            if let Err(cleanup) = self.db.delete_generation(&names.working_name).await {
                let generation = &names.working_name;
                tracing::warn!(%generation, error = %cleanup, "failed to discard install working set");
            }
            self.set_state(&names.version, WorkerState::Redundant).await;
            return Err(e);
        }

        {
            let mut slots = self.slots.write().await;
            if let Some(previous) = slots.waiting.replace(gateway) {
                slots.states.insert(previous.version().to_string(), WorkerState::Redundant);
            }
            slots.states.insert(names.version.clone(), WorkerState::Waiting);
        }

        let has_active = self.slots.read().await.active.is_some();
        let controlled = has_active && !self.clients.is_empty().await;
        if controlled {
            tracing::info!(version = %names.version, "installed, waiting for open clients to release");
            return Ok(WorkerState::Waiting);
        }

        self.activate_waiting().await?;
        Ok(WorkerState::Active)
    }

    /// Activate the waiting version now, if there is one.
    ///
    /// Returns the version active afterwards.
    pub async fn skip_waiting(&self) -> Result<Option<String>, Error> {
        let _transition = self.transition.lock().await;
        self.activate_waiting().await
    }

    async fn activate_waiting(&self) -> Result<Option<String>, Error> {
        let waiting = self.slots.write().await.waiting.take();
        let Some(gateway) = waiting else {
            return Ok(self.active_version().await);
        };
        let version = gateway.version().to_string();
        self.set_state(&version, WorkerState::Activating).await;

        let keep = gateway.names().current();
        match self.db.delete_generations_except(&keep).await {
            Ok(deleted) => tracing::info!(version = %version, ?deleted, "removed superseded generations"),
            Err(e) => tracing::warn!(version = %version, error = %e, "generation cleanup failed"),
        }

        {
            let mut slots = self.slots.write().await;
            if let Some(previous) = slots.active.replace(gateway) {
                slots.states.insert(previous.version().to_string(), WorkerState::Redundant);
            }
            slots.states.insert(version.clone(), WorkerState::Active);
        }

        let claimed = self.clients.claim(&version).await;
        tracing::info!(version = %version, claimed, "activated");
        Ok(Some(version))
    }

    /// Fetch the manifest and commit it to the static generation atomically.
    async fn precache(&self, config: &AppConfig, names: &GenerationNames) -> Result<u64, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let mut entries = Vec::with_capacity(config.install_manifest.len());

        for path in &config.install_manifest {
            let url = canonicalize(path, &origin)
                .map_err(|e| Error::InstallFailed { url: path.clone(), reason: e.to_string() })?;
            let request = Request::get(url.as_str());

            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { url: request.url.clone(), reason: e.to_string() })?;
            if !response.is_success() {
                return Err(Error::InstallFailed {
                    url: request.url.clone(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }
            entries.push(response.to_cached(&request));
        }

        self.db.put_batch(&names.working_name, entries).await?;
        let moved = self.db.promote_generation(&names.working_name, &names.static_name).await?;
        tracing::debug!(generation = %names.static_name, moved, "install batch committed");
        Ok(moved)
    }

    async fn set_state(&self, version: &str, state: WorkerState) {
        self.slots.write().await.states.insert(version.to_string(), state);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::mock::MockNetwork;
    use crate::message::{FallbackKind, ResponseSource};

    pub(crate) fn manifest_network() -> Arc<MockNetwork> {
        let network = Arc::new(MockNetwork::new());
        network.route("http://localhost:3000/", 200, "text/html", "<h1>Accueil</h1>");
        network.route("http://localhost:3000/manifest.json", 200, "application/manifest+json", "{}");
        network.route("http://localhost:3000/icons/icon-192x192.png", 200, "image/png", "png");
        network.route("http://localhost:3000/offline.html", 200, "text/html", "<h1>Hors ligne</h1>");
        network
    }

    pub(crate) fn config(version: &str) -> AppConfig {
        AppConfig { version: version.into(), ..Default::default() }
    }

    async fn lifecycle(network: Arc<MockNetwork>) -> Lifecycle {
        Lifecycle::new(CacheDb::open_in_memory().await.unwrap(), network)
    }

    #[tokio::test]
    async fn test_first_install_activates() {
        let lifecycle = lifecycle(manifest_network()).await;

        let state = lifecycle.install(&config("v1")).await.unwrap();
        assert_eq!(state, WorkerState::Active);
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v1"));

        let names = config("v1").generations();
        assert_eq!(lifecycle.db().count_entries(&names.static_name).await.unwrap(), 4);
        let generations: Vec<String> =
            lifecycle.db().list_generations().await.unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(generations, vec![names.static_name]);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let network = manifest_network();
        network.fail("http://localhost:3000/manifest.json");
        let lifecycle = lifecycle(network).await;

        let result = lifecycle.install(&config("v1")).await;
        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        assert_eq!(lifecycle.state("v1").await, Some(WorkerState::Redundant));
        assert!(lifecycle.active_version().await.is_none());
        assert!(lifecycle.db().list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let network = manifest_network();
        network.route("http://localhost:3000/offline.html", 404, "text/html", "missing");
        let lifecycle = lifecycle(network).await;

        let err = lifecycle.install(&config("v1")).await.unwrap_err();
        assert!(err.to_string().contains("status 404"));
    }

    #[tokio::test]
    async fn test_failed_upgrade_keeps_active_version() {
        let network = manifest_network();
        let lifecycle = lifecycle(network.clone()).await;
        lifecycle.install(&config("v1")).await.unwrap();

        network.set_offline(true);
        assert!(lifecycle.install(&config("v2")).await.is_err());

        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v1"));
        assert_eq!(lifecycle.state("v2").await, Some(WorkerState::Redundant));
        let v1 = config("v1").generations();
        assert_eq!(lifecycle.db().count_entries(&v1.static_name).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_upgrade_waits_while_clients_open() {
        let lifecycle = lifecycle(manifest_network()).await;
        lifecycle.install(&config("v1")).await.unwrap();
        let client = lifecycle.open_client("http://localhost:3000/").await;

        let state = lifecycle.install(&config("v2")).await.unwrap();
        assert_eq!(state, WorkerState::Waiting);
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v1"));
        assert_eq!(lifecycle.waiting_version().await.as_deref(), Some("v2"));
        assert_eq!(lifecycle.clients().get(client).await.unwrap().controller.as_deref(), Some("v1"));

        assert_eq!(lifecycle.skip_waiting().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(lifecycle.state("v1").await, Some(WorkerState::Redundant));
        assert_eq!(lifecycle.state("v2").await, Some(WorkerState::Active));
        assert_eq!(lifecycle.clients().get(client).await.unwrap().controller.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_closing_last_client_activates_waiting_version() {
        let lifecycle = lifecycle(manifest_network()).await;
        lifecycle.install(&config("v1")).await.unwrap();
        let first = lifecycle.open_client("http://localhost:3000/").await;
        let second = lifecycle.open_client("http://localhost:3000/annonces").await;
        assert_eq!(lifecycle.install(&config("v2")).await.unwrap(), WorkerState::Waiting);

        assert!(lifecycle.close_client(first).await.unwrap());
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v1"));
        assert_eq!(lifecycle.state("v2").await, Some(WorkerState::Waiting));

        assert!(lifecycle.close_client(second).await.unwrap());
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v2"));
        assert_eq!(lifecycle.waiting_version().await, None);
        assert_eq!(lifecycle.state("v1").await, Some(WorkerState::Redundant));
        assert_eq!(lifecycle.state("v2").await, Some(WorkerState::Active));

        assert!(!lifecycle.close_client(second).await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_document_with_fragment_served_from_precache() {
        let network = manifest_network();
        let lifecycle = lifecycle(network.clone()).await;
        let config = AppConfig {
            offline_document: "/offline.html#top".into(),
            install_manifest: vec!["/".into(), "/offline.html#top".into()],
            ..config("v1")
        };
        lifecycle.install(&config).await.unwrap();

        network.set_offline(true);
        let gateway = lifecycle.gateway().await.unwrap();
        let (_, resolution) = gateway.fetch(&Request::get("/communaute").with_accept("text/html")).await.unwrap();
        assert_eq!(resolution.response.source, ResponseSource::Fallback(FallbackKind::OfflineDocument));
        assert_eq!(resolution.response.status.as_u16(), 200);
        assert_eq!(&resolution.response.body[..], b"<h1>Hors ligne</h1>");
    }

    #[tokio::test]
    async fn test_activation_removes_superseded_generations() {
        let network = manifest_network();
        network.route("http://localhost:3000/api/listings", 200, "application/json", "[]");
        let lifecycle = lifecycle(network.clone()).await;
        lifecycle.install(&config("v1")).await.unwrap();

        let gateway = lifecycle.gateway().await.unwrap();
        gateway.fetch(&Request::get("/api/listings")).await.unwrap();
        let v1 = config("v1").generations();
        let listing_key = Request::get("http://localhost:3000/api/listings").cache_key();
        assert!(lifecycle.db().get_entry(&v1.dynamic_name, &listing_key).await.unwrap().is_some());

        assert_eq!(lifecycle.install(&config("v2")).await.unwrap(), WorkerState::Active);

        for generation in [&v1.static_name, &v1.dynamic_name] {
            assert_eq!(lifecycle.db().count_entries(generation).await.unwrap(), 0);
        }
        let names: Vec<String> =
            lifecycle.db().list_generations().await.unwrap().into_iter().map(|g| g.name).collect();
        assert!(names.iter().all(|n| config("v2").generations().is_current(n)));

        network.set_offline(true);
        let gateway = lifecycle.gateway().await.unwrap();
        let (_, resolution) = gateway.fetch(&Request::get("/api/listings")).await.unwrap();
        assert_ne!(resolution.response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_skip_waiting_without_waiting_version() {
        let lifecycle = lifecycle(manifest_network()).await;
        assert_eq!(lifecycle.skip_waiting().await.unwrap(), None);

        lifecycle.install(&config("v1")).await.unwrap();
        assert_eq!(lifecycle.skip_waiting().await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_reinstall_same_version_is_noop() {
        let network = manifest_network();
        let lifecycle = lifecycle(network.clone()).await;
        lifecycle.install(&config("v1")).await.unwrap();
        let calls = network.calls();

        assert_eq!(lifecycle.install(&config("v1")).await.unwrap(), WorkerState::Active);
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_gateway_requires_active_version() {
        let lifecycle = lifecycle(manifest_network()).await;
        assert!(matches!(lifecycle.gateway().await, Err(Error::NotActive)));
    }
}
