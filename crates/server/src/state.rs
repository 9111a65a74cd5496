//! Shared server state.

use std::sync::Arc;
use std::time::Duration;

use waypost_client::{ControlChannel, ControlHandle, Lifecycle, Network};
use waypost_core::{AppConfig, CacheDb};

/// How long `gateway_control` waits for a reply.
pub const CONTROL_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AppState {
    pub config: AppConfig,
    pub lifecycle: Arc<Lifecycle>,
    pub control: ControlHandle,
}

impl AppState {
    /// Install the configured version and start the control channel.
    ///
    /// An install failure is logged, not fatal: the server keeps running
    /// and intercepted requests report that no version is active.
    pub async fn start(config: AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(db, network));

        match lifecycle.install(&config).await {
            Ok(state) => tracing::info!(version = %config.version, ?state, "version installed"),
            Err(e) => tracing::error!(version = %config.version, error = %e, "version install failed"),
        }

        let control = ControlChannel::new(lifecycle.clone()).spawn();
        Self { config, lifecycle, control }
    }
}
