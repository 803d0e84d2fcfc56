//! Shared application state passed to every handler.

use std::sync::Arc;
use std::time::Duration;

use sq_core::config::Config;
use sq_core::{ArtifactStore, ProgressBroadcaster};

use crate::conversion::Orchestrator;

/// Shared application state, cheaply cloneable.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub progress: Arc<ProgressBroadcaster>,
    pub store: ArtifactStore,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppContext {
    /// Build the broadcaster, store and orchestrator described by `config`.
    pub fn new(config: Config) -> Self {
        let progress = Arc::new(ProgressBroadcaster::new(config.conversion.broadcast_capacity));
        let store = ArtifactStore::new(config.artifacts.retention(), config.artifacts.grace());
        let orchestrator = Orchestrator::new(progress.clone(), store.clone())
            .with_timeout(config.conversion.timeout_secs.map(Duration::from_secs));

        Self {
            config: Arc::new(config),
            progress,
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Largest decoded payload accepted for conversion or upload.
    pub fn max_upload_bytes(&self) -> u64 {
        self.config.uploads.max_bytes
    }
}
