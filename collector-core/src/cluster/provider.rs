use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::{MetadataClusterService, ModuleListenerService, ModuleRegisterService};
use crate::errors::Result;
use crate::metadata::MemoryStore;
use crate::module::{ModuleManager, ModuleProvider, ServiceRegistry, CLUSTER_MODULE};

const MIN_EXPIRY_INTERVAL: Duration = Duration::from_millis(50);

/// `cluster` module backed by an in-process [`MemoryStore`].
///
/// Instances only see each other when they share the store, which makes this
/// provider fit single-process deployments and tests that run several
/// collector instances side by side.
pub struct StandaloneClusterProvider {
    store: MemoryStore,
    registration_ttl: Duration,
    expiry: Option<JoinHandle<()>>,
}

impl StandaloneClusterProvider {
    pub fn new(registration_ttl: Duration) -> Self {
        Self::with_store(MemoryStore::new(), registration_ttl)
    }

    pub fn with_store(store: MemoryStore, registration_ttl: Duration) -> Self {
        Self {
            store,
            registration_ttl,
            expiry: None,
        }
    }
}

impl Drop for StandaloneClusterProvider {
    fn drop(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl ModuleProvider for StandaloneClusterProvider {
    fn name(&self) -> &str {
        "standalone"
    }

    fn module(&self) -> &str {
        CLUSTER_MODULE
    }

    async fn prepare(&mut self, _: &ModuleManager, services: &mut ServiceRegistry) -> Result<()> {
        let naming = Arc::new(MetadataClusterService::new(
            Arc::new(self.store.clone()),
            self.registration_ttl,
        ));
        services.register::<dyn ModuleRegisterService>(naming.clone())?;
        services.register::<dyn ModuleListenerService>(naming.clone())?;
        services.register::<MetadataClusterService>(naming)?;
        Ok(())
    }

    async fn start(&mut self, _: &ModuleManager) -> Result<()> {
        let interval = (self.registration_ttl / 3).max(MIN_EXPIRY_INTERVAL);
        self.expiry = Some(self.store.spawn_expiry_worker(interval));
        info!(
            ttl_secs = self.registration_ttl.as_secs(),
            "standalone cluster naming started"
        );
        Ok(())
    }

    async fn notify_after_completed(&mut self, _: &ModuleManager) -> Result<()> {
        Ok(())
    }
}
