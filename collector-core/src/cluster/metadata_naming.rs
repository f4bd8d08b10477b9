use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::{
    ClusterModuleListener, ModuleListenerService, ModuleRegisterService, ModuleRegistration,
};
use crate::errors::Result;
use crate::metadata::{MetadataError, MetadataStore};

pub const BASE_CLUSTER_PATH: &str = "/cluster";

/// Cluster naming over a [`MetadataStore`].
///
/// Each registration lives at `/cluster/<module>/<instance_id>_<sequence>`
/// with a TTL and is renewed every third of it, so a crashed instance drops
/// out of the view once its key expires. Listeners watch `/cluster/<module>/`
/// and receive the full, sorted peer list after every change.
///
/// Dropping the service stops its renewals and watches; its registrations
/// then expire with their TTL.
pub struct MetadataClusterService {
    store: Arc<dyn MetadataStore>,
    ttl: Duration,
    renewals: DashMap<String, JoinHandle<()>>,
    watches: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for MetadataClusterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataClusterService")
            .field("ttl", &self.ttl)
            .field("registrations", &self.renewals.len())
            .finish()
    }
}

impl MetadataClusterService {
    pub fn new(store: Arc<dyn MetadataStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            renewals: DashMap::new(),
            watches: Mutex::new(Vec::new()),
        }
    }

    fn module_prefix(module: &str) -> String {
        format!("{}/{}/", BASE_CLUSTER_PATH, module)
    }

    fn registration_path(registration: &ModuleRegistration) -> String {
        format!(
            "{}{}",
            Self::module_prefix(&registration.module_name),
            registration.key()
        )
    }

    /// Current peers of a module, sorted.
    pub async fn peers(&self, module: &str) -> Result<Vec<ModuleRegistration>> {
        read_peers(self.store.as_ref(), module).await
    }

    /// Stops renewing a registration and removes it from the view.
    pub async fn deregister(&self, registration: &ModuleRegistration) -> Result<()> {
        let path = Self::registration_path(registration);
        if let Some((_, handle)) = self.renewals.remove(&path) {
            handle.abort();
        }
        self.store.delete(&path).await?;
        info!(
            module = %registration.module_name,
            instance_id = %registration.instance_id,
            "module instance deregistered"
        );
        Ok(())
    }
}

impl Drop for MetadataClusterService {
    fn drop(&mut self) {
        for entry in self.renewals.iter() {
            entry.value().abort();
        }
        let watches = self.watches.get_mut().unwrap_or_else(|e| e.into_inner());
        for handle in watches.drain(..) {
            handle.abort();
        }
    }
}

#[async_trait]
impl ModuleRegisterService for MetadataClusterService {
    async fn register(&self, registration: ModuleRegistration) -> Result<()> {
        let path = Self::registration_path(&registration);
        let payload = serde_json::to_value(&registration)?;
        let ttl = self.ttl;

        self.store.put_with_ttl(&path, payload.clone(), ttl).await?;
        info!(
            module = %registration.module_name,
            provider = %registration.provider_name,
            instance_id = %registration.instance_id,
            "module instance registered in the cluster"
        );

        let store = self.store.clone();
        let renew_path = path.clone();
        let renew_interval = ttl / 3;
        let handle = tokio::spawn(async move {
            loop {
                sleep(renew_interval).await;
                if let Err(e) = store.put_with_ttl(&renew_path, payload.clone(), ttl).await {
                    error!(path = %renew_path, error = %e, "failed to renew cluster registration");
                    break;
                }
            }
        });
        if let Some(previous) = self.renewals.insert(path, handle) {
            previous.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleListenerService for MetadataClusterService {
    async fn add_listener(&self, listener: Arc<dyn ClusterModuleListener>) -> Result<()> {
        let module = listener.module_name().to_owned();
        let prefix = Self::module_prefix(&module);

        // Subscribe before the initial read so no change falls in between.
        let mut watch_stream = self.store.watch(&prefix).await?;
        listener.on_membership_changed(self.peers(&module).await?);

        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            while let Some(result) = watch_stream.next().await {
                match result {
                    Ok(_) => {}
                    Err(MetadataError::WatchError(msg)) => {
                        warn!(
                            module = %module,
                            reason = %msg,
                            "membership watch lagged, resyncing"
                        );
                    }
                    Err(e) => {
                        warn!(module = %module, error = %e, "error receiving membership event");
                        continue;
                    }
                }
                match read_peers(store.as_ref(), &module).await {
                    Ok(peers) => listener.on_membership_changed(peers),
                    Err(e) => warn!(module = %module, error = %e, "failed to read module peers"),
                }
            }
            warn!(module = %module, "membership watch stream ended");
        });
        self.watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        Ok(())
    }
}

/// Undecodable entries are logged and skipped.
async fn read_peers(store: &dyn MetadataStore, module: &str) -> Result<Vec<ModuleRegistration>> {
    let entries = store
        .get_bulk(&MetadataClusterService::module_prefix(module))
        .await?;
    let mut peers = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_slice::<ModuleRegistration>(&entry.value) {
            Ok(registration) => peers.push(registration),
            Err(e) => warn!(
                key = %entry.key,
                error = %e,
                "skipping malformed cluster registration"
            ),
        }
    }
    peers.sort();
    Ok(peers)
}
