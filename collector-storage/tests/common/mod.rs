#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use collector_core::cluster::{NamingListener, StandaloneClusterProvider};
use collector_core::metadata::MemoryStore;
use collector_core::module::{
    bootstrap, ConfigurationModuleProvider, ModuleProvider, RunningModules, StaticConfig,
    STORAGE_MODULE,
};
use collector_storage::{StorageBackendKind, StorageModuleProvider, StorageRuntime, StorageSettings};

/// Settings whose background loops never fire during a test.
pub fn quiet_settings(backend: StorageBackendKind) -> StorageSettings {
    StorageSettings {
        backend,
        ttl_check_interval: Duration::from_secs(3600),
        flush_interval: Duration::from_secs(3600),
        ..StorageSettings::default()
    }
}

/// Boots configuration, cluster and storage modules for one collector
/// instance. Instances passing the same store see each other as peers.
pub async fn start_instance(
    store: MemoryStore,
    instance_id: &str,
    namespace: &str,
    backend: StorageBackendKind,
) -> (RunningModules, Arc<StorageRuntime>) {
    // Deliberately out of dependency order.
    let providers: Vec<Box<dyn ModuleProvider>> = vec![
        Box::new(StorageModuleProvider::with_instance_id(
            quiet_settings(backend),
            instance_id,
        )),
        Box::new(StandaloneClusterProvider::with_store(
            store,
            Duration::from_secs(30),
        )),
        Box::new(ConfigurationModuleProvider::new(StaticConfig {
            cluster_name: "test".into(),
            namespace: namespace.into(),
        })),
    ];
    let running = bootstrap(providers).await.expect("bootstrap");
    let runtime = running
        .manager
        .service::<StorageRuntime>(STORAGE_MODULE)
        .expect("storage runtime");
    (running, runtime)
}

/// Waits until the naming view lists `expected` peers.
pub async fn wait_for_peers(naming: &NamingListener, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while naming.peers().len() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("membership view did not converge");
}
