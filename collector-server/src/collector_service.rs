use anyhow::{Context, Result};

use collector_core::cluster::StandaloneClusterProvider;
use collector_core::module::{
    bootstrap, ConfigurationModuleProvider, ModuleProvider, RunningModules, StaticConfig,
};
use collector_storage::StorageModuleProvider;

use crate::service_configuration::ServiceConfiguration;

/// Module providers selected by the configuration, one per module.
pub(crate) fn providers(config: &ServiceConfiguration) -> Vec<Box<dyn ModuleProvider>> {
    vec![
        Box::new(ConfigurationModuleProvider::new(StaticConfig {
            cluster_name: config.cluster_name.clone(),
            namespace: config.namespace.clone(),
        })),
        Box::new(StandaloneClusterProvider::new(config.registration_ttl)),
        Box::new(StorageModuleProvider::new(config.storage.clone())),
    ]
}

/// Prepares, starts and notifies every configured module.
pub(crate) async fn start_collector(config: &ServiceConfiguration) -> Result<RunningModules> {
    bootstrap(providers(config))
        .await
        .context("Failed to bootstrap collector modules")
}
