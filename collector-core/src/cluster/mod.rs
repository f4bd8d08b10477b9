//! Cluster naming: instance registration, membership listeners and the
//! election rule for singleton maintenance work.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;

mod registration;
pub use registration::{new_instance_id, ModuleRegistration};

mod listener;
pub use listener::NamingListener;

mod metadata_naming;
pub use metadata_naming::{MetadataClusterService, BASE_CLUSTER_PATH};

mod provider;
pub use provider::StandaloneClusterProvider;

#[cfg(test)]
mod listener_test;

/// Publishes this instance in the module's membership view.
#[async_trait]
pub trait ModuleRegisterService: Send + Sync {
    async fn register(&self, registration: ModuleRegistration) -> Result<()>;
}

/// Subscribes listeners to membership changes of a module.
#[async_trait]
pub trait ModuleListenerService: Send + Sync {
    /// The listener gets the current peers right away and again after every
    /// change.
    async fn add_listener(&self, listener: Arc<dyn ClusterModuleListener>) -> Result<()>;
}

pub trait ClusterModuleListener: Send + Sync {
    fn module_name(&self) -> &str;

    fn on_membership_changed(&self, peers: Vec<ModuleRegistration>);
}
