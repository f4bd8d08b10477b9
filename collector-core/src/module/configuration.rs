use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use super::{ModuleManager, ModuleProvider, ServiceRegistry, CONFIGURATION_MODULE};
use crate::errors::Result;

/// Process-wide settings other modules read while starting.
pub trait CollectorConfig: Send + Sync + Debug {
    fn cluster_name(&self) -> &str;

    /// Prefix for physical table names. Empty means no prefix.
    fn namespace(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    pub cluster_name: String,
    pub namespace: String,
}

impl CollectorConfig for StaticConfig {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Provider of the `configuration` module backed by already loaded values.
#[derive(Debug)]
pub struct ConfigurationModuleProvider {
    config: Arc<StaticConfig>,
}

impl ConfigurationModuleProvider {
    pub fn new(config: StaticConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl ModuleProvider for ConfigurationModuleProvider {
    fn name(&self) -> &str {
        "default"
    }

    fn module(&self) -> &str {
        CONFIGURATION_MODULE
    }

    async fn prepare(&mut self, _: &ModuleManager, services: &mut ServiceRegistry) -> Result<()> {
        services.register::<dyn CollectorConfig>(self.config.clone())
    }

    async fn start(&mut self, _: &ModuleManager) -> Result<()> {
        Ok(())
    }

    async fn notify_after_completed(&mut self, _: &ModuleManager) -> Result<()> {
        Ok(())
    }
}
