//! Module registry and service locator.
//!
//! A module is a named capability slot (`storage`, `cluster`, ...); exactly
//! one provider implements it per process. Providers register their services
//! into a [`ServiceRegistry`] during `prepare` and look up other modules'
//! services through the [`ModuleManager`].

mod services;
pub use services::ServiceRegistry;

mod provider;
pub use provider::ModuleProvider;

mod manager;
pub use manager::{bootstrap, LoadedModule, ModuleManager, ModuleState, RunningModules};

mod configuration;
pub use configuration::{CollectorConfig, ConfigurationModuleProvider, StaticConfig};

#[cfg(test)]
mod manager_test;

pub const CLUSTER_MODULE: &str = "cluster";
pub const CONFIGURATION_MODULE: &str = "configuration";
pub const STORAGE_MODULE: &str = "storage";
