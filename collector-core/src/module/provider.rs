use async_trait::async_trait;

use super::{ModuleManager, ServiceRegistry};
use crate::errors::Result;

/// One concrete implementation of a module.
///
/// The bootstrap drives every provider through `prepare`, then `start`, both
/// in dependency order, then `notify_after_completed` once every module has
/// started. Providers live for the whole process; there is no teardown hook.
#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// Provider name, e.g. `redb`.
    fn name(&self) -> &str;

    /// Module this provider implements, e.g. `storage`.
    fn module(&self) -> &str;

    /// Modules that must be prepared and started before this one.
    fn required_modules(&self) -> &[&'static str] {
        &[]
    }

    /// Builds the module's services and registers them. Services of required
    /// modules are already resolvable through `manager`.
    async fn prepare(&mut self, manager: &ModuleManager, services: &mut ServiceRegistry)
        -> Result<()>;

    async fn start(&mut self, manager: &ModuleManager) -> Result<()>;

    /// Runs after every module finished `start`.
    async fn notify_after_completed(&mut self, manager: &ModuleManager) -> Result<()>;
}
