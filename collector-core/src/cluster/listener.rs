use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::debug;

use super::{ClusterModuleListener, ModuleRegistration};

/// Membership view of one module, used to elect the maintenance instance.
///
/// The peer list is replaced wholesale on every change, so readers always see
/// a complete snapshot and never a list being rebuilt.
#[derive(Debug)]
pub struct NamingListener {
    module: String,
    peers: ArcSwap<Vec<ModuleRegistration>>,
}

impl NamingListener {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_owned(),
            peers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Current peers, sorted by `(instance_id, sequence)`.
    pub fn peers(&self) -> Arc<Vec<ModuleRegistration>> {
        self.peers.load_full()
    }

    pub fn elected(&self) -> Option<ModuleRegistration> {
        self.peers.load().first().cloned()
    }

    /// True when `registration` sorts first among the current peers. An
    /// empty view elects nobody.
    pub fn is_elected(&self, registration: &ModuleRegistration) -> bool {
        self.peers
            .load()
            .first()
            .is_some_and(|first| first.same_member(registration))
    }
}

impl ClusterModuleListener for NamingListener {
    fn module_name(&self) -> &str {
        &self.module
    }

    fn on_membership_changed(&self, mut peers: Vec<ModuleRegistration>) {
        peers.sort();
        peers.dedup_by(|a, b| a.same_member(b));
        debug!(
            module = %self.module,
            peers = peers.len(),
            elected = ?peers.first().map(|p| p.key()),
            "module membership changed"
        );
        self.peers.store(Arc::new(peers));
    }
}
