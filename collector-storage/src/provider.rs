use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use collector_core::cluster::{
    new_instance_id, ModuleListenerService, ModuleRegisterService, ModuleRegistration,
    NamingListener,
};
use collector_core::merge::MergeEngine;
use collector_core::module::{
    CollectorConfig, ModuleManager, ModuleProvider, ServiceRegistry, CLUSTER_MODULE,
    CONFIGURATION_MODULE, STORAGE_MODULE,
};
use collector_core::storage::{BatchDao, HistoryDao, StorageClient};
use collector_core::{CollectorError, Result};

use crate::backend::{MemoryStorageClient, RedbStorageClient};
use crate::batch::ClientBatchDao;
use crate::table::{register_all, TableSet};
use crate::timer::PersistenceTimer;
use crate::ttl_keeper::{DataTtlKeeper, DEFAULT_TTL_DAYS};
use crate::worker::FlushSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendKind {
    Memory,
    Redb { path: PathBuf },
}

impl StorageBackendKind {
    pub fn provider_name(&self) -> &'static str {
        match self {
            StorageBackendKind::Memory => "memory",
            StorageBackendKind::Redb { .. } => "redb",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackendKind,
    /// Retention horizon in days; `0` falls back to three days.
    pub ttl_days: u32,
    pub ttl_check_interval: Duration,
    pub flush_interval: Duration,
    pub flush_timeout: Duration,
    pub strict_merge: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            ttl_days: DEFAULT_TTL_DAYS,
            ttl_check_interval: Duration::from_secs(24 * 60 * 60),
            flush_interval: Duration::from_secs(1),
            flush_timeout: Duration::from_secs(30),
            strict_merge: false,
        }
    }
}

/// Handles to the storage module's background machinery. Registered as a
/// service of the `storage` module; the handles are filled in by `start`.
#[derive(Debug)]
pub struct StorageRuntime {
    instance_id: String,
    naming: Arc<NamingListener>,
    registration: OnceLock<ModuleRegistration>,
    timer: OnceLock<Arc<PersistenceTimer>>,
    ttl_keeper: OnceLock<Arc<DataTtlKeeper>>,
}

impl StorageRuntime {
    fn new(instance_id: String) -> Self {
        Self {
            instance_id,
            naming: Arc::new(NamingListener::new(STORAGE_MODULE)),
            registration: OnceLock::new(),
            timer: OnceLock::new(),
            ttl_keeper: OnceLock::new(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Membership view of the `storage` module as seen by this instance.
    pub fn naming(&self) -> Arc<NamingListener> {
        self.naming.clone()
    }

    pub fn registration(&self) -> Option<&ModuleRegistration> {
        self.registration.get()
    }

    pub fn persistence_timer(&self) -> Option<Arc<PersistenceTimer>> {
        self.timer.get().cloned()
    }

    pub fn ttl_keeper(&self) -> Option<Arc<DataTtlKeeper>> {
        self.ttl_keeper.get().cloned()
    }
}

fn already_started() -> CollectorError {
    CollectorError::InvariantViolation("storage module started twice".to_owned())
}

/// The `storage` module: one backend, every entity table, the persistence
/// timer and the retention sweeper.
///
/// `prepare` opens the backend and registers a handler and a worker per
/// table. `start` applies the configured namespace, installs the tables and
/// registers this instance with the cluster. Background timers begin in
/// `notify_after_completed`, once every module is up.
pub struct StorageModuleProvider {
    settings: StorageSettings,
    client: Option<Arc<dyn StorageClient>>,
    histories: Vec<Arc<dyn HistoryDao>>,
    sources: Vec<Arc<dyn FlushSource>>,
    runtime: Arc<StorageRuntime>,
    tasks: Vec<JoinHandle<()>>,
}

impl StorageModuleProvider {
    pub fn new(settings: StorageSettings) -> Self {
        Self::with_instance_id(settings, new_instance_id())
    }

    /// Uses a fixed instance id instead of a random one.
    pub fn with_instance_id(settings: StorageSettings, instance_id: impl Into<String>) -> Self {
        Self {
            settings,
            client: None,
            histories: Vec::new(),
            sources: Vec::new(),
            runtime: Arc::new(StorageRuntime::new(instance_id.into())),
            tasks: Vec::new(),
        }
    }

    pub fn runtime(&self) -> Arc<StorageRuntime> {
        self.runtime.clone()
    }

    fn open_client(&self) -> Result<Arc<dyn StorageClient>> {
        Ok(match &self.settings.backend {
            StorageBackendKind::Memory => Arc::new(MemoryStorageClient::new()),
            StorageBackendKind::Redb { path } => Arc::new(RedbStorageClient::open(path)?),
        })
    }

    fn client(&self) -> Result<Arc<dyn StorageClient>> {
        self.client
            .clone()
            .ok_or_else(|| CollectorError::ServiceNotProvided {
                module: STORAGE_MODULE.to_owned(),
                service: "StorageClient".to_owned(),
            })
    }
}

impl Drop for StorageModuleProvider {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl ModuleProvider for StorageModuleProvider {
    fn name(&self) -> &str {
        self.settings.backend.provider_name()
    }

    fn module(&self) -> &str {
        STORAGE_MODULE
    }

    fn required_modules(&self) -> &[&'static str] {
        &[CLUSTER_MODULE, CONFIGURATION_MODULE]
    }

    async fn prepare(&mut self, _: &ModuleManager, services: &mut ServiceRegistry) -> Result<()> {
        let client = self.open_client()?;
        let engine = if self.settings.strict_merge {
            MergeEngine::strict()
        } else {
            MergeEngine::lenient()
        };

        let mut tables = TableSet::new(client.clone(), engine);
        register_all(&mut tables, services)?;
        self.histories = tables.histories().to_vec();
        self.sources = tables.sources().to_vec();

        services.register::<dyn StorageClient>(client.clone())?;
        services.register::<dyn BatchDao>(Arc::new(ClientBatchDao::new(client.clone())))?;
        services.register(self.runtime.clone())?;
        self.client = Some(client);
        Ok(())
    }

    async fn start(&mut self, manager: &ModuleManager) -> Result<()> {
        let client = self.client()?;
        let config = manager.service::<dyn CollectorConfig>(CONFIGURATION_MODULE)?;
        client.namespace().set(config.namespace())?;

        for history in &self.histories {
            if let Err(e) = client.install(history.table()).await {
                warn!(table = %history.table(), error = %e, "failed to install table");
            }
        }
        info!(
            backend = %client.backend(),
            namespace = %config.namespace(),
            tables = self.histories.len(),
            "storage tables installed"
        );

        let runtime = &self.runtime;
        let registration =
            ModuleRegistration::new(STORAGE_MODULE, self.name(), &runtime.instance_id, 0);
        manager
            .service::<dyn ModuleRegisterService>(CLUSTER_MODULE)?
            .register(registration.clone())
            .await?;
        manager
            .service::<dyn ModuleListenerService>(CLUSTER_MODULE)?
            .add_listener(runtime.naming.clone())
            .await?;

        runtime
            .timer
            .set(Arc::new(PersistenceTimer::new(
                self.sources.clone(),
                Arc::new(ClientBatchDao::new(client)),
                self.settings.flush_interval,
                self.settings.flush_timeout,
            )))
            .map_err(|_| already_started())?;
        runtime
            .ttl_keeper
            .set(Arc::new(DataTtlKeeper::new(
                self.histories.clone(),
                runtime.naming.clone(),
                registration.clone(),
                self.settings.ttl_days,
            )))
            .map_err(|_| already_started())?;
        runtime
            .registration
            .set(registration)
            .map_err(|_| already_started())?;
        Ok(())
    }

    async fn notify_after_completed(&mut self, _: &ModuleManager) -> Result<()> {
        if let Some(timer) = self.runtime.persistence_timer() {
            self.tasks.push(timer.start());
        }
        if let Some(keeper) = self.runtime.ttl_keeper() {
            self.tasks
                .push(keeper.start(self.settings.ttl_check_interval));
        }
        Ok(())
    }
}
