//! Stream entities persisted by the collector and the tables they live in.
//!
//! Time-bucketed entities are stored once per granularity in tables named
//! `<granularity>_<base>`; their handlers and workers are registered as one
//! [`TimePyramid`] service per interface.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use collector_core::merge::MergeEngine;
use collector_core::module::ServiceRegistry;
use collector_core::storage::{HistoryDao, PersistenceDao, StorageClient, TimePyramid};
use collector_core::stream_data::StreamData;
use collector_core::time_bucket::Granularity;
use collector_core::Result;

use crate::handler::{EntityDescriptor, PersistenceHandler};
use crate::worker::{FlushSource, PersistenceWorker, RecordSink};

mod alarm;
pub use alarm::{
    ApplicationAlarmList, InstanceReferenceAlarmList, ServiceReferenceAlarmList,
    APPLICATION_ALARM_LEVELS, APPLICATION_ALARM_LIST, INSTANCE_REFERENCE_ALARM_LIST,
    SERVICE_REFERENCE_ALARM_LIST,
};

mod cpu;
pub use cpu::{CpuMetric, CPU_METRIC, CPU_METRIC_LEVELS};

mod instance;
pub use instance::{
    InstanceHeartBeat, InstanceMapping, HEARTBEAT_UPDATE_COLUMNS, INSTANCE, INSTANCE_MAPPING,
    INSTANCE_MAPPING_LEVELS,
};

/// Builds handlers and workers against one storage client and remembers
/// them for the retention sweeper and the persistence timer.
pub struct TableSet {
    client: Arc<dyn StorageClient>,
    engine: MergeEngine,
    histories: Vec<Arc<dyn HistoryDao>>,
    sources: Vec<Arc<dyn FlushSource>>,
}

impl TableSet {
    pub fn new(client: Arc<dyn StorageClient>, engine: MergeEngine) -> Self {
        Self {
            client,
            engine,
            histories: Vec::new(),
            sources: Vec::new(),
        }
    }

    fn build<T>(
        &mut self,
        descriptor: EntityDescriptor,
    ) -> (Arc<dyn PersistenceDao<T>>, Arc<dyn RecordSink<T>>)
    where
        T: StreamData + Serialize + DeserializeOwned,
    {
        let handler = Arc::new(PersistenceHandler::<T>::new(self.client.clone(), descriptor));
        self.histories.push(handler.clone());

        let dao: Arc<dyn PersistenceDao<T>> = handler;
        let worker = Arc::new(PersistenceWorker::new(dao.clone(), self.engine));
        self.sources.push(worker.clone());

        let sink: Arc<dyn RecordSink<T>> = worker;
        (dao, sink)
    }

    /// Registers the handler and worker of a single-table entity.
    pub fn register<T>(
        &mut self,
        services: &mut ServiceRegistry,
        descriptor: EntityDescriptor,
    ) -> Result<()>
    where
        T: StreamData + Serialize + DeserializeOwned,
    {
        let (dao, sink) = self.build::<T>(descriptor);
        services.register::<dyn PersistenceDao<T>>(dao)?;
        services.register::<dyn RecordSink<T>>(sink)
    }

    /// Registers one table per granularity of a time-bucketed entity.
    pub fn register_pyramid<T>(
        &mut self,
        services: &mut ServiceRegistry,
        base: &str,
        levels: &[Granularity],
    ) -> Result<()>
    where
        T: StreamData + Serialize + DeserializeOwned,
    {
        let mut daos = TimePyramid::<dyn PersistenceDao<T>>::new();
        let mut sinks = TimePyramid::<dyn RecordSink<T>>::new();
        for granularity in levels {
            let descriptor = EntityDescriptor::bucketed(granularity.table_name(base), *granularity);
            let (dao, sink) = self.build::<T>(descriptor);
            daos = daos.with(*granularity, dao);
            sinks = sinks.with(*granularity, sink);
        }
        services.register(Arc::new(daos))?;
        services.register(Arc::new(sinks))
    }

    pub fn histories(&self) -> &[Arc<dyn HistoryDao>] {
        &self.histories
    }

    pub fn sources(&self) -> &[Arc<dyn FlushSource>] {
        &self.sources
    }
}

impl std::fmt::Debug for TableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables: Vec<_> = self.histories.iter().map(|h| h.table().to_owned()).collect();
        f.debug_struct("TableSet")
            .field("backend", &self.client.backend())
            .field("tables", &tables)
            .finish()
    }
}

/// Registers every collector entity.
pub fn register_all(tables: &mut TableSet, services: &mut ServiceRegistry) -> Result<()> {
    tables.register_pyramid::<ApplicationAlarmList>(
        services,
        APPLICATION_ALARM_LIST,
        &APPLICATION_ALARM_LEVELS,
    )?;
    tables.register::<InstanceReferenceAlarmList>(
        services,
        EntityDescriptor::bucketed(INSTANCE_REFERENCE_ALARM_LIST, Granularity::Minute),
    )?;
    tables.register::<ServiceReferenceAlarmList>(
        services,
        EntityDescriptor::bucketed(SERVICE_REFERENCE_ALARM_LIST, Granularity::Minute),
    )?;
    tables.register_pyramid::<InstanceMapping>(
        services,
        INSTANCE_MAPPING,
        &INSTANCE_MAPPING_LEVELS,
    )?;
    tables.register_pyramid::<CpuMetric>(services, CPU_METRIC, &CPU_METRIC_LEVELS)?;
    tables.register::<InstanceHeartBeat>(
        services,
        EntityDescriptor::in_place(INSTANCE, HEARTBEAT_UPDATE_COLUMNS),
    )
}
