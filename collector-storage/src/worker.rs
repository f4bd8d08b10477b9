use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::counter;
use std::sync::Arc;
use tracing::{trace, warn};

use collector_core::merge::MergeEngine;
use collector_core::storage::{PersistenceDao, PreparedOperation};
use collector_core::stream_data::StreamData;
use collector_core::Result;

use crate::storage_metrics::RECORDS_MERGED_TOTAL;

/// Entry point for newly observed records of one entity type.
pub trait RecordSink<T: StreamData>: Send + Sync {
    fn ingest(&self, record: T) -> Result<()>;
}

/// Something the persistence timer drains into a batch.
#[async_trait]
pub trait FlushSource: Send + Sync {
    fn table(&self) -> &str;

    /// Records staged and not yet prepared.
    fn pending(&self) -> usize;

    /// Drains staged records into prepared operations. Records that cannot
    /// be prepared are logged and dropped.
    async fn prepare(&self) -> Vec<PreparedOperation>;
}

/// Stages records of one table and turns them into batch operations.
///
/// `ingest` merges into the staged record under the map's shard lock, so
/// merges of the same id never interleave, and no lock is held across I/O.
/// `prepare` detaches staged records before reading the persisted version,
/// so records arriving meanwhile are staged for the next cycle.
pub struct PersistenceWorker<T: StreamData> {
    dao: Arc<dyn PersistenceDao<T>>,
    engine: MergeEngine,
    staged: DashMap<String, T>,
}

impl<T: StreamData> PersistenceWorker<T> {
    pub fn new(dao: Arc<dyn PersistenceDao<T>>, engine: MergeEngine) -> Self {
        Self {
            dao,
            engine,
            staged: DashMap::new(),
        }
    }

    pub fn staged(&self, id: &str) -> Option<T> {
        self.staged.get(id).map(|entry| entry.value().clone())
    }

    async fn prepare_one(&self, staged: T) -> Result<PreparedOperation> {
        match self.dao.get(staged.id()).await? {
            Some(persisted) => {
                let merged = self.engine.merge(&persisted, &staged)?;
                self.dao.prepare_batch_update(&merged)
            }
            None => self.dao.prepare_batch_insert(&staged),
        }
    }
}

impl<T: StreamData> RecordSink<T> for PersistenceWorker<T> {
    fn ingest(&self, record: T) -> Result<()> {
        match self.staged.entry(record.id().to_owned()) {
            Entry::Occupied(mut entry) => {
                let merged = self.engine.merge(entry.get(), &record)?;
                entry.insert(merged);
                counter!(RECORDS_MERGED_TOTAL.name, "table" => self.dao.table().to_owned())
                    .increment(1);
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: StreamData> FlushSource for PersistenceWorker<T> {
    fn table(&self) -> &str {
        self.dao.table()
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    async fn prepare(&self) -> Vec<PreparedOperation> {
        let ids: Vec<String> = self.staged.iter().map(|e| e.key().clone()).collect();
        let mut operations = Vec::with_capacity(ids.len());
        for id in ids {
            let Some((_, staged)) = self.staged.remove(&id) else {
                continue;
            };
            match self.prepare_one(staged).await {
                Ok(operation) => {
                    trace!(%operation, "operation prepared");
                    operations.push(operation);
                }
                Err(e) => warn!(
                    table = %self.dao.table(),
                    id = %id,
                    error = %e,
                    "failed to prepare record, dropping it"
                ),
            }
        }
        operations
    }
}
