use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use collector_core::storage::{BatchDao, BatchOutcome, PreparedOperation, StorageClient};
use collector_core::{CollectorError, Result};

use crate::storage_metrics::{
    BATCH_FLUSH_DURATION_SECONDS, BATCH_FLUSH_FAILURES_TOTAL, BATCH_FLUSH_TOTAL,
    PREPARED_OPERATIONS_TOTAL,
};

/// [`BatchDao`] that hands the whole batch to the storage client.
#[derive(Debug)]
pub struct ClientBatchDao {
    client: Arc<dyn StorageClient>,
}

impl ClientBatchDao {
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchDao for ClientBatchDao {
    async fn batch_persistence(&self, operations: Vec<PreparedOperation>) -> Result<BatchOutcome> {
        self.client.execute_batch(operations).await
    }

    async fn batch_persistence_until(
        &self,
        operations: Vec<PreparedOperation>,
        deadline: Instant,
    ) -> Result<BatchOutcome> {
        self.client.execute_batch_until(operations, deadline).await
    }
}

/// Collects prepared operations of any entity type and flushes them as one
/// unit. There is no retry: a failed flush is logged and its operations are
/// dropped.
pub struct BatchPipeline {
    dao: Arc<dyn BatchDao>,
    timeout: Duration,
    pending: Vec<PreparedOperation>,
}

impl BatchPipeline {
    pub fn new(dao: Arc<dyn BatchDao>, timeout: Duration) -> Self {
        Self {
            dao,
            timeout,
            pending: Vec::new(),
        }
    }

    pub fn add(&mut self, operation: PreparedOperation) {
        self.pending.push(operation);
    }

    pub fn extend(&mut self, operations: impl IntoIterator<Item = PreparedOperation>) {
        self.pending.extend(operations);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Executes everything accumulated so far. The pipeline is empty
    /// afterwards whatever the outcome.
    ///
    /// The backend gets the same deadline as the timeout, so a flush reported
    /// as timed out is not committed later by a backend write still running.
    pub async fn flush(&mut self) -> Result<BatchOutcome> {
        let operations = std::mem::take(&mut self.pending);
        if operations.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let count = operations.len();
        counter!(PREPARED_OPERATIONS_TOTAL.name).increment(count as u64);
        counter!(BATCH_FLUSH_TOTAL.name).increment(1);

        let started = Instant::now();
        let flush = self
            .dao
            .batch_persistence_until(operations, started + self.timeout);
        let result = match tokio::time::timeout(self.timeout, flush).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::BackendUnavailable(format!(
                "batch flush timed out after {:?}",
                self.timeout
            ))),
        };
        histogram!(BATCH_FLUSH_DURATION_SECONDS.name).record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                for failed in &outcome.failed {
                    warn!(
                        table = %failed.table,
                        id = %failed.id,
                        reason = %failed.reason,
                        "batched operation rejected by backend"
                    );
                }
                if !outcome.failed.is_empty() {
                    counter!(BATCH_FLUSH_FAILURES_TOTAL.name)
                        .increment(outcome.failed.len() as u64);
                }
                debug!(
                    operations = count,
                    applied = outcome.applied,
                    failed = outcome.failed.len(),
                    "batch flushed"
                );
                Ok(outcome)
            }
            Err(e) => {
                counter!(BATCH_FLUSH_FAILURES_TOTAL.name).increment(1);
                error!(operations = count, error = %e, "batch flush failed, operations dropped");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for BatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPipeline")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish()
    }
}
