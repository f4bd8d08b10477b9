use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use collector_core::storage::{BatchDao, BatchOutcome};
use collector_core::Result;

use crate::batch::BatchPipeline;
use crate::worker::FlushSource;

/// Periodically drains every worker into one batch and flushes it.
///
/// Cycles are serialized, so a record staged in one cycle is persisted before
/// the next cycle reads its id back from the backend.
pub struct PersistenceTimer {
    sources: Vec<Arc<dyn FlushSource>>,
    dao: Arc<dyn BatchDao>,
    flush_interval: Duration,
    flush_timeout: Duration,
    cycle: Mutex<()>,
}

impl PersistenceTimer {
    pub fn new(
        sources: Vec<Arc<dyn FlushSource>>,
        dao: Arc<dyn BatchDao>,
        flush_interval: Duration,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            dao,
            flush_interval,
            flush_timeout,
            cycle: Mutex::new(()),
        }
    }

    pub async fn run_cycle(&self) -> Result<BatchOutcome> {
        let _cycle = self.cycle.lock().await;

        let mut pipeline = BatchPipeline::new(self.dao.clone(), self.flush_timeout);
        for source in &self.sources {
            if source.pending() == 0 {
                continue;
            }
            let operations = source.prepare().await;
            debug!(table = %source.table(), operations = operations.len(), "worker drained");
            pipeline.extend(operations);
        }
        pipeline.flush().await
    }

    /// Spawns the flush loop. The first cycle runs one interval after start.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            workers = self.sources.len(),
            interval_ms = self.flush_interval.as_millis() as u64,
            "persistence timer started"
        );
        tokio::spawn(async move {
            let period = self.flush_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Flush failures are logged and counted by the pipeline.
                let _ = self.run_cycle().await;
            }
        })
    }
}

impl std::fmt::Debug for PersistenceTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceTimer")
            .field("workers", &self.sources.len())
            .field("flush_interval", &self.flush_interval)
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}
