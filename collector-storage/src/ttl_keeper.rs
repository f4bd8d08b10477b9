use chrono::{DateTime, Days, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use collector_core::cluster::{ModuleRegistration, NamingListener};
use collector_core::storage::HistoryDao;

use crate::storage_metrics::{
    RETENTION_DELETED_TOTAL, RETENTION_ELECTION_STATE, RETENTION_FAILURES_TOTAL,
};

/// Retention horizon used when none is configured.
pub const DEFAULT_TTL_DAYS: u32 = 3;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// False when another instance is elected and this tick was skipped.
    pub elected: bool,
    pub end_millis: i64,
    pub deleted: u64,
    pub swept_tables: usize,
    pub failed_tables: Vec<String>,
}

/// Last millisecond of the day `ttl_days` before `now` (UTC). Everything up
/// to and including it is past the retention horizon.
pub fn retention_end_millis(now: DateTime<Utc>, ttl_days: u32) -> i64 {
    let ttl_days = if ttl_days == 0 { DEFAULT_TTL_DAYS } else { ttl_days };
    let first_kept_day = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(ttl_days) - 1))
        .unwrap_or(chrono::NaiveDate::MIN);
    first_kept_day
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp_millis() - 1)
        .unwrap_or(i64::MIN)
}

/// Deletes rows past the retention horizon from every table, on the elected
/// instance only.
///
/// Deletes are idempotent, so a brief overlap while the membership view
/// converges only repeats work. A failing table is logged and the sweep moves
/// on to the next one.
pub struct DataTtlKeeper {
    targets: Vec<Arc<dyn HistoryDao>>,
    naming: Arc<NamingListener>,
    registration: ModuleRegistration,
    ttl_days: u32,
}

impl DataTtlKeeper {
    pub fn new(
        targets: Vec<Arc<dyn HistoryDao>>,
        naming: Arc<NamingListener>,
        registration: ModuleRegistration,
        ttl_days: u32,
    ) -> Self {
        Self {
            targets,
            naming,
            registration,
            ttl_days: if ttl_days == 0 { DEFAULT_TTL_DAYS } else { ttl_days },
        }
    }

    pub fn ttl_days(&self) -> u32 {
        self.ttl_days
    }

    pub async fn run_once(&self) -> SweepReport {
        self.run_once_at(Utc::now()).await
    }

    pub async fn run_once_at(&self, now: DateTime<Utc>) -> SweepReport {
        let end_millis = retention_end_millis(now, self.ttl_days);
        let mut report = SweepReport {
            end_millis,
            ..SweepReport::default()
        };

        if !self.naming.is_elected(&self.registration) {
            gauge!(RETENTION_ELECTION_STATE.name).set(0.0);
            debug!(
                instance_id = %self.registration.instance_id,
                "not the elected instance, skipping retention sweep"
            );
            return report;
        }
        gauge!(RETENTION_ELECTION_STATE.name).set(1.0);
        report.elected = true;

        for target in &self.targets {
            match target.delete_history(0, end_millis).await {
                Ok(deleted) => {
                    report.deleted += deleted;
                    report.swept_tables += 1;
                    if deleted > 0 {
                        counter!(RETENTION_DELETED_TOTAL.name, "table" => target.table().to_owned())
                            .increment(deleted);
                    }
                }
                Err(e) => {
                    counter!(RETENTION_FAILURES_TOTAL.name).increment(1);
                    warn!(table = %target.table(), error = %e, "retention delete failed");
                    report.failed_tables.push(target.table().to_owned());
                }
            }
        }

        info!(
            end_millis,
            deleted = report.deleted,
            tables = report.swept_tables,
            failed = report.failed_tables.len(),
            "retention sweep completed"
        );
        report
    }

    /// Spawns the sweep loop. The first sweep runs one interval after start.
    pub fn start(self: Arc<Self>, check_interval: Duration) -> JoinHandle<()> {
        info!(
            ttl_days = self.ttl_days,
            tables = self.targets.len(),
            interval_secs = check_interval.as_secs(),
            "retention sweeper started"
        );
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + check_interval, check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}

impl std::fmt::Debug for DataTtlKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTtlKeeper")
            .field("tables", &self.targets.len())
            .field("instance_id", &self.registration.instance_id)
            .field("ttl_days", &self.ttl_days)
            .finish()
    }
}
