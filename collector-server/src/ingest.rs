use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use collector_core::module::{ModuleManager, STORAGE_MODULE};
use collector_core::storage::TimePyramid;
use collector_core::stream_data::StreamData;
use collector_core::time_bucket::Granularity;
use collector_storage::table::{
    ApplicationAlarmList, CpuMetric, InstanceHeartBeat, InstanceMapping,
    InstanceReferenceAlarmList, ServiceReferenceAlarmList,
};
use collector_storage::RecordSink;

/// One observed record, tagged with its entity and, for time-bucketed
/// entities kept at several granularities, the table level it belongs to.
#[derive(Debug, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub(crate) enum StreamRecord {
    ApplicationAlarmList {
        granularity: Granularity,
        record: ApplicationAlarmList,
    },
    InstanceReferenceAlarmList {
        record: InstanceReferenceAlarmList,
    },
    ServiceReferenceAlarmList {
        record: ServiceReferenceAlarmList,
    },
    InstanceMapping {
        granularity: Granularity,
        record: InstanceMapping,
    },
    CpuMetric {
        granularity: Granularity,
        record: CpuMetric,
    },
    InstanceHeartBeat {
        record: InstanceHeartBeat,
    },
}

/// Routes records to the persistence workers registered by the storage
/// module.
#[derive(Debug, Clone)]
pub(crate) struct StreamIngestor {
    manager: Arc<ModuleManager>,
}

impl StreamIngestor {
    pub(crate) fn new(manager: Arc<ModuleManager>) -> Self {
        Self { manager }
    }

    /// Stages a record of a single-table entity.
    pub(crate) fn ingest<T: StreamData>(&self, record: T) -> Result<()> {
        let sink = self
            .manager
            .service::<dyn RecordSink<T>>(STORAGE_MODULE)?;
        sink.ingest(record)?;
        Ok(())
    }

    /// Stages a record into the table of one granularity.
    pub(crate) fn ingest_at<T: StreamData>(
        &self,
        granularity: Granularity,
        record: T,
    ) -> Result<()> {
        let sinks = self
            .manager
            .service::<TimePyramid<dyn RecordSink<T>>>(STORAGE_MODULE)?;
        sinks.level(granularity)?.ingest(record)?;
        Ok(())
    }

    pub(crate) fn dispatch(&self, record: StreamRecord) -> Result<()> {
        match record {
            StreamRecord::ApplicationAlarmList { granularity, record } => {
                self.ingest_at(granularity, record)
            }
            StreamRecord::InstanceReferenceAlarmList { record } => self.ingest(record),
            StreamRecord::ServiceReferenceAlarmList { record } => self.ingest(record),
            StreamRecord::InstanceMapping { granularity, record } => {
                self.ingest_at(granularity, record)
            }
            StreamRecord::CpuMetric { granularity, record } => self.ingest_at(granularity, record),
            StreamRecord::InstanceHeartBeat { record } => self.ingest(record),
        }
    }

    /// Ingests newline-delimited JSON records. Malformed or rejected lines
    /// are logged and skipped. Returns the number of records staged.
    pub(crate) async fn replay(&self, path: &Path) -> Result<usize> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open replay file {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();

        let mut line_no = 0usize;
        let mut staged = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let outcome = serde_json::from_str::<StreamRecord>(&line)
                .map_err(anyhow::Error::from)
                .and_then(|record| self.dispatch(record));
            match outcome {
                Ok(()) => staged += 1,
                Err(e) => warn!(line = line_no, error = %e, "skipping replayed record"),
            }
        }
        info!(path = %path.display(), staged, "replay finished");
        Ok(staged)
    }
}
