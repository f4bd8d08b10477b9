pub struct Metric {
    pub name: &'static str,
    description: &'static str,
}

pub const COUNTERS: [Metric; 6] = [
    RECORDS_MERGED_TOTAL,
    PREPARED_OPERATIONS_TOTAL,
    BATCH_FLUSH_TOTAL,
    BATCH_FLUSH_FAILURES_TOTAL,
    RETENTION_DELETED_TOTAL,
    RETENTION_FAILURES_TOTAL,
];
pub const GAUGES: [Metric; 1] = [RETENTION_ELECTION_STATE];
pub const HISTOGRAMS: [Metric; 1] = [BATCH_FLUSH_DURATION_SECONDS];

// PERSISTENCE Metrics --------------------------

pub const RECORDS_MERGED_TOTAL: Metric = Metric {
    name: "apm_collector_records_merged_total",
    description: "Observations folded into an already staged record of the same id",
};

pub const PREPARED_OPERATIONS_TOTAL: Metric = Metric {
    name: "apm_collector_prepared_operations_total",
    description: "Insert and update operations handed to the batch pipeline",
};

pub const BATCH_FLUSH_TOTAL: Metric = Metric {
    name: "apm_collector_batch_flush_total",
    description: "Batch flushes submitted to the storage backend",
};

pub const BATCH_FLUSH_FAILURES_TOTAL: Metric = Metric {
    name: "apm_collector_batch_flush_failures_total",
    description: "Batch flushes or single batched operations rejected by the backend",
};

pub const BATCH_FLUSH_DURATION_SECONDS: Metric = Metric {
    name: "apm_collector_batch_flush_duration_seconds",
    description: "Duration of one batch flush in seconds",
};

// RETENTION Metrics --------------------------

pub const RETENTION_DELETED_TOTAL: Metric = Metric {
    name: "apm_collector_retention_deleted_total",
    description: "Rows removed by the retention sweeper",
};

pub const RETENTION_FAILURES_TOTAL: Metric = Metric {
    name: "apm_collector_retention_failures_total",
    description: "Tables whose retention delete failed during a sweep",
};

pub const RETENTION_ELECTION_STATE: Metric = Metric {
    name: "apm_collector_retention_election_state",
    description: "Whether this instance runs the retention sweep (0=standby,1=elected)",
};

/// Describes every storage metric on the installed recorder.
pub fn describe_metrics() {
    for metric in COUNTERS {
        metrics::describe_counter!(metric.name, metric.description);
        let _counter = metrics::counter!(metric.name);
    }

    for metric in GAUGES {
        metrics::describe_gauge!(metric.name, metric.description);
        let _gauge = metrics::gauge!(metric.name);
    }

    for metric in HISTOGRAMS {
        metrics::describe_histogram!(metric.name, metric.description);
        let _histogram = metrics::histogram!(metric.name);
    }
}
