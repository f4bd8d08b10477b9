use collector_core::stream_data;
use collector_core::time_bucket::Granularity;

pub const CPU_METRIC: &str = "cpu_metric";

pub const CPU_METRIC_LEVELS: [Granularity; 5] = Granularity::ALL;

stream_data! {
    /// CPU usage of one instance, summed over the bucket. Average usage is
    /// `usage_percent / times`.
    pub struct CpuMetric {
        entity = "cpu_metric",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            metric_id: String => NonMerge,
            time_bucket: i64 => NonMerge,
            instance_id: i32 => NonMerge,
            usage_percent: f64 => Add,
            times: i64 => Add,
        }
    }
}
