use collector_core::stream_data;
use collector_core::time_bucket::Granularity;

pub const INSTANCE_MAPPING: &str = "instance_mapping";
pub const INSTANCE: &str = "instance";

pub const INSTANCE_MAPPING_LEVELS: [Granularity; 4] = [
    Granularity::Minute,
    Granularity::Hour,
    Granularity::Day,
    Granularity::Month,
];

/// Columns written when a heartbeat refreshes an instance row.
pub const HEARTBEAT_UPDATE_COLUMNS: &[&str] = &["heart_beat_time"];

stream_data! {
    /// Network address an instance was seen at during one time bucket.
    pub struct InstanceMapping {
        entity = "instance_mapping",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            metric_id: String => NonMerge,
            time_bucket: i64 => NonMerge,
            application_id: i32 => NonMerge,
            instance_id: i32 => NonMerge,
            address_id: i32 => NonMerge,
        }
    }
}

stream_data! {
    /// Liveness of a registered instance. The row itself is created when the
    /// instance registers; heartbeats only move `heart_beat_time` forward.
    pub struct InstanceHeartBeat {
        entity = "instance_heart_beat",
        time_bucket = heart_beat_time,
        columns {
            id: String => NonMerge,
            instance_id: i32 => NonMerge,
            heart_beat_time: i64 => CoverMerge,
        }
    }
}
