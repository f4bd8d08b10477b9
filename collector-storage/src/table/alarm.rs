use collector_core::stream_data;
use collector_core::time_bucket::Granularity;

pub const APPLICATION_ALARM_LIST: &str = "application_alarm_list";
pub const INSTANCE_REFERENCE_ALARM_LIST: &str = "instance_reference_alarm_list";
pub const SERVICE_REFERENCE_ALARM_LIST: &str = "service_reference_alarm_list";

/// Granularities the application alarm list is kept at.
pub const APPLICATION_ALARM_LEVELS: [Granularity; 4] = [
    Granularity::Minute,
    Granularity::Hour,
    Granularity::Day,
    Granularity::Month,
];

stream_data! {
    /// Alarm raised on one application within one time bucket.
    pub struct ApplicationAlarmList {
        entity = "application_alarm_list",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            alarm_content: String => CoverMerge,
            time_bucket: i64 => NonMerge,
            alarm_type: i32 => NonMerge,
            source_value: i32 => NonMerge,
            application_id: i32 => NonMerge,
        }
    }
}

stream_data! {
    /// Alarm raised on a call between two instances.
    pub struct InstanceReferenceAlarmList {
        entity = "instance_reference_alarm_list",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            alarm_content: String => CoverMerge,
            time_bucket: i64 => NonMerge,
            alarm_type: i32 => NonMerge,
            source_value: i32 => NonMerge,
            front_application_id: i32 => NonMerge,
            behind_application_id: i32 => NonMerge,
            front_instance_id: i32 => NonMerge,
            behind_instance_id: i32 => NonMerge,
        }
    }
}

stream_data! {
    /// Alarm raised on a call between two services.
    pub struct ServiceReferenceAlarmList {
        entity = "service_reference_alarm_list",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            alarm_content: String => CoverMerge,
            time_bucket: i64 => NonMerge,
            alarm_type: i32 => NonMerge,
            source_value: i32 => NonMerge,
            front_application_id: i32 => NonMerge,
            behind_application_id: i32 => NonMerge,
            front_instance_id: i32 => NonMerge,
            behind_instance_id: i32 => NonMerge,
            front_service_id: i32 => NonMerge,
            behind_service_id: i32 => NonMerge,
        }
    }
}
