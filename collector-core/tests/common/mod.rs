#![allow(dead_code)]

use collector_core::stream_data;
use proptest::prelude::*;

stream_data! {
    /// Aggregated observation used by the property tests.
    pub struct Sample {
        entity = "sample",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            time_bucket: i64 => NonMerge,
            label: String => CoverMerge,
            count: i64 => Add,
            peak: f64 => Max,
            floor: i32 => Min,
        }
    }
}

stream_data! {
    /// Same shape without additive columns, so merging is idempotent.
    pub struct Gauge {
        entity = "gauge",
        time_bucket = time_bucket,
        columns {
            id: String => NonMerge,
            time_bucket: i64 => NonMerge,
            label: String => CoverMerge,
            payload: Vec<u8> => CoverMerge,
            peak: f64 => Max,
            floor: i32 => Min,
        }
    }
}

/// Samples sharing one id and time bucket, as duplicate deliveries do.
pub fn sample_strategy() -> impl Strategy<Value = Sample> {
    (
        "[a-z]{1,12}",
        prop_oneof![
            any::<i64>(),
            Just(i64::MAX),
            Just(i64::MIN),
            -2i64..2,
        ],
        -1.0e6f64..1.0e6,
        any::<i32>(),
    )
        .prop_map(|(label, count, peak, floor)| Sample {
            id: "app-1_2024010110".into(),
            time_bucket: 2024010110,
            label,
            count,
            peak,
            floor,
        })
}

pub fn gauge_strategy() -> impl Strategy<Value = Gauge> {
    (
        "[a-z0-9]{1,12}",
        20240101i64..20240131,
        "[a-z]{0,12}",
        prop::collection::vec(any::<u8>(), 0..16),
        -1.0e6f64..1.0e6,
        any::<i32>(),
    )
        .prop_map(|(id, time_bucket, label, payload, peak, floor)| Gauge {
            id,
            time_bucket,
            label,
            payload,
            peak,
            floor,
        })
}
