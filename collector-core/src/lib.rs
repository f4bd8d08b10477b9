//! Core of the APM collector's storage layer.
//!
//! Holds the stream entity model and its merge algebra, the backend-agnostic
//! storage contract, the module registry that wires providers together, and
//! cluster naming used to elect the instance that runs maintenance.

pub mod cluster;
pub mod merge;
pub mod metadata;
pub mod module;
pub mod storage;
pub mod stream_data;
pub mod time_bucket;

mod errors;
pub use errors::{CollectorError, Result};

#[cfg(test)]
mod time_bucket_test;
