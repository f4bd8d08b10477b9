//! Stream persistence for the APM collector.
//!
//! Records enter through a [`RecordSink`], are merged with pending and
//! persisted versions of the same id, and reach the backend in periodic batch
//! flushes. A retention sweeper on the elected instance retires old rows.

pub mod backend;
pub mod batch;
pub mod storage_metrics;
pub mod table;

mod handler;
pub use handler::{EntityDescriptor, PersistenceHandler, Retention};

mod worker;
pub use worker::{FlushSource, PersistenceWorker, RecordSink};

mod timer;
pub use timer::PersistenceTimer;

mod ttl_keeper;
pub use ttl_keeper::{retention_end_millis, DataTtlKeeper, SweepReport, DEFAULT_TTL_DAYS};

mod provider;
pub use provider::{StorageBackendKind, StorageModuleProvider, StorageRuntime, StorageSettings};

#[cfg(test)]
mod handler_test;
