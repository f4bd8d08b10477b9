//! Backend-agnostic storage contract.
//!
//! Entity handlers never perform I/O when preparing a write: they turn a
//! record into a [`PreparedOperation`], and the batch pipeline hands many of
//! them to [`StorageClient::execute_batch`] in one flush. Backends differ only
//! in how they execute operations, so merge and aggregation logic runs
//! unmodified against any of them.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::errors::{CollectorError, Result};
use crate::stream_data::StreamData;
use crate::time_bucket::Granularity;

/// A record encoded as named columns.
pub type Document = Map<String, Value>;

/// A write built by an entity handler, not yet executed.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedOperation {
    /// Creates the row. Fails on the backend if the row exists.
    Insert {
        table: String,
        id: String,
        document: Document,
    },
    /// Overwrites the given columns of an existing row.
    Update {
        table: String,
        id: String,
        document: Document,
    },
}

impl PreparedOperation {
    pub fn table(&self) -> &str {
        match self {
            PreparedOperation::Insert { table, .. } | PreparedOperation::Update { table, .. } => {
                table
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PreparedOperation::Insert { id, .. } | PreparedOperation::Update { id, .. } => id,
        }
    }

    pub fn document(&self) -> &Document {
        match self {
            PreparedOperation::Insert { document, .. }
            | PreparedOperation::Update { document, .. } => document,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PreparedOperation::Insert { .. } => "insert",
            PreparedOperation::Update { .. } => "update",
        }
    }
}

impl fmt::Display for PreparedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind(), self.table(), self.id())
    }
}

/// One operation a backend rejected while the rest of the batch went through.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub table: String,
    pub id: String,
    pub reason: String,
}

/// Result of one flush. Backends with all-or-nothing semantics either apply
/// everything or return an error; best-effort backends report rejects here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub failed: Vec<FailedOperation>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Optional table-name prefix, fixed once when the storage module starts.
#[derive(Debug, Default)]
pub struct TableNamespace {
    prefix: OnceLock<String>,
}

impl TableNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace. A second call with a different value is rejected.
    pub fn set(&self, namespace: &str) -> Result<()> {
        let current = self.prefix.get_or_init(|| namespace.to_owned());
        if current != namespace {
            return Err(CollectorError::ConfigurationConflict(format!(
                "table namespace already set to {:?}, refusing {:?}",
                current, namespace
            )));
        }
        Ok(())
    }

    pub fn get(&self) -> Option<&str> {
        self.prefix.get().map(String::as_str).filter(|ns| !ns.is_empty())
    }

    /// Physical name of a logical table: `<namespace>_<table>` or `table`.
    pub fn qualify(&self, table: &str) -> String {
        match self.get() {
            Some(ns) => format!("{}_{}", ns, table),
            None => table.to_owned(),
        }
    }
}

/// Process-level connection to a storage backend, shared by every handler.
#[async_trait]
pub trait StorageClient: Send + Sync + fmt::Debug {
    /// Short backend name used in logs and metrics labels.
    fn backend(&self) -> &'static str;

    fn namespace(&self) -> &TableNamespace;

    /// Creates the table if it does not exist yet.
    async fn install(&self, table: &str) -> Result<()>;

    async fn get(&self, table: &str, id: &str) -> Result<Option<Document>>;

    /// Deletes rows whose integer `column` lies in `[start, end]`.
    /// Returns the number of deleted rows.
    async fn delete_range(&self, table: &str, column: &str, start: i64, end: i64) -> Result<u64>;

    async fn execute_batch(&self, operations: Vec<PreparedOperation>) -> Result<BatchOutcome>;

    /// Like [`StorageClient::execute_batch`], but nothing is applied once
    /// `deadline` has passed. Backends whose writes keep running after the
    /// caller's future is dropped must check the deadline before committing.
    async fn execute_batch_until(
        &self,
        operations: Vec<PreparedOperation>,
        deadline: Instant,
    ) -> Result<BatchOutcome> {
        let _ = deadline;
        self.execute_batch(operations).await
    }
}

/// Retention side of an entity handler.
#[async_trait]
pub trait HistoryDao: Send + Sync {
    fn table(&self) -> &str;

    /// Deletes every row whose time bucket falls inside the inclusive
    /// millisecond range. Calling it twice with the same range is a no-op the
    /// second time. Entities without retention return `Ok(0)`.
    async fn delete_history(&self, start_millis: i64, end_millis: i64) -> Result<u64>;
}

/// Per-entity persistence handler.
#[async_trait]
pub trait PersistenceDao<T: StreamData>: HistoryDao {
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Builds an insert for a record not yet persisted. Entities that can
    /// only be created by their registration path fail with
    /// [`CollectorError::InvariantViolation`].
    fn prepare_batch_insert(&self, record: &T) -> Result<PreparedOperation>;

    fn prepare_batch_update(&self, record: &T) -> Result<PreparedOperation>;
}

/// Executes prepared operations as one flush.
#[async_trait]
pub trait BatchDao: Send + Sync {
    async fn batch_persistence(&self, operations: Vec<PreparedOperation>) -> Result<BatchOutcome>;

    /// Flushes under a deadline; see [`StorageClient::execute_batch_until`].
    async fn batch_persistence_until(
        &self,
        operations: Vec<PreparedOperation>,
        deadline: Instant,
    ) -> Result<BatchOutcome> {
        let _ = deadline;
        self.batch_persistence(operations).await
    }
}

/// One service implementation per granularity table of the same entity.
///
/// Registered as a single service so the same entity can live in several
/// tables without two registrations competing for one interface.
pub struct TimePyramid<S: ?Sized> {
    levels: BTreeMap<Granularity, Arc<S>>,
}

impl<S: ?Sized> TimePyramid<S> {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn with(mut self, granularity: Granularity, service: Arc<S>) -> Self {
        self.levels.insert(granularity, service);
        self
    }

    pub fn get(&self, granularity: Granularity) -> Option<&Arc<S>> {
        self.levels.get(&granularity)
    }

    /// Like [`TimePyramid::get`], failing with `ServiceNotProvided`.
    pub fn level(&self, granularity: Granularity) -> Result<Arc<S>> {
        self.levels
            .get(&granularity)
            .cloned()
            .ok_or_else(|| CollectorError::ServiceNotProvided {
                module: crate::module::STORAGE_MODULE.to_owned(),
                service: format!("{} {}", granularity, std::any::type_name::<S>()),
            })
    }

    pub fn granularities(&self) -> impl Iterator<Item = Granularity> + '_ {
        self.levels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Granularity, &Arc<S>)> + '_ {
        self.levels.iter().map(|(g, s)| (*g, s))
    }
}

impl<S: ?Sized> Default for TimePyramid<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> fmt::Debug for TimePyramid<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimePyramid")
            .field("levels", &self.levels.keys().collect::<Vec<_>>())
            .finish()
    }
}
