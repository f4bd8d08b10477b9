//! Embedded single-file backend built on `redb`.
//!
//! Each logical table maps to one redb table keyed by record id, holding the
//! JSON-encoded document. A flush runs in one write transaction: operations
//! rejected on their own (duplicate insert, update of a missing row) are
//! reported in [`BatchOutcome::failed`] while the rest commit together, and a
//! backend error or a passed deadline rolls the whole transaction back.
//!
//! Writes run on the blocking pool and outlive a dropped caller, so every
//! write holds `write_gate` until it finishes and reads wait on it first.

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

use collector_core::storage::{
    BatchOutcome, Document, FailedOperation, PreparedOperation, StorageClient, TableNamespace,
};
use collector_core::{CollectorError, Result};

use super::{column_in_range, merge_columns};

fn definition(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn to_backend_err(e: impl std::fmt::Display, context: &str) -> CollectorError {
    CollectorError::BackendUnavailable(format!("redb {}: {}", context, e))
}

#[derive(Debug)]
pub struct RedbStorageClient {
    db: Arc<Database>,
    path: PathBuf,
    namespace: TableNamespace,
    write_gate: Arc<Mutex<()>>,
}

impl RedbStorageClient {
    /// Opens or creates the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| to_backend_err(e, "create data directory"))?;
        }
        let db = Database::create(&path).map_err(|e| to_backend_err(e, "open database"))?;
        info!(path = %path.display(), "redb storage opened");
        Ok(Self {
            db: Arc::new(db),
            path,
            namespace: TableNamespace::new(),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a blocking database closure off the async runtime.
    async fn blocking<R, F>(&self, context: &'static str, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
    {
        // Wait for writes whose callers may have given up on them.
        drop(self.write_gate.lock().await);
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| to_backend_err(e, context))?
    }

    /// Like [`Self::blocking`], holding the write gate until the closure
    /// returns even if this future is dropped first.
    async fn blocking_write<R, F>(&self, context: &'static str, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
    {
        let gate = self.write_gate.clone().lock_owned().await;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let result = f(&db);
            drop(gate);
            result
        })
        .await
        .map_err(|e| to_backend_err(e, context))?
    }

    async fn write_batch(
        &self,
        operations: Vec<PreparedOperation>,
        deadline: Option<Instant>,
    ) -> Result<BatchOutcome> {
        let operations: Vec<(String, PreparedOperation)> = operations
            .into_iter()
            .map(|op| (self.namespace.qualify(op.table()), op))
            .collect();
        self.blocking_write("execute batch", move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| to_backend_err(e, "begin write txn"))?;
            let mut outcome = BatchOutcome::default();
            for (name, operation) in operations {
                let mut table = write_txn
                    .open_table(definition(&name))
                    .map_err(|e| to_backend_err(e, "open table"))?;
                let existing = table
                    .get(operation.id())
                    .map_err(|e| to_backend_err(e, "read row"))?
                    .map(|value| value.value().to_vec());

                let (table_name, id, document) = match (operation, existing) {
                    (PreparedOperation::Insert { table, id, .. }, Some(_)) => {
                        outcome.failed.push(FailedOperation {
                            table,
                            id,
                            reason: "row already exists".to_owned(),
                        });
                        continue;
                    }
                    (PreparedOperation::Insert { table, id, document }, None) => {
                        (table, id, document)
                    }
                    (PreparedOperation::Update { table, id, .. }, None) => {
                        outcome.failed.push(FailedOperation {
                            table,
                            id,
                            reason: "row does not exist".to_owned(),
                        });
                        continue;
                    }
                    (PreparedOperation::Update { table, id, document }, Some(bytes)) => {
                        let mut current: Document = serde_json::from_slice(&bytes)?;
                        merge_columns(&mut current, document);
                        (table, id, current)
                    }
                };

                let bytes = serde_json::to_vec(&document)?;
                let context = format!("write row of {}", table_name);
                table
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(|e| to_backend_err(e, &context))?;
                outcome.applied += 1;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                // Dropping the transaction without commit rolls it back.
                drop(write_txn);
                return Err(CollectorError::BackendUnavailable(
                    "redb batch deadline passed, transaction rolled back".to_owned(),
                ));
            }
            write_txn
                .commit()
                .map_err(|e| to_backend_err(e, "commit batch"))?;
            Ok(outcome)
        })
        .await
    }
}

#[async_trait]
impl StorageClient for RedbStorageClient {
    fn backend(&self) -> &'static str {
        "redb"
    }

    fn namespace(&self) -> &TableNamespace {
        &self.namespace
    }

    async fn install(&self, table: &str) -> Result<()> {
        let name = self.namespace.qualify(table);
        self.blocking_write("install", move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| to_backend_err(e, "begin write txn"))?;
            {
                let _ = write_txn
                    .open_table(definition(&name))
                    .map_err(|e| to_backend_err(e, "create table"))?;
            }
            write_txn
                .commit()
                .map_err(|e| to_backend_err(e, "commit install"))
        })
        .await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Document>> {
        let name = self.namespace.qualify(table);
        let id = id.to_owned();
        self.blocking("get", move |db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| to_backend_err(e, "begin read txn"))?;
            let table = match read_txn.open_table(definition(&name)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(to_backend_err(e, "open table")),
            };
            match table.get(id.as_str()) {
                Ok(Some(value)) => Ok(Some(serde_json::from_slice(value.value())?)),
                Ok(None) => Ok(None),
                Err(e) => Err(to_backend_err(e, "read row")),
            }
        })
        .await
    }

    async fn delete_range(&self, table: &str, column: &str, start: i64, end: i64) -> Result<u64> {
        let name = self.namespace.qualify(table);
        let column = column.to_owned();
        self.blocking_write("delete range", move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| to_backend_err(e, "begin write txn"))?;
            let deleted = {
                let mut table = write_txn
                    .open_table(definition(&name))
                    .map_err(|e| to_backend_err(e, "open table"))?;

                let mut doomed = Vec::new();
                for item in table.iter().map_err(|e| to_backend_err(e, "scan table"))? {
                    let (key, value) = item.map_err(|e| to_backend_err(e, "scan row"))?;
                    let document: Document = serde_json::from_slice(value.value())?;
                    if column_in_range(&document, &column, start, end) {
                        doomed.push(key.value().to_owned());
                    }
                }
                for key in &doomed {
                    table
                        .remove(key.as_str())
                        .map_err(|e| to_backend_err(e, "remove row"))?;
                }
                doomed.len() as u64
            };
            write_txn
                .commit()
                .map_err(|e| to_backend_err(e, "commit delete"))?;
            Ok(deleted)
        })
        .await
    }

    async fn execute_batch(&self, operations: Vec<PreparedOperation>) -> Result<BatchOutcome> {
        self.write_batch(operations, None).await
    }

    async fn execute_batch_until(
        &self,
        operations: Vec<PreparedOperation>,
        deadline: Instant,
    ) -> Result<BatchOutcome> {
        self.write_batch(operations, Some(deadline)).await
    }
}
