use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

use collector_core::storage::{
    BatchOutcome, Document, FailedOperation, PreparedOperation, StorageClient, TableNamespace,
};
use collector_core::Result;

use super::{column_in_range, merge_columns};

/// Process-local backend. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    namespace: TableNamespace,
    tables: DashMap<String, BTreeMap<String, Document>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of a logical table, for inspection.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .get(&self.namespace.qualify(table))
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    pub fn is_installed(&self, table: &str) -> bool {
        self.tables.contains_key(&self.namespace.qualify(table))
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn namespace(&self) -> &TableNamespace {
        &self.namespace
    }

    async fn install(&self, table: &str) -> Result<()> {
        self.tables
            .entry(self.namespace.qualify(table))
            .or_default();
        Ok(())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .tables
            .get(&self.namespace.qualify(table))
            .and_then(|rows| rows.get(id).cloned()))
    }

    async fn delete_range(&self, table: &str, column: &str, start: i64, end: i64) -> Result<u64> {
        let Some(mut rows) = self.tables.get_mut(&self.namespace.qualify(table)) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, document| !column_in_range(document, column, start, end));
        Ok((before - rows.len()) as u64)
    }

    async fn execute_batch(&self, operations: Vec<PreparedOperation>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for operation in operations {
            let mut rows = self
                .tables
                .entry(self.namespace.qualify(operation.table()))
                .or_default();
            let rejected = match operation {
                PreparedOperation::Insert { table, id, document } => {
                    if rows.contains_key(&id) {
                        Some((table, id, "row already exists"))
                    } else {
                        rows.insert(id, document);
                        None
                    }
                }
                PreparedOperation::Update { table, id, document } => match rows.get_mut(&id) {
                    Some(existing) => {
                        merge_columns(existing, document);
                        None
                    }
                    None => Some((table, id, "row does not exist")),
                },
            };
            match rejected {
                Some((table, id, reason)) => outcome.failed.push(FailedOperation {
                    table,
                    id,
                    reason: reason.to_owned(),
                }),
                None => outcome.applied += 1,
            }
        }
        Ok(outcome)
    }
}
