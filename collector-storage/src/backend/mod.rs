//! Storage client implementations.

use serde_json::Value;

use collector_core::storage::Document;

mod memory;
pub use memory::MemoryStorageClient;

mod redb;
pub use self::redb::RedbStorageClient;

#[cfg(test)]
mod memory_test;

/// Overwrites the columns present in `update`, keeping the others.
pub(crate) fn merge_columns(row: &mut Document, update: Document) {
    for (column, value) in update {
        row.insert(column, value);
    }
}

pub(crate) fn column_in_range(row: &Document, column: &str, start: i64, end: i64) -> bool {
    row.get(column)
        .and_then(Value::as_i64)
        .is_some_and(|bucket| (start..=end).contains(&bucket))
}
