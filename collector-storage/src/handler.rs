use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

use collector_core::storage::{
    Document, HistoryDao, PersistenceDao, PreparedOperation, StorageClient,
};
use collector_core::stream_data::StreamData;
use collector_core::time_bucket::Granularity;
use collector_core::{CollectorError, Result};

/// Column and granularity used to retire old rows of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub column: &'static str,
    pub granularity: Granularity,
}

/// Static description of how one entity is stored in one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: String,
    /// `None` disables retention: `delete_history` is a no-op.
    pub retention: Option<Retention>,
    /// Whether records may be created by the ingestion path.
    pub insertable: bool,
    /// Columns written by an update; `None` writes the whole record.
    pub update_columns: Option<&'static [&'static str]>,
}

impl EntityDescriptor {
    /// A table whose rows carry a `time_bucket` column of the given granularity.
    pub fn bucketed(table: impl Into<String>, granularity: Granularity) -> Self {
        Self {
            table: table.into(),
            retention: Some(Retention {
                column: "time_bucket",
                granularity,
            }),
            insertable: true,
            update_columns: None,
        }
    }

    /// A table updated in place and never swept.
    pub fn in_place(table: impl Into<String>, update_columns: &'static [&'static str]) -> Self {
        Self {
            table: table.into(),
            retention: None,
            insertable: false,
            update_columns: Some(update_columns),
        }
    }
}

/// Generic persistence handler: one per entity type and table, over any
/// [`StorageClient`].
pub struct PersistenceHandler<T> {
    client: Arc<dyn StorageClient>,
    descriptor: EntityDescriptor,
    _entity: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for PersistenceHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceHandler")
            .field("backend", &self.client.backend())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<T> PersistenceHandler<T>
where
    T: StreamData + Serialize + DeserializeOwned,
{
    pub fn new(client: Arc<dyn StorageClient>, descriptor: EntityDescriptor) -> Self {
        Self {
            client,
            descriptor,
            _entity: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    fn encode(&self, record: &T) -> Result<Document> {
        match serde_json::to_value(record)? {
            Value::Object(document) => Ok(document),
            other => Err(CollectorError::SchemaMismatch(format!(
                "{} encoded to a non-object value: {}",
                T::schema().entity,
                other
            ))),
        }
    }

    fn decode(&self, document: Document) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }
}

#[async_trait]
impl<T> HistoryDao for PersistenceHandler<T>
where
    T: StreamData + Serialize + DeserializeOwned,
{
    fn table(&self) -> &str {
        &self.descriptor.table
    }

    async fn delete_history(&self, start_millis: i64, end_millis: i64) -> Result<u64> {
        let Some(retention) = self.descriptor.retention else {
            trace!(table = %self.descriptor.table, "table has no retention, skipping delete");
            return Ok(0);
        };
        let range = retention.granularity.resolve_range(start_millis, end_millis);
        let Some((start, end)) = range else {
            debug!(
                table = %self.descriptor.table,
                start_millis,
                end_millis,
                "range covers no complete window, nothing to delete"
            );
            return Ok(0);
        };

        let deleted = self
            .client
            .delete_range(&self.descriptor.table, retention.column, start, end)
            .await?;
        debug!(table = %self.descriptor.table, start, end, deleted, "history deleted");
        Ok(deleted)
    }
}

#[async_trait]
impl<T> PersistenceDao<T> for PersistenceHandler<T>
where
    T: StreamData + Serialize + DeserializeOwned,
{
    async fn get(&self, id: &str) -> Result<Option<T>> {
        self.client
            .get(&self.descriptor.table, id)
            .await?
            .map(|document| self.decode(document))
            .transpose()
    }

    fn prepare_batch_insert(&self, record: &T) -> Result<PreparedOperation> {
        if !self.descriptor.insertable {
            return Err(CollectorError::InvariantViolation(format!(
                "{} rows are created by registration, refusing insert of {}",
                self.descriptor.table,
                record.id()
            )));
        }
        Ok(PreparedOperation::Insert {
            table: self.descriptor.table.clone(),
            id: record.id().to_owned(),
            document: self.encode(record)?,
        })
    }

    fn prepare_batch_update(&self, record: &T) -> Result<PreparedOperation> {
        let mut document = self.encode(record)?;
        if let Some(columns) = self.descriptor.update_columns {
            document.retain(|column, _| columns.contains(&column.as_str()));
        }
        Ok(PreparedOperation::Update {
            table: self.descriptor.table.clone(),
            id: record.id().to_owned(),
            document,
        })
    }
}
