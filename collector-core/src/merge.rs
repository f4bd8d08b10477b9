//! Column-wise merge of two observations of the same record.

use tracing::debug;

use crate::errors::{CollectorError, Result};
use crate::stream_data::{Column, ColumnValue, MergeOperation, StreamData};

/// Applies each column's [`MergeOperation`] to fold an incoming observation
/// into an existing one.
///
/// `NonMerge` columns keep the existing value. In the default lenient mode a
/// diverging incoming value is discarded (first write wins); strict mode turns
/// the divergence into [`CollectorError::InvariantViolation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    strict: bool,
}

impl MergeEngine {
    pub const fn lenient() -> Self {
        Self { strict: false }
    }

    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns a new record, leaving both inputs untouched.
    pub fn merge<T: StreamData>(&self, existing: &T, incoming: &T) -> Result<T> {
        if existing.id() != incoming.id() {
            return Err(CollectorError::InvariantViolation(format!(
                "cannot merge {} records with different ids: {} and {}",
                T::schema().entity,
                existing.id(),
                incoming.id()
            )));
        }

        let schema = T::schema();
        let mut merged = existing.clone();
        for column in schema.columns {
            let old = read_column(existing, column)?;
            let new = read_column(incoming, column)?;
            let value = self.apply(schema.entity, existing.id(), column, old, new)?;
            merged.set_column(column.name, value)?;
        }
        Ok(merged)
    }

    /// Folds observations left to right. `None` for an empty input.
    pub fn fold<T: StreamData>(&self, records: impl IntoIterator<Item = T>) -> Result<Option<T>> {
        let mut acc: Option<T> = None;
        for record in records {
            acc = Some(match acc {
                None => record,
                Some(existing) => self.merge(&existing, &record)?,
            });
        }
        Ok(acc)
    }

    fn apply(
        &self,
        entity: &str,
        id: &str,
        column: &Column,
        old: ColumnValue,
        new: ColumnValue,
    ) -> Result<ColumnValue> {
        match column.operation {
            MergeOperation::NonMerge => {
                if old != new {
                    if self.strict {
                        return Err(CollectorError::InvariantViolation(format!(
                            "non-merge column {}.{} diverged for id {}: {:?} vs {:?}",
                            entity, column.name, id, old, new
                        )));
                    }
                    debug!(
                        entity = %entity,
                        column = %column.name,
                        id = %id,
                        "discarding diverging value of non-merge column"
                    );
                }
                Ok(old)
            }
            MergeOperation::CoverMerge => Ok(new),
            // Wrapping keeps the sum associative at the integer bounds.
            MergeOperation::Add => {
                numeric(entity, column, old, new, i64::wrapping_add, |a, b| a + b)
            }
            MergeOperation::Max => numeric(entity, column, old, new, i64::max, f64::max),
            MergeOperation::Min => numeric(entity, column, old, new, i64::min, f64::min),
        }
    }
}

fn read_column<T: StreamData>(record: &T, column: &Column) -> Result<ColumnValue> {
    let value = record.column(column.name).ok_or_else(|| {
        CollectorError::SchemaMismatch(format!(
            "entity {} does not expose column {}",
            T::schema().entity,
            column.name
        ))
    })?;
    if value.column_type() != column.column_type {
        return Err(crate::stream_data::column_type_mismatch(
            T::schema().entity,
            column.name,
            column.column_type,
            value.column_type(),
        ));
    }
    Ok(value)
}

fn numeric(
    entity: &str,
    column: &Column,
    old: ColumnValue,
    new: ColumnValue,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<ColumnValue> {
    match (old, new) {
        (ColumnValue::Long(a), ColumnValue::Long(b)) => Ok(ColumnValue::Long(int_op(a, b))),
        (ColumnValue::Integer(a), ColumnValue::Integer(b)) => {
            // Truncation wraps sums into range; max and min already fit.
            Ok(ColumnValue::Integer(int_op(a as i64, b as i64) as i32))
        }
        (ColumnValue::Double(a), ColumnValue::Double(b)) => {
            Ok(ColumnValue::Double(float_op(a, b)))
        }
        (old, _) => Err(CollectorError::SchemaMismatch(format!(
            "{:?} merge is not defined for {} column {}.{}",
            column.operation,
            old.column_type(),
            entity,
            column.name
        ))),
    }
}
