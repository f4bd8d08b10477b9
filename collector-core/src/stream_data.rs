//! Stream entity model.
//!
//! Every record written by the collector is a [`StreamData`]: a struct with
//! named fields, one per column, and a static [`EntitySchema`] that pairs each
//! column with its [`MergeOperation`]. Entities are declared with the
//! [`stream_data!`](crate::stream_data!) macro so the field list and the schema
//! can never drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CollectorError, Result};

/// Value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Long,
    Double,
    Integer,
    Byte,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Integer => "integer",
            ColumnType::Byte => "byte",
        };
        f.write_str(name)
    }
}

/// How two observations of the same column are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOperation {
    /// Keep the existing value. Used for dimension keys and type codes.
    NonMerge,
    /// The incoming value replaces the existing one.
    CoverMerge,
    /// Numeric sum of both values.
    Add,
    /// Numeric maximum of both values.
    Max,
    /// Numeric minimum of both values.
    Min,
}

/// A single column value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    String(String),
    Long(i64),
    Double(f64),
    Integer(i32),
    Byte(Vec<u8>),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::String(_) => ColumnType::String,
            ColumnValue::Long(_) => ColumnType::Long,
            ColumnValue::Double(_) => ColumnType::Double,
            ColumnValue::Integer(_) => ColumnType::Integer,
            ColumnValue::Byte(_) => ColumnType::Byte,
        }
    }
}

/// Column descriptor: name, value type and merge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub operation: MergeOperation,
}

impl Column {
    pub const fn new(
        name: &'static str,
        column_type: ColumnType,
        operation: MergeOperation,
    ) -> Self {
        Self {
            name,
            column_type,
            operation,
        }
    }
}

/// Static, ordered column layout of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    pub entity: &'static str,
    pub columns: &'static [Column],
}

impl EntitySchema {
    pub const fn new(entity: &'static str, columns: &'static [Column]) -> Self {
        Self { entity, columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns of one type group, in declaration order. May be empty.
    pub fn columns_of(&self, column_type: ColumnType) -> impl Iterator<Item = &Column> + '_ {
        self.columns
            .iter()
            .filter(move |c| c.column_type == column_type)
    }
}

/// A keyed observation persisted by the collector.
pub trait StreamData: Clone + fmt::Debug + Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;

    fn id(&self) -> &str;

    fn time_bucket(&self) -> i64;

    /// Reads a column by name. `None` if the entity has no such column.
    fn column(&self, name: &str) -> Option<ColumnValue>;

    /// Writes a column by name, failing on unknown columns or mistyped values.
    fn set_column(&mut self, name: &str, value: ColumnValue) -> Result<()>;
}

/// Maps a Rust field type onto its column type.
pub trait ColumnKind: Sized {
    const TYPE: ColumnType;

    fn to_value(&self) -> ColumnValue;

    fn from_value(value: ColumnValue) -> Option<Self>;
}

impl ColumnKind for String {
    const TYPE: ColumnType = ColumnType::String;

    fn to_value(&self) -> ColumnValue {
        ColumnValue::String(self.clone())
    }

    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl ColumnKind for i64 {
    const TYPE: ColumnType = ColumnType::Long;

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Long(*self)
    }

    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Long(v) => Some(v),
            _ => None,
        }
    }
}

impl ColumnKind for f64 {
    const TYPE: ColumnType = ColumnType::Double;

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Double(*self)
    }

    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl ColumnKind for i32 {
    const TYPE: ColumnType = ColumnType::Integer;

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Integer(*self)
    }

    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Integer(v) => Some(v),
            _ => None,
        }
    }
}

impl ColumnKind for Vec<u8> {
    const TYPE: ColumnType = ColumnType::Byte;

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Byte(self.clone())
    }

    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Byte(v) => Some(v),
            _ => None,
        }
    }
}

/// Error for a value whose type differs from the declared column type.
pub fn column_type_mismatch(
    entity: &str,
    column: &str,
    expected: ColumnType,
    found: ColumnType,
) -> CollectorError {
    CollectorError::SchemaMismatch(format!(
        "column {}.{} expects {} but got {}",
        entity, column, expected, found
    ))
}

/// Declares a stream entity: the struct, its schema and its column accessors.
///
/// The struct must declare an `id: String` column; `time_bucket` names the
/// column returned by [`StreamData::time_bucket`].
///
/// ```
/// use collector_core::stream_data;
///
/// stream_data! {
///     /// Latest state of one endpoint.
///     pub struct Endpoint {
///         entity = "endpoint",
///         time_bucket = time_bucket,
///         columns {
///             id: String => NonMerge,
///             name: String => CoverMerge,
///             time_bucket: i64 => NonMerge,
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! stream_data {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            entity = $entity:literal,
            time_bucket = $tb:ident,
            columns {
                $( $(#[$fmeta:meta])* $field:ident : $ty:ty => $op:ident ),* $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::stream_data::StreamData for $name {
            fn schema() -> &'static $crate::stream_data::EntitySchema {
                use $crate::stream_data::EntitySchema;
                static SCHEMA: EntitySchema = EntitySchema::new(
                    $entity,
                    &[
                        $(
                            $crate::stream_data::Column::new(
                                stringify!($field),
                                <$ty as $crate::stream_data::ColumnKind>::TYPE,
                                $crate::stream_data::MergeOperation::$op,
                            ),
                        )*
                    ],
                );
                &SCHEMA
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn time_bucket(&self) -> i64 {
                self.$tb as i64
            }

            fn column(&self, name: &str) -> Option<$crate::stream_data::ColumnValue> {
                $(
                    if name == stringify!($field) {
                        return Some($crate::stream_data::ColumnKind::to_value(&self.$field));
                    }
                )*
                None
            }

            fn set_column(
                &mut self,
                name: &str,
                value: $crate::stream_data::ColumnValue,
            ) -> $crate::Result<()> {
                let found = value.column_type();
                $(
                    if name == stringify!($field) {
                        self.$field = <$ty as $crate::stream_data::ColumnKind>::from_value(value)
                            .ok_or_else(|| {
                                $crate::stream_data::column_type_mismatch(
                                    $entity,
                                    name,
                                    <$ty as $crate::stream_data::ColumnKind>::TYPE,
                                    found,
                                )
                            })?;
                        return Ok(());
                    }
                )*
                Err($crate::CollectorError::SchemaMismatch(format!(
                    "entity {} has no column {}",
                    $entity, name
                )))
            }
        }
    };
}
