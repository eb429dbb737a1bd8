//! Table schemas, schema inference and value conversion between JSON records
//! and libSQL.

use enricher_shared::{Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::query::validate_identifier;

/// Column storage type as declared in `CREATE TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    /// Objects and arrays, stored as serialized JSON text.
    Json,
}

impl ColumnType {
    /// Infer a column type from one sample value. Nulls infer `TEXT`.
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null | JsonValue::String(_) => Self::Text,
            JsonValue::Bool(_) => Self::Boolean,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            JsonValue::Number(_) => Self::Real,
            JsonValue::Array(_) | JsonValue::Object(_) => Self::Json,
        }
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Boolean => "BOOLEAN",
            Self::Json => "JSON",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered column list of a warehouse table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Infer a table schema from one sample record, one column per field.
///
/// Every field name must be a valid identifier.
pub fn infer_schema(sample: &Record) -> Result<TableSchema> {
    let columns = sample
        .fields()
        .iter()
        .map(|(name, value)| {
            validate_identifier(name)?;
            Ok(Column {
                name: name.clone(),
                column_type: ColumnType::of(value),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableSchema { columns })
}

/// Convert a JSON field value into a libSQL bind value.
pub(crate) fn to_sql_value(value: &JsonValue) -> libsql::Value {
    match value {
        JsonValue::Null => libsql::Value::Null,
        JsonValue::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => libsql::Value::Integer(i),
            None => libsql::Value::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => libsql::Value::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => libsql::Value::Text(value.to_string()),
    }
}

/// Convert a libSQL result value back into a JSON field value.
///
/// Booleans come back as integers and JSON columns as text.
pub(crate) fn from_sql_value(value: libsql::Value) -> JsonValue {
    match value {
        libsql::Value::Null => JsonValue::Null,
        libsql::Value::Integer(i) => JsonValue::Number(i.into()),
        libsql::Value::Real(f) => Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        libsql::Value::Text(s) => JsonValue::String(s),
        libsql::Value::Blob(bytes) => {
            JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
