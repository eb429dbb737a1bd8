//! Core domain types: records flowing through the pipeline and run identifiers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{EnricherError, Result};

/// Standard column names of a company record.
pub mod columns {
    pub const COMPANY_ID: &str = "company_id";
    pub const COMPANY_NAME: &str = "company_name";
    pub const DOMAIN: &str = "domain";
    pub const COUNTRY: &str = "country";
    pub const ADDRESS: &str = "address";
    pub const DESCRIPTION: &str = "description";

    pub const FORMATTED_COMPANY_NAME: &str = "formatted_company_name";
    pub const FORMATTED_ADDRESS: &str = "formatted_address";
    pub const DETERMINED_COMPANY_TYPE: &str = "determined_company_type1";
    pub const ENRICHED_DESCRIPTION: &str = "enriched_description";

    /// Fields the structured enrichment stage is allowed to write.
    pub const DERIVED: [&str; 4] = [
        FORMATTED_COMPANY_NAME,
        FORMATTED_ADDRESS,
        DETERMINED_COMPANY_TYPE,
        ENRICHED_DESCRIPTION,
    ];
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RecordKey
// ---------------------------------------------------------------------------

/// Identity key correlating a record across selection, retrieval, enrichment and load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub String);

impl RecordKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One entity row as a mapping of named fields.
///
/// Columns the pipeline does not know about are carried through untouched so
/// they reach the destination table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of a field, if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Non-blank text value of a field; `None` when absent, null or whitespace.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get_str(field).filter(|s| !s.trim().is_empty())
    }

    /// Whether a field is absent, null, or a whitespace-only string.
    pub fn is_blank(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    /// Extract the identity key from `id_column`.
    ///
    /// Numeric ids are accepted and rendered in decimal.
    pub fn key(&self, id_column: &str) -> Result<RecordKey> {
        match self.0.get(id_column) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(RecordKey(s.clone())),
            Some(Value::Number(n)) => Ok(RecordKey(n.to_string())),
            _ => Err(EnricherError::validation(format!(
                "record has no usable identity key in column `{id_column}`"
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
