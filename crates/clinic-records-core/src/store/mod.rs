//! Document store layer.
//!
//! Records are schemaless JSON objects grouped into named collections. The
//! store assigns identifiers and knows nothing about relationships between
//! collections; referential rules live in [`crate::repository`].

mod memory;
mod schema;
mod sqlite;

pub use memory::*;
pub use schema::*;
pub use sqlite::*;

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Collection holding patient documents.
pub const PATIENTS_COLLECTION: &str = "patients";
/// Collection holding visit note documents.
pub const VISIT_NOTES_COLLECTION: &str = "visitNotes";

/// Field map of a stored document (the id is kept outside the body).
pub type Fields = Map<String, Value>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document: identifier plus field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Sort direction for [`DocumentStore::list_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Black-box document persistence.
///
/// Implementations must be safe to share across threads; repositories hold
/// only a shared reference.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document, returning its assigned identifier.
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    /// Fetch a document by identifier.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// List every document in a collection ordered by one field.
    /// Documents missing the field sort as the smallest value.
    fn list_all(
        &self,
        collection: &str,
        order_field: &str,
        direction: SortDirection,
    ) -> StoreResult<Vec<Document>>;

    /// List documents whose `field` equals `value`. No ordering guarantee.
    fn list_where(&self, collection: &str, field: &str, value: &Value)
        -> StoreResult<Vec<Document>>;

    /// Shallow-merge `fields` into an existing document. A `null` value
    /// removes the field. Fails with [`StoreError::NotFound`] if absent.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Remove a document. Returns `false` if it was already absent.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;
}

/// Encode a timestamp in the store's native form.
///
/// Fixed-width RFC 3339 in UTC, so lexical order matches time order.
pub fn encode_timestamp(instant: DateTime<Utc>) -> Value {
    Value::String(instant.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Decode a stored timestamp. An absent or `null` field falls back to
/// `default` instead of erroring.
///
/// Only the string form from [`encode_timestamp`] is accepted; any other
/// type would not sort consistently against it in both backends.
pub fn decode_timestamp(
    value: Option<&Value>,
    default: DateTime<Utc>,
) -> StoreResult<DateTime<Utc>> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Malformed(format!("bad timestamp {:?}: {}", s, e))),
        Some(other) => Err(StoreError::Malformed(format!("bad timestamp {}", other))),
    }
}

/// Order two optional field values. Missing sorts first.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Field names are interpolated into JSON paths, so keep them to plain identifiers.
pub(crate) fn check_field_name(field: &str) -> StoreResult<()> {
    let ok = !field.is_empty()
        && field
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::Malformed(format!("invalid field name {:?}", field)))
    }
}
