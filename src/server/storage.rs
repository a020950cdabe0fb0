//! Hierarchical document store abstraction.
//!
//! Documents are JSON objects addressed by alternating collection and
//! document segments:
//! ```text
//! users/{userId}
//! users/{userId}/months/{year-month}
//! users/{userId}/backups/{backupId}
//! shared_progress/{shareId}
//! ```

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

/// A stored document: always a JSON object at the top level.
pub type Document = Map<String, Value>;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path segment that could escape its collection or is empty.
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    /// Stored bytes that do not decode into the expected shape.
    #[error("malformed document {0}: {1}")]
    Malformed(String, #[source] serde_json::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("document must encode to a JSON object")]
    NotAnObject,
    /// The backend could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// How `set` combines the new document with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Recursively merge nested objects; see [`merge_into`].
    Merge,
    /// Replace the whole document.
    Overwrite,
}

/// Validates a segment to prevent path traversal.
pub fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains("..")
        || segment.starts_with('.')
    {
        return Err(StoreError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

/// Path to a collection: an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

/// Path to a document: an even number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn root(name: &str) -> Result<Self, StoreError> {
        validate_segment(name)?;
        Ok(Self {
            segments: vec![name.to_string()],
        })
    }

    pub fn doc(&self, id: &str) -> Result<DocPath, StoreError> {
        validate_segment(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(DocPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl DocPath {
    pub fn collection(&self, name: &str) -> Result<CollectionPath, StoreError> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(CollectionPath { segments })
    }

    /// Document id: the final segment.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this document sits directly inside `collection`.
    pub fn is_child_of(&self, collection: &CollectionPath) -> bool {
        self.segments.len() == collection.segments.len() + 1
            && self.segments.starts_with(&collection.segments)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// A hierarchical JSON document store.
///
/// Implementations must run the read-modify-write of a [`WriteMode::Merge`]
/// atomically per document, so concurrent merges touching disjoint keys
/// never lose each other's keys.
pub trait DocumentStore: Send + Sync + 'static {
    /// Loads a document, `Ok(None)` if it does not exist.
    fn get(
        &self,
        path: &DocPath,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Writes a document, creating it if needed.
    fn set(
        &self,
        path: &DocPath,
        document: Document,
        mode: WriteMode,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists `(id, document)` pairs directly inside a collection, ordered by id.
    fn list(
        &self,
        collection: &CollectionPath,
    ) -> impl Future<Output = Result<Vec<(String, Document)>, StoreError>> + Send;
}

/// Merges `patch` into `target`.
///
/// Nested objects merge recursively; any other value (scalar, array, null)
/// replaces what was there. Keys absent from `patch` are left untouched.
pub fn merge_into(target: &mut Document, patch: Document) {
    for (key, incoming) in patch {
        match incoming {
            Value::Object(incoming) => {
                if let Some(Value::Object(existing)) = target.get_mut(&key) {
                    merge_into(existing, incoming);
                } else {
                    target.insert(key, Value::Object(incoming));
                }
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Serializes a value into a top-level document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value).map_err(StoreError::Encode)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// Decodes a stored document into a typed value.
pub fn from_document<T: DeserializeOwned>(path: &DocPath, document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| StoreError::Malformed(path.to_string(), e))
}

/// Resolves a dotted field path such as `habitState.year`.
pub fn lookup_field<'a>(document: &'a Document, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over field values used for query ordering: values of
/// different types sort by type rank, same-typed values by content.
pub fn field_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| field_order(x, y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((kx, vx), (ky, vy))| kx.cmp(ky).then_with(|| field_order(vx, vy)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
