//! Stored documents and the records handed to callers.

use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

/// Field name under which a document's identifier is exposed.
pub const ID_FIELD: &str = "_id";

/// Opaque identifier assigned by the store to every document.
///
/// Deliberately not `Serialize`: the only way out of the store is through
/// its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphen-free hex, in the style of document-database object ids.
        write!(f, "{}", self.0.simple())
    }
}

/// A document as it comes out of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

impl StoredDocument {
    pub fn new(id: DocumentId, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    /// Convert into a transport-safe record with the identifier stringified.
    ///
    /// An `_id` column that arrived with the data itself is overwritten by
    /// the store identifier.
    pub fn into_record(self) -> ResultRecord {
        let mut fields = self.fields;
        fields.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        ResultRecord(fields)
    }
}

/// A retrieved record ready to be serialized into a prompt or a response.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct ResultRecord(Map<String, Value>);

impl ResultRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Identifier in its display form.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
