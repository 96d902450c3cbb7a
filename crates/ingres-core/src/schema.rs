//! Lightweight schema description inferred from a single sample document.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::record::ID_FIELD;

/// Placeholder used when the collection holds no documents.
pub const EMPTY_COLLECTION_SCHEMA: &str = "No documents in collection to infer schema from.";

/// Placeholder used when the store could not be read.
pub const SCHEMA_UNAVAILABLE: &str = "Could not retrieve schema information.";

/// Field name to inferred type name, or a placeholder explaining why no
/// fields could be inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDescription {
    Fields(BTreeMap<String, String>),
    Unavailable(String),
}

impl SchemaDescription {
    /// Infer a description from one document's fields. The identifier field
    /// is never part of the result.
    pub fn from_sample(sample: &Map<String, Value>) -> Self {
        let fields = sample
            .iter()
            .filter(|(name, _)| name.as_str() != ID_FIELD)
            .map(|(name, value)| (name.clone(), type_name(value).to_string()))
            .collect();
        SchemaDescription::Fields(fields)
    }

    pub fn empty_collection() -> Self {
        SchemaDescription::Unavailable(EMPTY_COLLECTION_SCHEMA.to_string())
    }

    pub fn unavailable() -> Self {
        SchemaDescription::Unavailable(SCHEMA_UNAVAILABLE.to_string())
    }

    /// Number of described fields (zero for placeholders).
    pub fn field_count(&self) -> usize {
        match self {
            SchemaDescription::Fields(fields) => fields.len(),
            SchemaDescription::Unavailable(_) => 0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SchemaDescription::Fields(_))
    }

    /// Text embedded verbatim into the query-translation prompt.
    pub fn to_prompt_text(&self) -> String {
        match self {
            SchemaDescription::Fields(fields) => {
                serde_json::to_string_pretty(fields).unwrap_or_else(|_| format!("{:?}", fields))
            }
            SchemaDescription::Unavailable(placeholder) => placeholder.clone(),
        }
    }
}

/// Runtime type name of a JSON value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
