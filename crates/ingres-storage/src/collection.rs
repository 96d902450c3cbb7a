//! Named document collections stored as JSON bodies in SQLite.

use std::sync::Arc;

use rusqlite::params;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use ingres_core::error::IngresError;
use ingres_core::filter::QueryFilter;
use ingres_core::record::{DocumentId, StoredDocument};

use crate::db::Database;
use crate::matcher::CompiledFilter;

/// Read access to a document collection, as needed on the request path.
///
/// Implemented by [`DocumentCollection`]; tests substitute their own stores
/// to simulate faults.
pub trait DocumentStore: Send + Sync {
    /// One arbitrary document, or `None` for an empty collection.
    fn sample_one(&self) -> Result<Option<StoredDocument>, IngresError>;

    /// Documents matching `filter`, in insertion order, at most `limit`.
    fn find(&self, filter: &QueryFilter, limit: usize) -> Result<Vec<StoredDocument>, IngresError>;
}

/// A collection inside the shared `documents` table.
pub struct DocumentCollection {
    db: Arc<Database>,
    name: String,
}

impl DocumentCollection {
    pub fn new(db: Arc<Database>, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert one document and return its new identifier.
    pub fn insert(&self, fields: &Map<String, Value>) -> Result<DocumentId, IngresError> {
        let id = DocumentId::new();
        let body = serde_json::to_string(fields)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3)",
                params![id.as_uuid().to_string(), self.name, body],
            )
            .map_err(|e| IngresError::Storage(format!("Failed to insert document: {}", e)))?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Replace the whole collection in one transaction: delete every
    /// existing document, then insert `documents` in order.
    ///
    /// Returns the number of documents removed.
    pub fn replace_all(&self, documents: &[Map<String, Value>]) -> Result<usize, IngresError> {
        let bodies = documents
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| IngresError::Storage(format!("Failed to begin transaction: {}", e)))?;

            let removed = tx
                .execute("DELETE FROM documents WHERE collection = ?1", params![self.name])
                .map_err(|e| IngresError::Storage(format!("Failed to clear collection: {}", e)))?;

            {
                let mut stmt = tx
                    .prepare("INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3)")
                    .map_err(|e| IngresError::Storage(e.to_string()))?;
                for body in &bodies {
                    stmt.execute(params![
                        DocumentId::new().as_uuid().to_string(),
                        self.name,
                        body
                    ])
                    .map_err(|e| {
                        IngresError::Storage(format!("Failed to insert document: {}", e))
                    })?;
                }
            }

            tx.commit()
                .map_err(|e| IngresError::Storage(format!("Failed to commit: {}", e)))?;
            Ok(removed)
        })
    }

    /// Number of documents in the collection.
    pub fn count(&self) -> Result<u64, IngresError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    params![self.name],
                    |row| row.get(0),
                )
                .map_err(|e| IngresError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

impl DocumentStore for DocumentCollection {
    fn sample_one(&self) -> Result<Option<StoredDocument>, IngresError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq ASC LIMIT 1",
                )
                .map_err(|e| IngresError::Storage(e.to_string()))?;
            let mut rows = stmt
                .query(params![self.name])
                .map_err(|e| IngresError::Storage(e.to_string()))?;
            match rows.next().map_err(|e| IngresError::Storage(e.to_string()))? {
                Some(row) => {
                    let id: String = row.get(0).map_err(|e| IngresError::Storage(e.to_string()))?;
                    let body: String =
                        row.get(1).map_err(|e| IngresError::Storage(e.to_string()))?;
                    Ok(Some(decode_document(&id, &body)?))
                }
                None => Ok(None),
            }
        })
    }

    fn find(&self, filter: &QueryFilter, limit: usize) -> Result<Vec<StoredDocument>, IngresError> {
        let compiled = CompiledFilter::compile(filter)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq ASC")
                .map_err(|e| IngresError::Storage(e.to_string()))?;
            let mut rows = stmt
                .query(params![self.name])
                .map_err(|e| IngresError::Storage(e.to_string()))?;

            let mut found = Vec::new();
            let mut scanned = 0usize;
            while let Some(row) = rows.next().map_err(|e| IngresError::Storage(e.to_string()))? {
                scanned += 1;
                let id: String = row.get(0).map_err(|e| IngresError::Storage(e.to_string()))?;
                let body: String = row.get(1).map_err(|e| IngresError::Storage(e.to_string()))?;
                let doc = decode_document(&id, &body)?;
                if compiled.matches(&doc.fields) {
                    found.push(doc);
                    if found.len() >= limit {
                        break;
                    }
                }
            }

            debug!(
                collection = %self.name,
                scanned,
                matched = found.len(),
                "Collection scan finished"
            );
            Ok(found)
        })
    }
}

fn decode_document(id: &str, body: &str) -> Result<StoredDocument, IngresError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| IngresError::Storage(format!("Corrupt document id {}: {}", id, e)))?;
    let fields = match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => map,
        other => {
            return Err(IngresError::Storage(format!(
                "Document {} is not an object: {}",
                id, other
            )))
        }
    };
    Ok(StoredDocument::new(DocumentId::from_uuid(uuid), fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingres_core::record::ID_FIELD;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn collection() -> DocumentCollection {
        DocumentCollection::new(Arc::new(Database::in_memory().unwrap()), "information")
    }

    fn seed_districts(coll: &DocumentCollection, n: usize) {
        let docs: Vec<_> = (0..n)
            .map(|i| {
                doc(json!({
                    "STATE": if i % 2 == 0 { "KERALA" } else { "GOA" },
                    "DISTRICT": format!("District {}", i),
                    "rainfall_mm_Total": 500 + i * 100
                }))
            })
            .collect();
        coll.replace_all(&docs).unwrap();
    }

    #[test]
    fn test_sample_one_empty_collection() {
        assert!(collection().sample_one().unwrap().is_none());
    }

    #[test]
    fn test_sample_one_returns_first_inserted() {
        let coll = collection();
        seed_districts(&coll, 3);
        let sample = coll.sample_one().unwrap().unwrap();
        assert_eq!(sample.fields["DISTRICT"], json!("District 0"));
    }

    #[test]
    fn test_insert_and_count() {
        let coll = collection();
        let id = coll.insert(&doc(json!({"a": 1}))).unwrap();
        assert_eq!(coll.count().unwrap(), 1);
        assert_eq!(coll.sample_one().unwrap().unwrap().id, id);
    }

    #[test]
    fn test_find_applies_filter_and_limit() {
        let coll = collection();
        seed_districts(&coll, 40);

        let all = coll.find(&QueryFilter::empty(), 20).unwrap();
        assert_eq!(all.len(), 20);

        let filter = QueryFilter::from_json(&json!({"rainfall_mm_Total": {"$gt": 1000}})).unwrap();
        let wet = coll.find(&filter, 100).unwrap();
        // 500 + i*100 > 1000  <=>  i >= 6
        assert_eq!(wet.len(), 34);
        assert!(wet
            .iter()
            .all(|d| d.fields["rainfall_mm_Total"].as_u64().unwrap() > 1000));
    }

    #[test]
    fn test_find_is_repeatable() {
        let coll = collection();
        seed_districts(&coll, 10);
        let filter =
            QueryFilter::from_json(&json!({"STATE": {"$regex": "kerala", "$options": "i"}}))
                .unwrap();
        let first = coll.find(&filter, 20).unwrap();
        let second = coll.find(&filter, 20).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_find_zero_limit() {
        let coll = collection();
        seed_districts(&coll, 3);
        assert!(coll.find(&QueryFilter::empty(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_find_invalid_regex_is_an_error() {
        let coll = collection();
        seed_districts(&coll, 3);
        let filter = QueryFilter::from_json(&json!({"STATE": {"$regex": "["}})).unwrap();
        assert!(coll.find(&filter, 20).is_err());
    }

    #[test]
    fn test_replace_all_clears_previous_documents() {
        let coll = collection();
        seed_districts(&coll, 5);
        let removed = coll.replace_all(&[doc(json!({"only": true}))]).unwrap();
        assert_eq!(removed, 5);
        assert_eq!(coll.count().unwrap(), 1);
    }

    #[test]
    fn test_collections_are_isolated() {
        let db = Arc::new(Database::in_memory().unwrap());
        let a = DocumentCollection::new(Arc::clone(&db), "a");
        let b = DocumentCollection::new(db, "b");
        a.insert(&doc(json!({"x": 1}))).unwrap();
        assert_eq!(a.count().unwrap(), 1);
        assert_eq!(b.count().unwrap(), 0);
        assert!(b.sample_one().unwrap().is_none());
    }

    #[test]
    fn test_stored_id_is_store_assigned() {
        let coll = collection();
        coll.insert(&doc(json!({"_id": 99, "x": 1}))).unwrap();
        let record = coll.sample_one().unwrap().unwrap().into_record();
        assert!(record.get(ID_FIELD).unwrap().is_string());
    }

    #[test]
    fn test_corrupt_row_is_storage_error() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, body) VALUES ('not-a-uuid', 'c', '{}')",
                [],
            )
            .map_err(|e| IngresError::Storage(e.to_string()))?;
            Ok(())
        })
        .unwrap();
        let coll = DocumentCollection::new(db, "c");
        assert!(matches!(coll.sample_one(), Err(IngresError::Storage(_))));
    }
}
