//! SQLite file backing the document collections.
//!
//! `ingres serve` reads while `ingres ingest` may replace a collection in a
//! separate process, so file databases run in WAL mode with a busy timeout.
//! Within one process all access is serialized through a single connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use ingres_core::error::IngresError;

use crate::migrations;

/// How long a reader waits on an ingest holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the document database shared by every collection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the document file at `path`, creating it and its parent
    /// directories when missing.
    pub fn new(path: &Path) -> Result<Self, IngresError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            IngresError::Storage(format!("Cannot open document store {}: {}", path.display(), e))
        })?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| IngresError::Storage(format!("Cannot configure document store: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| IngresError::Storage(format!("Cannot configure document store: {}", e)))?;

        let db = Self::with_schema(conn)?;
        info!(path = %path.display(), documents = db.document_count()?, "Document database ready");
        Ok(db)
    }

    /// Throwaway store used by tests and fixtures.
    pub fn in_memory() -> Result<Self, IngresError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IngresError::Storage(format!("Cannot open in-memory store: {}", e)))?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self, IngresError> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IngresError> {
        self.conn
            .lock()
            .map_err(|_| IngresError::Storage("document store lock poisoned".to_string()))
    }

    /// Run a read against the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, IngresError>
    where
        F: FnOnce(&Connection) -> Result<T, IngresError>,
    {
        f(&*self.lock()?)
    }

    /// Run a write that needs its own transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, IngresError>
    where
        F: FnOnce(&mut Connection) -> Result<T, IngresError>,
    {
        f(&mut *self.lock()?)
    }

    /// Documents across all collections.
    pub fn document_count(&self) -> Result<usize, IngresError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| IngresError::Storage(format!("Cannot count documents: {}", e)))
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(db: &Database, id: &str) {
        db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| IngresError::Storage(e.to_string()))?;
            tx.execute(
                "INSERT INTO documents (id, collection, body) VALUES (?1, 'information', '{}')",
                [id],
            )
            .map_err(|e| IngresError::Storage(e.to_string()))?;
            tx.commit().map_err(|e| IngresError::Storage(e.to_string()))
        })
        .unwrap();
    }

    #[test]
    fn test_in_memory_store_starts_empty() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.document_count().unwrap(), 0);
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ingres.db");
        let db = Database::new(&path).unwrap();

        assert_eq!(db.document_count().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_is_wal_with_busy_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        let (mode, timeout): (String, i64) = db
            .with_conn(|conn| {
                let mode = conn
                    .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| IngresError::Storage(e.to_string()))?;
                let timeout = conn
                    .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
                    .map_err(|e| IngresError::Storage(e.to_string()))?;
                Ok((mode, timeout))
            })
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_reopen_keeps_ingested_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingres.db");
        insert(&Database::new(&path).unwrap(), "a");

        let reopened = Database::new(&path).unwrap();
        assert_eq!(reopened.document_count().unwrap(), 1);
    }

    #[test]
    fn test_document_ids_are_unique() {
        let db = Database::in_memory().unwrap();
        insert(&db, "a");
        let dup = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, body) VALUES ('a', 'other', '{}')",
                [],
            )
            .map_err(|e| IngresError::Storage(e.to_string()))
        });
        assert!(dup.is_err());
        assert_eq!(db.document_count().unwrap(), 1);
    }
}
