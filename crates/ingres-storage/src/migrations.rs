//! Database schema migrations.
//!
//! Applies the document-collection schema and records applied versions in
//! `schema_migrations`.

use rusqlite::Connection;
use tracing::info;

use ingres_core::error::IngresError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), IngresError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| IngresError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| IngresError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: documents");
    }

    Ok(())
}

/// Version 1: schemaless documents grouped by collection.
///
/// `seq` preserves insertion order, which is the natural order of every
/// collection scan.
fn apply_v1(conn: &Connection) -> Result<(), IngresError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            collection  TEXT NOT NULL,
            body        TEXT NOT NULL CHECK (json_valid(body)),
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents (collection, seq ASC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'documents');
        ",
    )
    .map_err(|e| IngresError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
