//! Ingres Storage crate - SQLite-backed document collections.
//!
//! Provides a WAL-mode SQLite database with migrations, named collections
//! of schemaless JSON documents, in-process filter evaluation, and the
//! offline CSV bulk-load used to populate a collection.

pub mod collection;
pub mod db;
pub mod ingest;
pub mod matcher;
pub mod migrations;

pub use collection::{DocumentCollection, DocumentStore};
pub use db::Database;
pub use ingest::{ingest_csv, read_csv, sanitize_column_name, IngestReport};
pub use matcher::CompiledFilter;
