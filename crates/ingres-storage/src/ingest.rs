//! Offline bulk-load of a CSV file into a collection.
//!
//! Not part of the request path: run once by an administrator (`ingres
//! ingest`) to replace a collection's contents. Column names are sanitized
//! to `[A-Za-z0-9_]` and cell values are typed per column.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{info, warn};

use ingres_core::error::IngresError;

use crate::collection::DocumentCollection;

static DISALLOWED_FIELD_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("Invalid field-name regex"));

/// Outcome of a bulk-load.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub collection: String,
    /// Documents written.
    pub records: usize,
    /// Documents removed before writing.
    pub replaced: usize,
    /// Sanitized column names, in file order.
    pub columns: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_column_name(name: &str) -> String {
    DISALLOWED_FIELD_CHARS.replace_all(name, "_").into_owned()
}

/// Inferred value type of one CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

/// Parse CSV text into sanitized column names and one document per row.
pub fn read_csv<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Map<String, Value>>), IngresError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| IngresError::Ingest(format!("Failed to read CSV header: {}", e)))?
        .clone();
    if headers.is_empty() {
        return Err(IngresError::Ingest("CSV file has no header row".to_string()));
    }
    let columns = unique_columns(headers.iter().map(sanitize_column_name));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|e| IngresError::Ingest(format!("Malformed CSV row {}: {}", line + 2, e)))?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }

    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|col| infer_kind(rows.iter().filter_map(|row| row.get(col).map(String::as_str))))
        .collect();

    let documents = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(col, (name, kind))| {
                    let cell = row.get(col).map(String::as_str).unwrap_or("");
                    (name.clone(), typed_value(cell, *kind))
                })
                .collect::<Map<String, Value>>()
        })
        .collect();

    Ok((columns, documents))
}

/// Read a CSV file and replace `collection` with its rows.
pub fn ingest_csv(path: &Path, collection: &DocumentCollection) -> Result<IngestReport, IngresError> {
    let file = std::fs::File::open(path).map_err(|e| {
        IngresError::Ingest(format!("The file at {} was not found: {}", path.display(), e))
    })?;
    let (columns, documents) = read_csv(file)?;

    if documents.is_empty() {
        warn!(path = %path.display(), "No records to ingest");
    }

    let replaced = collection.replace_all(&documents)?;
    info!(
        collection = %collection.name(),
        replaced,
        records = documents.len(),
        "Cleared existing documents and ingested CSV"
    );

    Ok(IngestReport {
        collection: collection.name().to_string(),
        records: documents.len(),
        replaced,
        columns,
        finished_at: Utc::now(),
    })
}

/// Suffix repeated names (`a`, `a_2`, `a_3`) so no column overwrites another.
fn unique_columns(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", name, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Narrowest kind every non-empty cell parses as. An all-empty column is
/// typed as integer, which renders every cell as `null`.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells.filter(|c| !c.is_empty()) {
        let numeric = if cell.parse::<i64>().is_ok() {
            Some(ColumnKind::Integer)
        } else if cell.parse::<f64>().is_ok() {
            Some(ColumnKind::Float)
        } else {
            None
        };
        kind = Some(match (kind, numeric) {
            (None, Some(k)) => k,
            (None, None) if parse_bool(cell).is_some() => ColumnKind::Boolean,
            (Some(ColumnKind::Integer), Some(k)) => k,
            (Some(ColumnKind::Float), Some(_)) => ColumnKind::Float,
            (Some(ColumnKind::Boolean), None) if parse_bool(cell).is_some() => {
                ColumnKind::Boolean
            }
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Integer)
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn typed_value(cell: &str, kind: ColumnKind) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => cell
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ColumnKind::Float => cell
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Boolean => parse_bool(cell).map(Value::Bool).unwrap_or(Value::Null),
        ColumnKind::Text => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use serde_json::json;

    use crate::collection::DocumentStore;
    use crate::db::Database;

    const SAMPLE: &str = "\
STATE,DISTRICT,Rainfall (mm) Total,Wells,Assessed
KERALA,Wayanad,2890.5,12,true
GOA,North Goa,3005,,False
";

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("Rainfall (mm) Total"), "Rainfall__mm__Total");
        assert_eq!(sanitize_column_name("already_ok_123"), "already_ok_123");
        assert_eq!(sanitize_column_name("a.b$c"), "a_b_c");
        assert_eq!(sanitize_column_name("तापमान"), "______");
    }

    #[test]
    fn test_read_csv_types_columns() {
        let (columns, docs) = read_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            columns,
            vec!["STATE", "DISTRICT", "Rainfall__mm__Total", "Wells", "Assessed"]
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["STATE"], json!("KERALA"));
        assert_eq!(docs[0]["Rainfall__mm__Total"], json!(2890.5));
        // Mixed int/float column is typed as float throughout.
        assert_eq!(docs[1]["Rainfall__mm__Total"], json!(3005.0));
        assert_eq!(docs[0]["Wells"], json!(12));
        assert_eq!(docs[1]["Wells"], Value::Null);
        assert_eq!(docs[0]["Assessed"], json!(true));
        assert_eq!(docs[1]["Assessed"], json!(false));
    }

    #[test]
    fn test_read_csv_mixed_column_is_text() {
        let (_, docs) = read_csv("code\n12\nA7\n".as_bytes()).unwrap();
        assert_eq!(docs[0]["code"], json!("12"));
        assert_eq!(docs[1]["code"], json!("A7"));
    }

    #[test]
    fn test_read_csv_numbers_and_booleans_do_not_mix() {
        let (_, docs) = read_csv("flag\n1\ntrue\n".as_bytes()).unwrap();
        assert_eq!(docs[0]["flag"], json!("1"));
        assert_eq!(docs[1]["flag"], json!("true"));
    }

    #[test]
    fn test_read_csv_non_finite_float_is_null() {
        let (_, docs) = read_csv("x\n1.5\nNaN\n".as_bytes()).unwrap();
        assert_eq!(docs[0]["x"], json!(1.5));
        assert_eq!(docs[1]["x"], Value::Null);
    }

    #[test]
    fn test_read_csv_duplicate_sanitized_headers() {
        let (columns, _) = read_csv("a b,a-b,a_b\n1,2,3\n".as_bytes()).unwrap();
        assert_eq!(columns, vec!["a_b", "a_b_2", "a_b_3"]);
    }

    #[test]
    fn test_read_csv_ragged_row_is_an_error() {
        let result = read_csv("a,b\n1,2,3\n".as_bytes());
        assert!(matches!(result, Err(IngresError::Ingest(_))));
    }

    #[test]
    fn test_ingest_csv_replaces_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let coll = DocumentCollection::new(Arc::new(Database::in_memory().unwrap()), "information");
        coll.insert(&json!({"stale": true}).as_object().cloned().unwrap())
            .unwrap();

        let report = ingest_csv(file.path(), &coll).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.collection, "information");
        assert_eq!(coll.count().unwrap(), 2);

        let first = coll.sample_one().unwrap().unwrap();
        assert_eq!(first.fields["DISTRICT"], json!("Wayanad"));
    }

    #[test]
    fn test_ingest_csv_missing_file() {
        let coll = DocumentCollection::new(Arc::new(Database::in_memory().unwrap()), "c");
        let err = ingest_csv(Path::new("/no/such/file.csv"), &coll).unwrap_err();
        assert!(err.to_string().contains("was not found"));
    }

    #[test]
    fn test_ingest_header_only_file_empties_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"STATE,DISTRICT\n").unwrap();

        let coll = DocumentCollection::new(Arc::new(Database::in_memory().unwrap()), "c");
        coll.insert(&json!({"x": 1}).as_object().cloned().unwrap())
            .unwrap();

        let report = ingest_csv(file.path(), &coll).unwrap();
        assert_eq!(report.records, 0);
        assert_eq!(coll.count().unwrap(), 0);
    }
}
