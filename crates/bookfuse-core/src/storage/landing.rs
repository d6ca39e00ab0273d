//! Readers for landing files produced by the retrieval collaborators.
//!
//! Landing files are read-only inputs. A file that is missing or cannot be parsed
//! as a sequence of records is a structural error for the whole run. Individual
//! rows that are not attribute mappings are skipped and counted in the manifest.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::models::{RawSourceRecord, SourceBatch, SourceKind, SourceManifest};

/// Keys under which a JSON landing object may hold its record array.
const RECORD_ARRAY_KEYS: [&str; 3] = ["books", "records", "items"];

/// Key holding the scrape timestamp in a JSON landing object.
const SCRAPED_AT_KEY: &str = "scraped_at";

/// Read one landing file, choosing the parser by file extension.
pub fn read_source(path: &Path, source: SourceKind) -> Result<SourceBatch> {
    if !path.exists() {
        return Err(CatalogError::SourceMissing(path.to_path_buf()));
    }

    let size_bytes = fs::metadata(path)?.len();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let (parsed, declared_at, header) = match extension.as_deref() {
        Some("json") => {
            let (parsed, declared_at) = read_json(path)?;
            (parsed, declared_at, None)
        }
        Some("jsonl") | Some("ndjson") => (read_jsonl(path)?, None, None),
        Some("csv") => {
            let (header, parsed) = read_csv(path)?;
            (parsed, None, Some(header))
        }
        _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
    };

    let ingested_at = declared_at.unwrap_or_else(Utc::now);
    let source_file = path.to_string_lossy().to_string();
    let columns = header.unwrap_or_else(|| detect_columns(&parsed.rows));
    let rejected_rows = parsed.rejected;

    if parsed.rows.is_empty() {
        warn!(source = %source, path = %path.display(), "landing file has no records");
    }
    if rejected_rows > 0 {
        warn!(
            source = %source,
            path = %path.display(),
            rejected = rejected_rows,
            "skipped unreadable landing rows"
        );
    }

    let records: Vec<RawSourceRecord> = parsed
        .rows
        .into_iter()
        .map(|(row_number, attributes)| RawSourceRecord {
            source,
            source_file: source_file.clone(),
            row_number,
            ingested_at,
            attributes,
        })
        .collect();

    debug!(
        source = %source,
        path = %path.display(),
        rows = records.len(),
        columns = columns.len(),
        "read landing file"
    );

    Ok(SourceBatch {
        manifest: SourceManifest {
            source,
            path: path.to_path_buf(),
            size_bytes,
            row_count: records.len(),
            rejected_rows,
            columns,
            ingested_at,
        },
        records,
    })
}

type Row = BTreeMap<String, Value>;

/// Readable rows keyed by their 1-based position in the file, plus the count of
/// rows that were skipped.
#[derive(Debug, Default)]
struct ParsedRows {
    rows: Vec<(usize, Row)>,
    rejected: usize,
}

impl ParsedRows {
    fn accept(&mut self, row_number: usize, row: Row) {
        self.rows.push((row_number, row));
    }

    fn reject(&mut self, path: &Path, row_number: usize, reason: impl std::fmt::Display) {
        debug!(path = %path.display(), row = row_number, %reason, "rejected landing row");
        self.rejected += 1;
    }
}

fn read_json(path: &Path) -> Result<(ParsedRows, Option<DateTime<Utc>>)> {
    let contents = fs::read_to_string(path)?;
    let document: Value =
        serde_json::from_str(&contents).map_err(|e| CatalogError::unreadable(path, e))?;

    match document {
        Value::Array(items) => Ok((rows_from_items(path, items), None)),
        Value::Object(mut object) => {
            let declared_at = object
                .get(SCRAPED_AT_KEY)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            let items = RECORD_ARRAY_KEYS
                .iter()
                .find_map(|key| match object.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    CatalogError::unreadable(
                        path,
                        format!("expected a record array under one of {RECORD_ARRAY_KEYS:?}"),
                    )
                })?;
            Ok((rows_from_items(path, items), declared_at))
        }
        _ => Err(CatalogError::unreadable(
            path,
            "expected a JSON array or object of records",
        )),
    }
}

/// Blank lines are ignored; a line that is not a JSON object is rejected.
fn read_jsonl(path: &Path) -> Result<ParsedRows> {
    let contents = fs::read_to_string(path)?;
    let mut parsed = ParsedRows::default();
    let lines = contents.lines().filter(|line| !line.trim().is_empty());
    for (idx, line) in lines.enumerate() {
        let row_number = idx + 1;
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(object)) => parsed.accept(row_number, object_to_row(object)),
            Ok(_) => parsed.reject(path, row_number, "not a JSON object"),
            Err(e) => parsed.reject(path, row_number, e),
        }
    }
    Ok(parsed)
}

fn rows_from_items(path: &Path, items: Vec<Value>) -> ParsedRows {
    let mut parsed = ParsedRows::default();
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(object) => parsed.accept(idx + 1, object_to_row(object)),
            _ => parsed.reject(path, idx + 1, "not a JSON object"),
        }
    }
    parsed
}

fn object_to_row(object: Map<String, Value>) -> Row {
    object.into_iter().collect()
}

/// Rows whose cell count differs from the header are rejected. I/O failures
/// stay structural.
fn read_csv(path: &Path) -> Result<(Vec<String>, ParsedRows)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CatalogError::unreadable(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| CatalogError::unreadable(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut parsed = ParsedRows::default();
    for (idx, record) in reader.records().enumerate() {
        let row_number = idx + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(CatalogError::unreadable(path, format!("row {row_number}: {e}")));
            }
            Err(e) => {
                parsed.reject(path, row_number, e);
                continue;
            }
        };
        if record.len() != header.len() {
            parsed.reject(
                path,
                row_number,
                format!("{} cells for {} columns", record.len(), header.len()),
            );
            continue;
        }
        let row: Row = header
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.trim().is_empty())
            .map(|(name, cell)| (name.clone(), Value::String(cell.to_string())))
            .collect();
        parsed.accept(row_number, row);
    }
    Ok((header, parsed))
}

/// Union of attribute names in first-seen order.
fn detect_columns(rows: &[(usize, Row)]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (_, row) in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
