use std::collections::BTreeMap;

use bookfuse_core::{DetailRecord, NormalizedRecord};

use crate::error::{ResolveError, Result};
use crate::identifiers::{validate_isbn10, validate_isbn13};

pub const FLAG_ISBN_VALID: &str = "isbn_valid";
pub const FLAG_ISBN10_VALID: &str = "isbn10_valid";

/// One detail row per normalized input, in input order. `keys[i]` is the dup key of `records[i]`.
pub fn build_details(records: &[NormalizedRecord], keys: &[String]) -> Result<Vec<DetailRecord>> {
    if records.len() != keys.len() {
        return Err(ResolveError::MergeInvariant(format!(
            "{} records but {} dup keys",
            records.len(),
            keys.len()
        )));
    }

    Ok(records
        .iter()
        .zip(keys)
        .map(|(record, key)| detail_for(record, key))
        .collect())
}

pub fn detail_for(record: &NormalizedRecord, dup_key: &str) -> DetailRecord {
    DetailRecord {
        source_id: record.source_id.clone(),
        source: record.source,
        source_file: record.source_file.clone(),
        row_number: record.row_number,
        dup_key: dup_key.to_string(),
        ingested_at: record.ingested_at,
        title_normalized: record.title_normalized.clone(),
        attrs: record.attrs.clone(),
        flags: validity_flags(record),
    }
}

fn validity_flags(record: &NormalizedRecord) -> BTreeMap<String, bool> {
    let isbn_valid = record
        .attrs
        .isbn13
        .as_deref()
        .is_some_and(validate_isbn13);
    let isbn10_valid = record
        .attrs
        .isbn10
        .as_deref()
        .is_some_and(validate_isbn10);

    BTreeMap::from([
        (FLAG_ISBN_VALID.to_string(), isbn_valid),
        (FLAG_ISBN10_VALID.to_string(), isbn10_valid),
    ])
}
