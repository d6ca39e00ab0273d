//! Maps source-shaped records onto the canonical attribute schema.

pub mod fields;
pub mod mapping;

use bookfuse_core::config::NormalizeConfig;
use bookfuse_core::{BookAttributes, CanonicalField, NormalizedRecord, RawSourceRecord};
use tracing::debug;

use crate::error::Result;
use crate::identifiers::{
    convert_isbn10_to_13, extract_isbn_from_text, extract_isbns, validate_isbn13,
};
use fields::{
    normalize_currency, normalize_isbn10, normalize_isbn13, normalize_language, normalize_title,
    parse_count, parse_date, parse_number, split_list, value_text,
};
pub use mapping::{FieldMappingTable, SourceMapping};

#[derive(Debug, Clone)]
pub struct Normalizer {
    mapping: FieldMappingTable,
    list_separators: Vec<String>,
    language_max_len: usize,
    derive_isbn13_from_isbn10: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        let config = NormalizeConfig::default();
        Self {
            mapping: FieldMappingTable::default(),
            list_separators: config.list_separators,
            language_max_len: config.language_max_len,
            derive_isbn13_from_isbn10: config.derive_isbn13_from_isbn10,
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NormalizeConfig) -> Result<Self> {
        Ok(Self {
            mapping: FieldMappingTable::with_overrides(&config.field_overrides)?,
            list_separators: config.list_separators.clone(),
            language_max_len: config.language_max_len,
            derive_isbn13_from_isbn10: config.derive_isbn13_from_isbn10,
        })
    }

    pub fn with_isbn13_derivation(mut self, enabled: bool) -> Self {
        self.derive_isbn13_from_isbn10 = enabled;
        self
    }

    pub fn normalize_all(&self, records: &[RawSourceRecord]) -> Vec<NormalizedRecord> {
        records.iter().map(|record| self.normalize(record)).collect()
    }

    /// Never fails: attributes that cannot be normalized become absent.
    pub fn normalize(&self, raw: &RawSourceRecord) -> NormalizedRecord {
        use CanonicalField as F;

        let mapping = self.mapping.for_source(raw.source);
        let lookup = |field| mapping.lookup(raw, field);

        let mut record = NormalizedRecord::new(raw.source, raw.source_file.clone(), raw.row_number);
        record.ingested_at = raw.ingested_at;
        if let Some(id) = mapping.lookup_source_id(raw).and_then(value_text) {
            record.source_id = id;
        }

        let mut attrs = BookAttributes::default();

        if let Some((display, normalized)) = lookup(F::Title).and_then(normalize_title) {
            attrs.title = Some(display);
            record.title_normalized = Some(normalized);
        }
        attrs.authors = lookup(F::Authors)
            .map(|v| split_list(v, &self.list_separators))
            .unwrap_or_default();
        attrs.category = lookup(F::Category)
            .map(|v| split_list(v, &self.list_separators))
            .unwrap_or_default();

        attrs.isbn13 = lookup(F::Isbn13).and_then(normalize_isbn13);
        attrs.isbn10 = lookup(F::Isbn10).and_then(normalize_isbn10);
        if attrs.isbn13.is_none() && attrs.isbn10.is_none() {
            self.fill_isbns_from_text(mapping, raw, &mut attrs);
        }
        if self.derive_isbn13_from_isbn10 && attrs.isbn13.is_none() {
            attrs.isbn13 = attrs.isbn10.as_deref().and_then(convert_isbn10_to_13);
        }

        attrs.publication_date = lookup(F::PublicationDate).and_then(parse_date);
        attrs.language = lookup(F::Language).and_then(|v| normalize_language(v, self.language_max_len));
        attrs.publisher = lookup(F::Publisher).and_then(value_text);
        attrs.rating = lookup(F::Rating).and_then(parse_number);
        attrs.ratings_count = lookup(F::RatingsCount).and_then(parse_count);
        attrs.price_amount = lookup(F::PriceAmount).and_then(parse_number);
        attrs.price_currency = lookup(F::PriceCurrency).and_then(normalize_currency);

        record.attrs = attrs;
        debug!(
            source = %record.source,
            row = record.row_number,
            absent = record.attrs.absent_count(),
            "normalized record"
        );
        record
    }

    /// ISBNs from free-text fields such as URLs. A label-introduced ISBN
    /// (`ISBN-13: ...`) wins over a bare digit run.
    fn fill_isbns_from_text(
        &self,
        mapping: &SourceMapping,
        raw: &RawSourceRecord,
        attrs: &mut BookAttributes,
    ) {
        for value in mapping.isbn_text_values(raw) {
            let Some(text) = value.as_str() else {
                continue;
            };
            if let Some(isbn) = extract_isbn_from_text(text) {
                if isbn.parsed_from_isbn10() {
                    if attrs.isbn10.is_none() {
                        attrs.isbn10 = isbn.isbn10;
                    }
                } else if attrs.isbn13.is_none() {
                    attrs.isbn13 = Some(isbn.isbn13);
                }
            }

            let (isbn10, isbn13) = extract_isbns(text);
            if attrs.isbn13.is_none() {
                attrs.isbn13 = isbn13.filter(|s| validate_isbn13(s));
            }
            if attrs.isbn10.is_none() {
                attrs.isbn10 = isbn10;
            }
        }
    }
}
