use std::collections::BTreeMap;

use bookfuse_core::{CanonicalField, CatalogError, RawSourceRecord, SourceKind};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::Result;

/// Override key for the field holding a source-local record identifier.
pub const SOURCE_ID_KEY: &str = "source_id";
/// Override key for free-text fields scanned for ISBNs when no ISBN field is present.
pub const ISBN_TEXT_KEY: &str = "isbn_text";

static EMPTY_MAPPING: Lazy<SourceMapping> = Lazy::new(SourceMapping::default);

/// Where one source keeps each canonical attribute. Candidates are tried in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapping {
    pub fields: BTreeMap<CanonicalField, Vec<String>>,
    pub source_id: Vec<String>,
    pub isbn_text: Vec<String>,
}

impl SourceMapping {
    fn from_table(
        fields: &[(CanonicalField, &[&str])],
        source_id: &[&str],
        isbn_text: &[&str],
    ) -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        Self {
            fields: fields
                .iter()
                .map(|(field, names)| (*field, owned(names)))
                .collect(),
            source_id: owned(source_id),
            isbn_text: owned(isbn_text),
        }
    }

    /// First present value among the candidates for `field`.
    pub fn lookup<'r>(&self, record: &'r RawSourceRecord, field: CanonicalField) -> Option<&'r Value> {
        self.fields
            .get(&field)
            .and_then(|names| first_present(record, names))
    }

    pub fn lookup_source_id<'r>(&self, record: &'r RawSourceRecord) -> Option<&'r Value> {
        first_present(record, &self.source_id)
    }

    pub fn isbn_text_values<'r>(&self, record: &'r RawSourceRecord) -> Vec<&'r Value> {
        self.isbn_text
            .iter()
            .filter_map(|name| record.get(name))
            .collect()
    }

    fn set(&mut self, key: &str, names: Vec<String>) -> Result<()> {
        match key {
            SOURCE_ID_KEY => self.source_id = names,
            ISBN_TEXT_KEY => self.isbn_text = names,
            other => {
                let field = CanonicalField::ALL
                    .into_iter()
                    .find(|field| field.name() == other)
                    .ok_or_else(|| {
                        CatalogError::ConfigError(format!("unknown mapped field: {other}"))
                    })?;
                self.fields.insert(field, names);
            }
        }
        Ok(())
    }
}

fn first_present<'r>(record: &'r RawSourceRecord, names: &[String]) -> Option<&'r Value> {
    names.iter().find_map(|name| record.get(name))
}

/// `{source: {canonical_field: [source_field, ...]}}`, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMappingTable {
    by_source: BTreeMap<SourceKind, SourceMapping>,
}

impl Default for FieldMappingTable {
    fn default() -> Self {
        use CanonicalField as F;

        let scrape = SourceMapping::from_table(
            &[
                (F::Title, &["title", "titulo"]),
                (F::Authors, &["author", "authors", "autor"]),
                (F::Isbn13, &["isbn13"]),
                (F::Isbn10, &["isbn10", "isbn"]),
                (F::PublicationDate, &["publication_date", "pub_date", "published"]),
                (F::Language, &["language", "lang"]),
                (F::Publisher, &["publisher"]),
                (F::Category, &["genres", "categories", "category"]),
                (F::Rating, &["rating", "average_rating"]),
                (F::RatingsCount, &["ratings_count"]),
            ],
            &["book_id", "book_url", "url"],
            &["book_url", "url"],
        );

        let api = SourceMapping::from_table(
            &[
                (F::Title, &["title", "titulo"]),
                (F::Authors, &["authors", "author"]),
                (F::Isbn13, &["isbn13", "isbn_13"]),
                (F::Isbn10, &["isbn10", "isbn_10"]),
                (
                    F::PublicationDate,
                    &["pub_date", "published_date", "publishedDate", "publication_date"],
                ),
                (F::Language, &["language", "lang"]),
                (F::Publisher, &["publisher"]),
                (F::Category, &["categories", "category"]),
                (F::Rating, &["average_rating", "rating"]),
                (F::RatingsCount, &["ratings_count", "ratingsCount"]),
                (F::PriceAmount, &["price_amount", "amount"]),
                (F::PriceCurrency, &["price_currency", "currency", "currency_code"]),
            ],
            &["gb_id", "id"],
            &[],
        );

        Self {
            by_source: BTreeMap::from([
                (SourceKind::CatalogScrape, scrape),
                (SourceKind::BibliographicApi, api),
            ]),
        }
    }
}

impl FieldMappingTable {
    /// Default table with per-source entries replaced by `overrides`.
    pub fn with_overrides(
        overrides: &BTreeMap<SourceKind, BTreeMap<String, Vec<String>>>,
    ) -> Result<Self> {
        let mut table = Self::default();
        for (source, fields) in overrides {
            let mapping = table.by_source.entry(*source).or_default();
            for (key, names) in fields {
                mapping.set(key, names.clone())?;
            }
        }
        Ok(table)
    }

    pub fn for_source(&self, source: SourceKind) -> &SourceMapping {
        self.by_source.get(&source).unwrap_or(&EMPTY_MAPPING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;

    #[test]
    fn test_scrape_prefers_first_candidate() {
        let table = FieldMappingTable::default();
        let record = RawSourceRecord::new(SourceKind::CatalogScrape, "a.json", 1)
            .with_attr("titulo", "Cien años de soledad")
            .with_attr("authors", "Gabriel García Márquez");
        let mapping = table.for_source(SourceKind::CatalogScrape);

        assert_eq!(
            mapping.lookup(&record, CanonicalField::Title),
            Some(&Value::from("Cien años de soledad"))
        );
        assert!(mapping.lookup(&record, CanonicalField::Authors).is_some());
        assert!(mapping.lookup(&record, CanonicalField::PriceAmount).is_none());
    }

    #[test]
    fn test_blank_candidate_falls_through() {
        let table = FieldMappingTable::default();
        let record = RawSourceRecord::new(SourceKind::CatalogScrape, "a.json", 1)
            .with_attr("title", "")
            .with_attr("titulo", "Rayuela");
        let mapping = table.for_source(SourceKind::CatalogScrape);
        assert_eq!(
            mapping.lookup(&record, CanonicalField::Title),
            Some(&Value::from("Rayuela"))
        );
    }

    #[test]
    fn test_overrides_replace_candidates() {
        let overrides = BTreeMap::from([(
            SourceKind::BibliographicApi,
            BTreeMap::from([
                ("title".to_string(), vec!["volume_title".to_string()]),
                (SOURCE_ID_KEY.to_string(), vec!["volume_id".to_string()]),
            ]),
        )]);
        let table = FieldMappingTable::with_overrides(&overrides).unwrap();
        let mapping = table.for_source(SourceKind::BibliographicApi);
        assert_eq!(mapping.fields[&CanonicalField::Title], vec!["volume_title"]);
        assert_eq!(mapping.source_id, vec!["volume_id"]);
        assert_eq!(mapping.fields[&CanonicalField::Publisher], vec!["publisher"]);
    }

    #[test]
    fn test_unknown_override_key_is_config_error() {
        let overrides = BTreeMap::from([(
            SourceKind::CatalogScrape,
            BTreeMap::from([("subtitle".to_string(), vec!["sub".to_string()])]),
        )]);
        assert!(matches!(
            FieldMappingTable::with_overrides(&overrides),
            Err(ResolveError::Catalog(CatalogError::ConfigError(_)))
        ));
    }
}
