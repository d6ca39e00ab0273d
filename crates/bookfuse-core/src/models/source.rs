use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which collaborator produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    CatalogScrape,
    BibliographicApi,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::CatalogScrape, SourceKind::BibliographicApi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogScrape => "catalog-scrape",
            Self::BibliographicApi => "bibliographic-api",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "catalog-scrape" | "scrape" | "goodreads" => Ok(Self::CatalogScrape),
            "bibliographic-api" | "api" | "googlebooks" | "google-books" => {
                Ok(Self::BibliographicApi)
            }
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// One record exactly as a source delivered it. Attribute names are source-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceRecord {
    pub source: SourceKind,
    pub source_file: String,
    /// 1-based position within the source's input sequence.
    pub row_number: usize,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl RawSourceRecord {
    pub fn new(source: SourceKind, source_file: impl Into<String>, row_number: usize) -> Self {
        Self {
            source,
            source_file: source_file.into(),
            row_number,
            ingested_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_ingested_at(mut self, at: DateTime<Utc>) -> Self {
        self.ingested_at = at;
        self
    }

    /// Looks up an attribute, treating JSON null and blank strings as missing.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
    }
}

/// Everything read from one landing file.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub manifest: SourceManifest,
    pub records: Vec<RawSourceRecord>,
}

/// What was observed about a landing file when it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub source: SourceKind,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub row_count: usize,
    /// Rows skipped because they could not be read as an attribute mapping.
    #[serde(default)]
    pub rejected_rows: usize,
    pub columns: Vec<String>,
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!("google_books".parse::<SourceKind>().unwrap(), SourceKind::BibliographicApi);
        assert!("rss".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_source_kind_serde_is_kebab_case() {
        let json = serde_json::to_string(&SourceKind::BibliographicApi).unwrap();
        assert_eq!(json, "\"bibliographic-api\"");
    }

    #[test]
    fn test_get_skips_blank_values() {
        let record = RawSourceRecord::new(SourceKind::CatalogScrape, "a.json", 1)
            .with_attr("title", "  ")
            .with_attr("author", Value::Null)
            .with_attr("rating", 4.2);
        assert!(record.get("title").is_none());
        assert!(record.get("author").is_none());
        assert!(record.get("rating").is_some());
    }
}
