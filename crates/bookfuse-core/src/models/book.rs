use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::SourceKind;

/// Canonical attributes shared by normalized, canonical and detail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Title,
    Authors,
    Isbn13,
    Isbn10,
    PublicationDate,
    Language,
    Publisher,
    Category,
    Rating,
    RatingsCount,
    PriceAmount,
    PriceCurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
    Number,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 12] = [
        CanonicalField::Title,
        CanonicalField::Authors,
        CanonicalField::Isbn13,
        CanonicalField::Isbn10,
        CanonicalField::PublicationDate,
        CanonicalField::Language,
        CanonicalField::Publisher,
        CanonicalField::Category,
        CanonicalField::Rating,
        CanonicalField::RatingsCount,
        CanonicalField::PriceAmount,
        CanonicalField::PriceCurrency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::Isbn13 => "isbn13",
            Self::Isbn10 => "isbn10",
            Self::PublicationDate => "publication_date",
            Self::Language => "language",
            Self::Publisher => "publisher",
            Self::Category => "category",
            Self::Rating => "rating",
            Self::RatingsCount => "ratings_count",
            Self::PriceAmount => "price_amount",
            Self::PriceCurrency => "price_currency",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Authors | Self::Category => FieldKind::List,
            Self::Rating | Self::RatingsCount | Self::PriceAmount => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The canonical attribute set. `None` and an empty list are the only absent forms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default)]
    pub category: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_currency: Option<String>,
}

impl BookAttributes {
    pub fn is_absent(&self, field: CanonicalField) -> bool {
        match field.kind() {
            FieldKind::Text => self.text(field).is_none(),
            FieldKind::List => self.list(field).is_empty(),
            FieldKind::Number => match field {
                CanonicalField::Rating => self.rating.is_none(),
                CanonicalField::RatingsCount => self.ratings_count.is_none(),
                _ => self.price_amount.is_none(),
            },
        }
    }

    pub fn absent_count(&self) -> usize {
        CanonicalField::ALL
            .iter()
            .filter(|field| self.is_absent(**field))
            .count()
    }

    /// Text value for a text field; `None` for list and numeric fields.
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::Title => &self.title,
            CanonicalField::Isbn13 => &self.isbn13,
            CanonicalField::Isbn10 => &self.isbn10,
            CanonicalField::PublicationDate => &self.publication_date,
            CanonicalField::Language => &self.language,
            CanonicalField::Publisher => &self.publisher,
            CanonicalField::PriceCurrency => &self.price_currency,
            _ => return None,
        };
        value.as_deref()
    }

    pub fn set_text(&mut self, field: CanonicalField, value: Option<String>) {
        let slot = match field {
            CanonicalField::Title => &mut self.title,
            CanonicalField::Isbn13 => &mut self.isbn13,
            CanonicalField::Isbn10 => &mut self.isbn10,
            CanonicalField::PublicationDate => &mut self.publication_date,
            CanonicalField::Language => &mut self.language,
            CanonicalField::Publisher => &mut self.publisher,
            CanonicalField::PriceCurrency => &mut self.price_currency,
            _ => return,
        };
        *slot = value;
    }

    pub fn list(&self, field: CanonicalField) -> &[String] {
        match field {
            CanonicalField::Authors => &self.authors,
            CanonicalField::Category => &self.category,
            _ => &[],
        }
    }

    pub fn set_list(&mut self, field: CanonicalField, values: Vec<String>) {
        match field {
            CanonicalField::Authors => self.authors = values,
            CanonicalField::Category => self.category = values,
            _ => {}
        }
    }

    /// Copies a numeric field from `other`; returns whether a value was present there.
    pub fn copy_number_from(&mut self, field: CanonicalField, other: &BookAttributes) -> bool {
        match field {
            CanonicalField::Rating => {
                self.rating = other.rating;
                other.rating.is_some()
            }
            CanonicalField::RatingsCount => {
                self.ratings_count = other.ratings_count;
                other.ratings_count.is_some()
            }
            CanonicalField::PriceAmount => {
                self.price_amount = other.price_amount;
                other.price_amount.is_some()
            }
            _ => false,
        }
    }

    /// Publication year, taken from the leading digits of `publication_date`.
    pub fn publication_year(&self) -> Option<i32> {
        self.publication_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }
}

/// A source record mapped onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: SourceKind,
    pub source_id: String,
    pub source_file: String,
    pub row_number: usize,
    pub ingested_at: DateTime<Utc>,

    /// Lowercased, whitespace-collapsed title used only for matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_normalized: Option<String>,

    #[serde(flatten)]
    pub attrs: BookAttributes,
}

impl NormalizedRecord {
    pub fn new(source: SourceKind, source_file: impl Into<String>, row_number: usize) -> Self {
        let source_file = source_file.into();
        Self {
            source,
            source_id: format!("{source}-{row_number}"),
            source_file,
            row_number,
            ingested_at: Utc::now(),
            title_normalized: None,
            attrs: BookAttributes::default(),
        }
    }
}

/// The source row a canonical value came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldOrigin {
    pub source: SourceKind,
    pub source_id: String,
}

impl From<&NormalizedRecord> for FieldOrigin {
    fn from(record: &NormalizedRecord) -> Self {
        Self {
            source: record.source,
            source_id: record.source_id.clone(),
        }
    }
}

/// One merged record per dedup group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub dup_key: String,

    #[serde(flatten)]
    pub attrs: BookAttributes,

    pub winning_source: SourceKind,
    pub member_count: usize,

    /// Rows that supplied each present field. Scalar fields have one origin;
    /// list fields list every member that added a value, in rank order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_sources: BTreeMap<CanonicalField, Vec<FieldOrigin>>,
}

impl CanonicalRecord {
    pub fn origins(&self, field: CanonicalField) -> &[FieldOrigin] {
        self.field_sources.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-input provenance row linking a source row to its dedup group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub source_id: String,
    pub source: SourceKind,
    pub source_file: String,
    pub row_number: usize,
    pub dup_key: String,
    pub ingested_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_normalized: Option<String>,

    #[serde(flatten)]
    pub attrs: BookAttributes,

    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}
