use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::models::{BookAttributes, CanonicalRecord, DetailRecord, QualityReport};
use crate::storage::table::{ColumnData, Table};

pub const CANONICAL_TABLE: &str = "dim_book";
pub const DETAIL_TABLE: &str = "book_source_detail";
pub const PROVENANCE_TABLE: &str = "book_field_provenance";
pub const QUALITY_REPORT_FILE: &str = "quality_metrics.json";
pub const SCHEMA_DOC_FILE: &str = "schema.md";

/// Locations of everything one run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub canonical_parquet: PathBuf,
    pub canonical_csv: PathBuf,
    pub detail_parquet: PathBuf,
    pub detail_csv: PathBuf,
    pub provenance_parquet: PathBuf,
    pub provenance_csv: PathBuf,
    pub quality_report: PathBuf,
    pub schema_doc: PathBuf,
}

impl ArtifactPaths {
    pub fn new(standard_dir: &Path, docs_dir: &Path) -> Self {
        Self {
            canonical_parquet: standard_dir.join(format!("{CANONICAL_TABLE}.parquet")),
            canonical_csv: standard_dir.join(format!("{CANONICAL_TABLE}.csv")),
            detail_parquet: standard_dir.join(format!("{DETAIL_TABLE}.parquet")),
            detail_csv: standard_dir.join(format!("{DETAIL_TABLE}.csv")),
            provenance_parquet: standard_dir.join(format!("{PROVENANCE_TABLE}.parquet")),
            provenance_csv: standard_dir.join(format!("{PROVENANCE_TABLE}.csv")),
            quality_report: docs_dir.join(QUALITY_REPORT_FILE),
            schema_doc: docs_dir.join(SCHEMA_DOC_FILE),
        }
    }
}

/// Write the canonical, detail and field provenance tables, the quality report
/// and the schema document.
pub fn write_artifacts(
    paths: &ArtifactPaths,
    canonical: &[CanonicalRecord],
    details: &[DetailRecord],
    report: &QualityReport,
) -> Result<()> {
    for path in [&paths.canonical_parquet, &paths.quality_report] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    let canonical_table = canonical_table(canonical);
    canonical_table.write_parquet(&paths.canonical_parquet)?;
    canonical_table.write_csv(&paths.canonical_csv)?;

    let detail_table = detail_table(details);
    detail_table.write_parquet(&paths.detail_parquet)?;
    detail_table.write_csv(&paths.detail_csv)?;

    let provenance_table = provenance_table(canonical);
    provenance_table.write_parquet(&paths.provenance_parquet)?;
    provenance_table.write_csv(&paths.provenance_csv)?;

    write_quality_report(&paths.quality_report, report)?;
    fs::write(
        &paths.schema_doc,
        schema_document(&[&canonical_table, &detail_table, &provenance_table]),
    )?;

    info!(
        canonical = canonical.len(),
        details = details.len(),
        dir = %paths.canonical_parquet.parent().map(|p| p.display().to_string()).unwrap_or_default(),
        "artifacts written"
    );
    Ok(())
}

pub fn write_quality_report(path: &Path, report: &QualityReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_quality_report(path: &Path) -> Result<QualityReport> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Canonical table with exactly the published column set.
pub fn canonical_table(records: &[CanonicalRecord]) -> Table {
    let attrs: Vec<&BookAttributes> = records.iter().map(|r| &r.attrs).collect();
    let table = attribute_columns(Table::new(CANONICAL_TABLE), &attrs, false);
    table.column(
        "winning_source",
        "Source whose record won survivorship",
        ColumnData::Text(
            records
                .iter()
                .map(|r| Some(r.winning_source.to_string()))
                .collect(),
        ),
    )
}

pub fn detail_table(records: &[DetailRecord]) -> Table {
    let text = |f: fn(&DetailRecord) -> Option<String>| {
        ColumnData::Text(records.iter().map(f).collect())
    };

    let mut table = Table::new(DETAIL_TABLE)
        .column("source_id", "Identifier of the row within its source", text(|r| Some(r.source_id.clone())))
        .column("source", "Originating source", text(|r| Some(r.source.to_string())))
        .column("source_file", "Landing file the row was read from", text(|r| Some(r.source_file.clone())))
        .column(
            "row_number",
            "1-based position of the row in its source",
            ColumnData::UInt(records.iter().map(|r| Some(r.row_number as u64)).collect()),
        )
        .column("dup_key", "Dedup group the row resolved to", text(|r| Some(r.dup_key.clone())))
        .column("ingested_at", "Ingestion timestamp (RFC 3339)", text(|r| Some(r.ingested_at.to_rfc3339())))
        .column("title_normalized", "Lowercased title used for matching", text(|r| r.title_normalized.clone()));

    let attrs: Vec<&BookAttributes> = records.iter().map(|r| &r.attrs).collect();
    table = attribute_columns(table, &attrs, true);

    let flag_names: BTreeSet<&String> = records.iter().flat_map(|r| r.flags.keys()).collect();
    for flag in flag_names {
        table = table.column(
            flag.as_str(),
            "Validity flag",
            ColumnData::Bool(records.iter().map(|r| r.flags.get(flag).copied()).collect()),
        );
    }
    table
}

/// One row per canonical field and contributing source row.
pub fn provenance_table(records: &[CanonicalRecord]) -> Table {
    let mut dup_keys = Vec::new();
    let mut fields = Vec::new();
    let mut positions = Vec::new();
    let mut sources = Vec::new();
    let mut source_ids = Vec::new();

    for record in records {
        for (field, origins) in &record.field_sources {
            for (position, origin) in origins.iter().enumerate() {
                dup_keys.push(Some(record.dup_key.clone()));
                fields.push(Some(field.name().to_string()));
                positions.push(Some(position as u64 + 1));
                sources.push(Some(origin.source.to_string()));
                source_ids.push(Some(origin.source_id.clone()));
            }
        }
    }

    Table::new(PROVENANCE_TABLE)
        .column("dup_key", "Canonical record the value belongs to", ColumnData::Text(dup_keys))
        .column("field", "Canonical column", ColumnData::Text(fields))
        .column(
            "position",
            "1-based contributor order; list fields may have several",
            ColumnData::UInt(positions),
        )
        .column("source", "Source of the contributing row", ColumnData::Text(sources))
        .column(
            "source_id",
            "Contributing row, joinable with book_source_detail",
            ColumnData::Text(source_ids),
        )
}

fn attribute_columns(table: Table, attrs: &[&BookAttributes], with_currency: bool) -> Table {
    let text = |f: fn(&BookAttributes) -> Option<String>| {
        ColumnData::Text(attrs.iter().map(|a| f(a)).collect())
    };

    let table = table
        .column("title", "Display title", text(|a| a.title.clone()))
        .column(
            "authors",
            "Authors, case-insensitively deduplicated",
            ColumnData::List(attrs.iter().map(|a| a.authors.clone()).collect()),
        )
        .column("isbn13", "Checksum-valid ISBN-13", text(|a| a.isbn13.clone()))
        .column("isbn10", "ISBN-10 as delivered (10 characters)", text(|a| a.isbn10.clone()))
        .column("publication_date", "ISO-8601 date (YYYY-MM-DD)", text(|a| a.publication_date.clone()))
        .column("language", "Lowercase BCP-47-like language tag", text(|a| a.language.clone()))
        .column("publisher", "Publisher name", text(|a| a.publisher.clone()))
        .column(
            "category",
            "Subject categories, deduplicated",
            ColumnData::List(attrs.iter().map(|a| a.category.clone()).collect()),
        )
        .column("rating", "Average rating", ColumnData::Float(attrs.iter().map(|a| a.rating).collect()))
        .column(
            "ratings_count",
            "Number of ratings",
            ColumnData::UInt(attrs.iter().map(|a| a.ratings_count).collect()),
        )
        .column(
            "price_amount",
            "List price amount",
            ColumnData::Float(attrs.iter().map(|a| a.price_amount).collect()),
        );

    if with_currency {
        table.column("price_currency", "ISO-4217 currency code", text(|a| a.price_currency.clone()))
    } else {
        table
    }
}

fn schema_document(tables: &[&Table]) -> String {
    let sections: Vec<String> = tables.iter().map(|t| t.schema_markdown()).collect();
    format!(
        "# Output schema\n\nAll columns are nullable; an empty cell or null means the value was absent in every contributing source.\n\n{}",
        sections.join("\n")
    )
}
