use std::fs;
use std::path::Path;

use bookfuse_core::storage::artifacts::load_quality_report;
use bookfuse_core::{AppConfig, CanonicalField, CatalogError, SourceKind};
use bookfuse_resolve::{KeyResolver, Pipeline, ResolveError, RunOptions};
use tempfile::TempDir;

const SCRAPE_JSON: &str = r#"{
  "scraped_at": "2024-05-01T12:00:00Z",
  "books": [
    {
      "title": "Sapiens: A Brief History of Humankind",
      "author": "Yuval Noah Harari",
      "isbn13": "9780062316097",
      "rating": "4.39",
      "ratings_count": "1,043,512",
      "book_url": "https://www.goodreads.com/book/show/23692271-sapiens"
    },
    {
      "title": "sapiens",
      "author": "Yuval Noah Harari",
      "book_url": "https://www.goodreads.com/book/show/1-sapiens"
    },
    {
      "title": "",
      "book_url": "https://www.goodreads.com/book/show/2"
    }
  ]
}"#;

const API_CSV: &str = "\
gb_id,title,authors,isbn13,isbn10,pub_date,language,publisher,categories,price_amount,price_currency
g1,Sapiens,Yuval Noah Harari,978-0-06-231609-7,,2015-02-10,en,Harper,History; Anthropology,14.99,usd
g2,,,,,,,,,,
g3,Dune,Frank Herbert,,0441013597,1990-09-01,en-US,Ace,Fiction,9.99,USD
";

fn landing(dir: &Path) -> AppConfig {
    let landing = dir.join("landing");
    fs::create_dir_all(&landing).unwrap();
    fs::write(landing.join("goodreads_books.json"), SCRAPE_JSON).unwrap();
    fs::write(landing.join("googlebooks_books.csv"), API_CSV).unwrap();

    let mut config = AppConfig::default();
    config.paths.landing_dir = landing.to_string_lossy().to_string();
    config.set_output_root(dir);
    config
}

#[test]
fn run_reconciles_both_sources_and_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());

    let outcome = Pipeline::from_config(&config)
        .unwrap()
        .run(&config, RunOptions::default())
        .unwrap();
    let out = &outcome.reconciled;

    assert_eq!(out.details.len(), 6);
    assert_eq!(out.canonical.len(), 4);

    let keys: Vec<&str> = out.canonical.iter().map(|c| c.dup_key.as_str()).collect();
    assert_eq!(keys[0], "9780062316097");
    assert_eq!(keys[2], KeyResolver::new().degenerate_key());

    let sapiens = &out.canonical[0];
    assert_eq!(sapiens.winning_source, SourceKind::BibliographicApi);
    assert_eq!(sapiens.member_count, 2);
    assert_eq!(sapiens.attrs.title.as_deref(), Some("Sapiens"));
    assert_eq!(sapiens.attrs.language.as_deref(), Some("en"));
    assert_eq!(sapiens.attrs.rating, Some(4.39));
    assert_eq!(sapiens.attrs.ratings_count, Some(1_043_512));
    assert_eq!(sapiens.attrs.category, vec!["History", "Anthropology"]);
    assert_eq!(sapiens.attrs.price_currency.as_deref(), Some("USD"));
    assert_eq!(sapiens.origins(CanonicalField::Title)[0].source_id, "g1");
    let rating_origin = &sapiens.origins(CanonicalField::Rating)[0];
    assert_eq!(rating_origin.source, SourceKind::CatalogScrape);
    assert_eq!(
        rating_origin.source_id,
        "https://www.goodreads.com/book/show/23692271-sapiens"
    );

    let fallback = &out.canonical[1];
    assert_eq!(fallback.attrs.title.as_deref(), Some("sapiens"));
    assert_eq!(fallback.member_count, 1);

    let degenerate = &out.canonical[2];
    assert_eq!(degenerate.member_count, 2);

    let dune = &out.canonical[3];
    assert_eq!(dune.attrs.isbn10.as_deref(), Some("0441013597"));
    assert_eq!(dune.attrs.language.as_deref(), Some("en-us"));

    let report = &outcome.report;
    assert_eq!(report.input_record_count, 6);
    assert_eq!(report.record_count, 4);
    assert_eq!(report.duplicate_count, 2);
    assert_eq!(report.pct_valid_isbn13, 25.0);
    assert_eq!(report.rows_per_source["catalog-scrape"], 3);
    assert_eq!(report.rows_per_source["bibliographic-api"], 3);
    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.rejected_row_count, 0);

    let paths = outcome.artifacts.as_ref().unwrap();
    for path in [
        &paths.canonical_parquet,
        &paths.canonical_csv,
        &paths.detail_parquet,
        &paths.detail_csv,
        &paths.provenance_parquet,
        &paths.provenance_csv,
        &paths.quality_report,
        &paths.schema_doc,
    ] {
        assert!(path.exists(), "missing {}", path.display());
    }

    let detail_csv = fs::read_to_string(&paths.detail_csv).unwrap();
    assert_eq!(detail_csv.lines().count(), 7);

    let provenance_csv = fs::read_to_string(&paths.provenance_csv).unwrap();
    assert!(provenance_csv.starts_with("dup_key,field,position,source,source_id"));
    assert!(provenance_csv.contains(
        "9780062316097,rating,1,catalog-scrape,https://www.goodreads.com/book/show/23692271-sapiens"
    ));

    let stored = load_quality_report(&paths.quality_report).unwrap();
    assert_eq!(stored.run_id, report.run_id);
    assert_eq!(stored.record_count, 4);
}

#[test]
fn detail_rows_link_back_to_their_groups() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());

    let outcome = Pipeline::new()
        .run(&config, RunOptions { dry_run: true })
        .unwrap();
    let out = &outcome.reconciled;

    for detail in &out.details {
        assert!(out.canonical.iter().any(|c| c.dup_key == detail.dup_key));
    }
    assert_eq!(out.details[3].source_id, "g1");
    assert_eq!(out.details[3].row_number, 1);
    assert_eq!(out.details[0].dup_key, out.details[3].dup_key);
    assert_ne!(out.details[1].dup_key, out.details[0].dup_key);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());

    let outcome = Pipeline::new()
        .run(&config, RunOptions { dry_run: true })
        .unwrap();
    assert!(outcome.artifacts.is_none());
    assert!(!dir.path().join("standard").exists());
    assert!(!dir.path().join("docs").exists());
}

#[test]
fn rerun_produces_identical_canonical_output() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());
    let pipeline = Pipeline::new();

    let first = pipeline.run(&config, RunOptions { dry_run: true }).unwrap();
    let second = pipeline.run(&config, RunOptions { dry_run: true }).unwrap();
    assert_eq!(first.reconciled.canonical, second.reconciled.canonical);
}

#[test]
fn missing_source_is_structural_error() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());
    fs::remove_file(config.api_path()).unwrap();

    let err = Pipeline::new().run(&config, RunOptions::default()).unwrap_err();
    assert!(err.is_structural());
    assert!(matches!(
        err,
        ResolveError::Catalog(CatalogError::SourceMissing(ref path)) if path.ends_with("googlebooks_books.csv")
    ));
    assert!(!dir.path().join("standard").exists());
}

#[test]
fn malformed_landing_rows_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = landing(dir.path());
    let mut csv = API_CSV.to_string();
    csv.push_str("g4,Emma,Jane Austen,,,1815-12-23,en,Murray,Fiction,5.99,GBP,extra\n");
    fs::write(config.api_path(), csv).unwrap();

    let outcome = Pipeline::new()
        .run(&config, RunOptions { dry_run: true })
        .unwrap();
    assert_eq!(outcome.reconciled.details.len(), 6);
    assert_eq!(outcome.report.rejected_row_count, 1);

    let api = outcome
        .report
        .sources
        .iter()
        .find(|s| s.source == SourceKind::BibliographicApi)
        .unwrap();
    assert_eq!(api.row_count, 3);
    assert_eq!(api.rejected_rows, 1);
    assert!(
        outcome
            .report
            .checks
            .iter()
            .any(|c| c.name == "landing_rows_readable" && !c.passed && !c.blocking)
    );
}
