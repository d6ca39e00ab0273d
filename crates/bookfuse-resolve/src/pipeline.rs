use bookfuse_core::{
    AppConfig, ArtifactPaths, CanonicalRecord, DetailRecord, NormalizedRecord, QualityReport,
    RawSourceRecord, SourceKind, SourceManifest, read_source, write_artifacts,
};
use tracing::{info, warn};

use crate::dedup::{KeyResolver, count_by_strategy};
use crate::error::{ResolveError, Result};
use crate::normalize::Normalizer;
use crate::provenance::build_details;
use crate::quality::{RunStamp, build_report};
use crate::survivorship::{DefaultPolicy, Merger};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute everything but write no artifacts.
    pub dry_run: bool,
}

/// In-memory result of reconciling one batch of source records.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub normalized: Vec<NormalizedRecord>,
    pub canonical: Vec<CanonicalRecord>,
    pub details: Vec<DetailRecord>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reconciled: Reconciled,
    pub report: QualityReport,
    /// `None` on a dry run.
    pub artifacts: Option<ArtifactPaths>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    normalizer: Normalizer,
    resolver: KeyResolver,
    merger: Merger<DefaultPolicy>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            normalizer: Normalizer::from_config(&config.normalize)?,
            resolver: KeyResolver::from_config(&config.dedup),
            merger: Merger::with_policy(DefaultPolicy::from_config(&config.survivorship)),
        })
    }

    /// Normalize, key, merge and project `raw` without touching the filesystem.
    pub fn reconcile(&self, raw: &[RawSourceRecord]) -> Result<Reconciled> {
        let normalized = self.normalizer.normalize_all(raw);
        info!(records = normalized.len(), "normalized source records");

        let groups = self.resolver.group(&normalized);
        let duplicates = groups.iter().filter(|g| g.members.len() > 1).count();
        let (isbn_keyed, fingerprint_keyed) = count_by_strategy(&groups);
        info!(
            groups = groups.len(),
            duplicate_groups = duplicates,
            isbn_keyed,
            fingerprint_keyed,
            "resolved dedup keys"
        );

        let canonical = self.merger.merge(&groups, &normalized)?;
        info!(canonical = canonical.len(), "merged canonical records");

        let keys = self.resolver.resolve_keys(&normalized);
        let details = build_details(&normalized, &keys)?;

        Ok(Reconciled {
            normalized,
            canonical,
            details,
        })
    }

    /// Full batch: read both landing files, reconcile, check, and write artifacts.
    pub fn run(&self, config: &AppConfig, options: RunOptions) -> Result<RunOutcome> {
        let sources = [
            (SourceKind::CatalogScrape, config.scrape_path()),
            (SourceKind::BibliographicApi, config.api_path()),
        ];

        let mut raw = Vec::new();
        let mut manifests: Vec<SourceManifest> = Vec::with_capacity(sources.len());
        for (source, path) in &sources {
            let batch = read_source(path, *source)?;
            info!(
                source = %source,
                path = %path.display(),
                rows = batch.records.len(),
                "loaded landing source"
            );
            raw.extend(batch.records);
            manifests.push(batch.manifest);
        }

        let reconciled = self.reconcile(&raw)?;
        let report = build_report(
            &reconciled.canonical,
            &reconciled.details,
            raw.len(),
            &manifests,
            RunStamp::now(),
        );

        for check in report.checks.iter().filter(|c| !c.passed && !c.blocking) {
            warn!(check = %check.name, detail = %check.detail, "quality check failed");
        }
        let failed: Vec<String> = report
            .failed_blocking_checks()
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect();
        if !failed.is_empty() {
            return Err(ResolveError::MergeInvariant(failed.join("; ")));
        }

        info!(
            run_id = %report.run_id,
            canonical = report.record_count,
            duplicates = report.duplicate_count,
            pct_valid_isbn13 = report.pct_valid_isbn13,
            "quality report built"
        );

        let artifacts = if options.dry_run {
            info!("dry run, no artifacts written");
            None
        } else {
            let paths = ArtifactPaths::new(&config.standard_dir(), &config.docs_dir());
            write_artifacts(&paths, &reconciled.canonical, &reconciled.details, &report)?;
            Some(paths)
        };

        Ok(RunOutcome {
            reconciled,
            report,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape(row: usize) -> RawSourceRecord {
        RawSourceRecord::new(SourceKind::CatalogScrape, "goodreads_books.json", row)
    }

    fn api(row: usize) -> RawSourceRecord {
        RawSourceRecord::new(SourceKind::BibliographicApi, "googlebooks_books.csv", row)
    }

    #[test]
    fn test_reconcile_merges_across_sources() {
        let raw = vec![
            scrape(1)
                .with_attr("title", "Sapiens")
                .with_attr("author", "Yuval Noah Harari")
                .with_attr("isbn13", "9780062316097")
                .with_attr("rating", 4.39),
            api(1)
                .with_attr("title", "Sapiens: A Brief History of Humankind")
                .with_attr("authors", "Yuval Noah Harari")
                .with_attr("isbn13", "978-0-06-231609-7")
                .with_attr("language", "en")
                .with_attr("publisher", "Harper"),
        ];

        let out = Pipeline::new().reconcile(&raw).unwrap();
        assert_eq!(out.details.len(), 2);
        assert_eq!(out.canonical.len(), 1);

        let book = &out.canonical[0];
        assert_eq!(book.dup_key, "9780062316097");
        assert_eq!(book.winning_source, SourceKind::BibliographicApi);
        assert_eq!(book.attrs.rating, Some(4.39));
        assert_eq!(book.attrs.authors, vec!["Yuval Noah Harari"]);
        assert_eq!(book.member_count, 2);
    }

    #[test]
    fn test_reconcile_empty_input() {
        let out = Pipeline::new().reconcile(&[]).unwrap();
        assert!(out.canonical.is_empty());
        assert!(out.details.is_empty());
    }
}
