use std::collections::HashMap;

use bookfuse_core::NormalizedRecord;
use bookfuse_core::config::{DedupConfig, ISBN13_LEN};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::identifiers::validate_isbn13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    Isbn13,
    Fingerprint,
}

/// Members of one dedup group, as indexes into the normalized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupGroup {
    pub dup_key: String,
    pub strategy: KeyStrategy,
    pub members: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct KeyResolver {
    hex_len: usize,
}

impl Default for KeyResolver {
    fn default() -> Self {
        Self {
            hex_len: DedupConfig::default().fingerprint_hex_len,
        }
    }
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::default().with_hex_len(config.fingerprint_hex_len)
    }

    /// Clamped to `8..=40`; a width of 13 becomes 14 so fallback keys never
    /// take the shape of an ISBN-13.
    pub fn with_hex_len(mut self, hex_len: usize) -> Self {
        self.hex_len = match hex_len.clamp(8, 40) {
            ISBN13_LEN => ISBN13_LEN + 1,
            len => len,
        };
        self
    }

    /// The valid ISBN-13 when present, else a truncated SHA-1 fingerprint.
    pub fn resolve_key(&self, record: &NormalizedRecord) -> String {
        self.resolve(record).0
    }

    fn resolve(&self, record: &NormalizedRecord) -> (String, KeyStrategy) {
        if let Some(isbn13) = record.attrs.isbn13.as_deref()
            && validate_isbn13(isbn13)
        {
            return (isbn13.to_string(), KeyStrategy::Isbn13);
        }

        let digest = Sha1::digest(fingerprint_input(record).as_bytes());
        let mut key = hex::encode(digest);
        key.truncate(self.hex_len);
        (key, KeyStrategy::Fingerprint)
    }

    pub fn resolve_keys(&self, records: &[NormalizedRecord]) -> Vec<String> {
        records.iter().map(|record| self.resolve_key(record)).collect()
    }

    /// Buckets records by key. Groups come out in order of each key's first
    /// appearance; members keep input order.
    pub fn group(&self, records: &[NormalizedRecord]) -> Vec<DedupGroup> {
        let mut groups: Vec<DedupGroup> = Vec::new();
        let mut slot_by_key: HashMap<String, usize> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            let (key, strategy) = self.resolve(record);
            match slot_by_key.get(&key) {
                Some(&slot) => groups[slot].members.push(idx),
                None => {
                    slot_by_key.insert(key.clone(), groups.len());
                    groups.push(DedupGroup {
                        dup_key: key,
                        strategy,
                        members: vec![idx],
                    });
                }
            }
        }

        let degenerate = self.degenerate_key();
        for group in &groups {
            if group.dup_key == degenerate {
                warn!(
                    dup_key = %group.dup_key,
                    members = group.members.len(),
                    "records with no title, authors, publisher or year share one fallback key"
                );
            } else if group.members.len() > 1 {
                debug!(dup_key = %group.dup_key, members = group.members.len(), "duplicate group");
            }
        }

        groups
    }

    /// Fingerprint of a record with every fallback component absent.
    pub fn degenerate_key(&self) -> String {
        let mut key = hex::encode(Sha1::digest(b"|||"));
        key.truncate(self.hex_len);
        key
    }
}

/// Number of ISBN-keyed and fingerprint-keyed groups, in that order.
pub fn count_by_strategy(groups: &[DedupGroup]) -> (usize, usize) {
    let isbn = groups
        .iter()
        .filter(|g| g.strategy == KeyStrategy::Isbn13)
        .count();
    (isbn, groups.len() - isbn)
}

fn fingerprint_input(record: &NormalizedRecord) -> String {
    let mut authors: Vec<String> = record
        .attrs
        .authors
        .iter()
        .map(|author| author.to_lowercase())
        .collect();
    authors.sort();

    let title = record.title_normalized.as_deref().unwrap_or_default();
    let publisher = record
        .attrs
        .publisher
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let year = record
        .attrs
        .publication_year()
        .map(|y| y.to_string())
        .unwrap_or_default();

    format!("{title}|{}|{publisher}|{year}", authors.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookfuse_core::SourceKind;

    fn record(source: SourceKind, row: usize) -> NormalizedRecord {
        NormalizedRecord::new(source, "input", row)
    }

    fn titled(source: SourceKind, row: usize, title: &str, authors: &[&str]) -> NormalizedRecord {
        let mut r = record(source, row);
        r.attrs.title = Some(title.to_string());
        r.title_normalized = Some(title.to_lowercase());
        r.attrs.authors = authors.iter().map(|a| a.to_string()).collect();
        r
    }

    #[test]
    fn test_isbn13_is_the_key() {
        let mut r = titled(SourceKind::CatalogScrape, 1, "Sapiens", &["Yuval Noah Harari"]);
        r.attrs.isbn13 = Some("9780062316097".to_string());
        assert_eq!(KeyResolver::new().resolve_key(&r), "9780062316097");
    }

    #[test]
    fn test_invalid_isbn13_falls_back_to_fingerprint() {
        let mut r = titled(SourceKind::CatalogScrape, 1, "Sapiens", &["Yuval Noah Harari"]);
        r.attrs.isbn13 = Some("9780062316098".to_string());
        let key = KeyResolver::new().resolve_key(&r);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_ignores_author_order_and_case() {
        let resolver = KeyResolver::new();
        let a = titled(SourceKind::CatalogScrape, 1, "Good Omens", &["Terry Pratchett", "Neil Gaiman"]);
        let b = titled(SourceKind::BibliographicApi, 7, "Good Omens", &["neil gaiman", "TERRY PRATCHETT"]);
        assert_eq!(resolver.resolve_key(&a), resolver.resolve_key(&b));
    }

    #[test]
    fn test_fingerprint_uses_publication_year() {
        let resolver = KeyResolver::new();
        let mut a = titled(SourceKind::CatalogScrape, 1, "Dune", &["Frank Herbert"]);
        let mut b = a.clone();
        a.attrs.publication_date = Some("1965-08-01".to_string());
        b.attrs.publication_date = Some("1965-01-01".to_string());
        assert_eq!(resolver.resolve_key(&a), resolver.resolve_key(&b));

        b.attrs.publication_date = Some("1990-09-01".to_string());
        assert_ne!(resolver.resolve_key(&a), resolver.resolve_key(&b));
    }

    #[test]
    fn test_hex_len_is_clamped() {
        let r = titled(SourceKind::CatalogScrape, 1, "Dune", &[]);
        assert_eq!(KeyResolver::new().with_hex_len(4).resolve_key(&r).len(), 8);
        assert_eq!(KeyResolver::new().with_hex_len(64).resolve_key(&r).len(), 40);
    }

    #[test]
    fn test_fingerprint_never_takes_isbn13_width() {
        let r = titled(SourceKind::CatalogScrape, 1, "Dune", &[]);
        let resolver = KeyResolver::new().with_hex_len(13);
        assert_eq!(resolver.resolve_key(&r).len(), 14);
        assert_eq!(resolver.degenerate_key().len(), 14);
    }

    #[test]
    fn test_isbn_and_fingerprint_groups_never_merge() {
        let mut with_isbn = titled(SourceKind::BibliographicApi, 1, "Sapiens", &["Yuval Noah Harari"]);
        with_isbn.attrs.isbn13 = Some("9780062316097".to_string());
        let without = titled(SourceKind::CatalogScrape, 1, "sapiens", &["yuval noah harari"]);

        let groups = KeyResolver::new().group(&[with_isbn, without]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].strategy, KeyStrategy::Isbn13);
        assert_eq!(groups[1].strategy, KeyStrategy::Fingerprint);
        assert_eq!(count_by_strategy(&groups), (1, 1));
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let records = vec![
            titled(SourceKind::CatalogScrape, 1, "B", &[]),
            titled(SourceKind::CatalogScrape, 2, "A", &[]),
            titled(SourceKind::BibliographicApi, 1, "B", &[]),
        ];
        let groups = KeyResolver::new().group(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[1].members, vec![1]);
    }

    #[test]
    fn test_all_absent_tuples_collapse() {
        let resolver = KeyResolver::new();
        let records = vec![
            record(SourceKind::CatalogScrape, 1),
            record(SourceKind::BibliographicApi, 1),
        ];
        let groups = resolver.group(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].dup_key, resolver.degenerate_key());
        assert_eq!(groups[0].members, vec![0, 1]);
    }
}
