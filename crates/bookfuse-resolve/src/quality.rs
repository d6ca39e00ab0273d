//! Quality metrics over the canonical set, plus the named checks a run must pass.

use std::collections::{BTreeMap, HashSet};

use bookfuse_core::{
    CanonicalField, CanonicalRecord, DetailRecord, QualityCheck, QualityReport, SourceKind,
    SourceManifest,
};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::identifiers::validate_isbn13;

static BCP47_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{1,8})*$").expect("valid regex"));
static ISO4217_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));

pub const CHECK_DUP_KEY_UNIQUE: &str = "dup_key_unique";
pub const CHECK_DETAIL_COUNT: &str = "detail_count_matches_input";
pub const CHECK_CANONICAL_COUNT: &str = "canonical_count_matches_groups";
pub const CHECK_DATES: &str = "dates_iso8601";
pub const CHECK_LANGUAGES: &str = "languages_bcp47";
pub const CHECK_CURRENCIES: &str = "currencies_iso4217";
pub const CHECK_RATING_RANGE: &str = "rating_in_range";
pub const CHECK_PRICE_NON_NEGATIVE: &str = "price_amount_non_negative";
pub const CHECK_TITLE_PRESENT: &str = "title_present";
pub const CHECK_ROWS_READABLE: &str = "landing_rows_readable";

/// Inclusive bounds of a catalog rating.
pub const RATING_RANGE: (f64, f64) = (0.0, 5.0);

/// Identity of the run a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl RunStamp {
    pub fn now() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            generated_at: Utc::now(),
        }
    }
}

pub fn build_report(
    canonical: &[CanonicalRecord],
    details: &[DetailRecord],
    input_record_count: usize,
    sources: &[SourceManifest],
    stamp: RunStamp,
) -> QualityReport {
    let total = canonical.len();
    let pct_present = |field: CanonicalField| {
        percentage(canonical.iter().filter(|r| !r.attrs.is_absent(field)).count(), total)
    };
    let valid_isbn13 = canonical
        .iter()
        .filter(|r| r.attrs.isbn13.as_deref().is_some_and(validate_isbn13))
        .count();

    let null_rate = CanonicalField::ALL
        .iter()
        .map(|field| {
            let absent = canonical.iter().filter(|r| r.attrs.is_absent(*field)).count();
            (field.name().to_string(), percentage(absent, total))
        })
        .collect();

    let mut rows_per_source: BTreeMap<String, usize> = SourceKind::ALL
        .iter()
        .map(|source| (source.to_string(), 0))
        .collect();
    for detail in details {
        *rows_per_source.entry(detail.source.to_string()).or_default() += 1;
    }

    QualityReport {
        run_id: stamp.run_id,
        generated_at: stamp.generated_at,
        input_record_count,
        rejected_row_count: sources.iter().map(|s| s.rejected_rows).sum(),
        record_count: total,
        duplicate_count: input_record_count.saturating_sub(total),
        pct_valid_isbn13: percentage(valid_isbn13, total),
        pct_title: pct_present(CanonicalField::Title),
        pct_publication_date: pct_present(CanonicalField::PublicationDate),
        pct_language: pct_present(CanonicalField::Language),
        pct_price_currency: pct_present(CanonicalField::PriceCurrency),
        null_rate,
        rows_per_source,
        checks: run_checks(canonical, details, input_record_count, sources),
        sources: sources.to_vec(),
    }
}

/// `part / total` as a percentage rounded to two decimals; `0.0` when `total` is zero.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 * 100.0 / total as f64;
    (pct * 100.0).round() / 100.0
}

pub fn run_checks(
    canonical: &[CanonicalRecord],
    details: &[DetailRecord],
    input_record_count: usize,
    sources: &[SourceManifest],
) -> Vec<QualityCheck> {
    let mut checks = Vec::with_capacity(10);

    let mut seen = HashSet::new();
    let repeated: Vec<&str> = canonical
        .iter()
        .filter(|r| !seen.insert(r.dup_key.as_str()))
        .map(|r| r.dup_key.as_str())
        .collect();
    checks.push(QualityCheck::new(
        CHECK_DUP_KEY_UNIQUE,
        repeated.is_empty(),
        true,
        if repeated.is_empty() {
            format!("{} distinct keys", canonical.len())
        } else {
            format!("repeated keys: {}", repeated.join(", "))
        },
    ));

    checks.push(QualityCheck::new(
        CHECK_DETAIL_COUNT,
        details.len() == input_record_count,
        true,
        format!("{} detail rows for {input_record_count} inputs", details.len()),
    ));

    let groups: HashSet<&str> = details.iter().map(|d| d.dup_key.as_str()).collect();
    checks.push(QualityCheck::new(
        CHECK_CANONICAL_COUNT,
        canonical.len() == groups.len(),
        true,
        format!("{} canonical rows for {} groups", canonical.len(), groups.len()),
    ));

    checks.push(format_check(
        CHECK_DATES,
        canonical.iter().filter_map(|r| r.attrs.publication_date.as_deref()),
        |date| NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok(),
    ));
    checks.push(format_check(
        CHECK_LANGUAGES,
        canonical.iter().filter_map(|r| r.attrs.language.as_deref()),
        |tag| BCP47_RE.is_match(tag),
    ));
    checks.push(format_check(
        CHECK_CURRENCIES,
        canonical.iter().filter_map(|r| r.attrs.price_currency.as_deref()),
        |code| ISO4217_RE.is_match(code),
    ));

    let (low, high) = RATING_RANGE;
    checks.push(value_check(
        CHECK_RATING_RANGE,
        canonical.iter().filter_map(|r| r.attrs.rating),
        |rating| (low..=high).contains(&rating),
    ));
    checks.push(value_check(
        CHECK_PRICE_NON_NEGATIVE,
        canonical.iter().filter_map(|r| r.attrs.price_amount),
        |amount| amount >= 0.0,
    ));

    let untitled: Vec<&str> = canonical
        .iter()
        .filter(|r| r.attrs.title.is_none())
        .map(|r| r.dup_key.as_str())
        .collect();
    checks.push(QualityCheck::new(
        CHECK_TITLE_PRESENT,
        untitled.is_empty(),
        false,
        match untitled.as_slice() {
            [] => format!("{} canonical rows titled", canonical.len()),
            [first, ..] => format!("{} rows without a title, e.g. {first}", untitled.len()),
        },
    ));

    let rejected: Vec<String> = sources
        .iter()
        .filter(|s| s.rejected_rows > 0)
        .map(|s| format!("{} rejected {}", s.source, s.rejected_rows))
        .collect();
    checks.push(QualityCheck::new(
        CHECK_ROWS_READABLE,
        rejected.is_empty(),
        false,
        if rejected.is_empty() {
            format!("{} sources fully read", sources.len())
        } else {
            rejected.join(", ")
        },
    ));

    checks
}

fn format_check<'a>(
    name: &str,
    values: impl Iterator<Item = &'a str>,
    valid: impl Fn(&str) -> bool,
) -> QualityCheck {
    let mut checked = 0usize;
    let mut invalid: Vec<&str> = Vec::new();
    for value in values {
        checked += 1;
        if !valid(value) {
            invalid.push(value);
        }
    }

    let detail = match invalid.as_slice() {
        [] => format!("{checked} values checked"),
        [first, ..] => format!("{} of {checked} invalid, e.g. {first:?}", invalid.len()),
    };
    QualityCheck::new(name, invalid.is_empty(), false, detail)
}

fn value_check(
    name: &str,
    values: impl Iterator<Item = f64>,
    valid: impl Fn(f64) -> bool,
) -> QualityCheck {
    let mut checked = 0usize;
    let mut invalid: Vec<f64> = Vec::new();
    for value in values {
        checked += 1;
        if !valid(value) {
            invalid.push(value);
        }
    }

    let detail = match invalid.as_slice() {
        [] => format!("{checked} values checked"),
        [first, ..] => format!("{} of {checked} out of range, e.g. {first}", invalid.len()),
    };
    QualityCheck::new(name, invalid.is_empty(), false, detail)
}
