//! Field-level normalizers. Every function degrades to `None` (or an empty list)
//! instead of failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::identifiers::{strip_isbn, validate_isbn13};

static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'([^']*)'|"([^"]*)"|([^,'"]+)"#).expect("valid regex"));
static ISBN10_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9}[0-9X]$").expect("valid regex"));

const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Numbers shorter than this are not padded into an ISBN-10.
const ISBN10_MIN_NUMERIC_DIGITS: usize = 7;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scalar JSON value rendered as trimmed text; arrays, objects and blanks are absent.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => collapse_whitespace(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Display title and its matching-only lowercase form.
pub fn normalize_title(value: &Value) -> Option<(String, String)> {
    let display = value_text(value)?;
    let normalized = display.to_lowercase();
    Some((display, normalized))
}

/// Splits a list-valued attribute. Arrays map element-wise; strings split on
/// `separators`; a bracketed list literal (`["A", "B"]` or `['A', 'B']`) is unwrapped.
pub fn split_list(value: &Value, separators: &[String]) -> Vec<String> {
    let pieces: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(inner) = trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                match serde_json::from_str::<Vec<Value>>(trimmed) {
                    Ok(items) => items.iter().filter_map(value_text).collect(),
                    Err(_) => split_list_literal(inner),
                }
            } else {
                split_on_any(trimmed, separators)
            }
        }
        other => value_text(other).into_iter().collect(),
    };

    pieces
        .iter()
        .map(|piece| collapse_whitespace(piece))
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Items of a non-JSON list literal. Quoted items keep their commas; bare
/// text between quotes splits on commas.
fn split_list_literal(inner: &str) -> Vec<String> {
    LIST_ITEM_RE
        .captures_iter(inner)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|item| item.as_str().trim().to_string())
        .collect()
}

fn split_on_any(s: &str, separators: &[String]) -> Vec<String> {
    let mut pieces = vec![s.to_string()];
    for sep in separators.iter().filter(|sep| !sep.is_empty()) {
        pieces = pieces
            .iter()
            .flat_map(|piece| piece.split(sep.as_str()).map(str::to_string))
            .collect();
    }
    pieces
}

fn isbn_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v.to_string()),
        Value::String(s) => Some(strip_isbn(s)),
        _ => None,
    }
}

/// Checksum-valid 13-digit ISBN or absent.
pub fn normalize_isbn13(value: &Value) -> Option<String> {
    isbn_text(value).filter(|s| validate_isbn13(s))
}

/// A 10-character ISBN shape; the checksum is not enforced here. Numeric JSON
/// values get back the leading zeros the number dropped.
pub fn normalize_isbn10(value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(n) => {
            let digits = n.as_u64()?.to_string();
            if (ISBN10_MIN_NUMERIC_DIGITS..10).contains(&digits.len()) {
                format!("{digits:0>10}")
            } else {
                digits
            }
        }
        other => isbn_text(other)?,
    };
    Some(text).filter(|s| ISBN10_SHAPE_RE.is_match(s))
}

/// Parses common date spellings into `YYYY-MM-DD`.
pub fn parse_date(value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(n) => n.as_u64()?.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(&text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            let caps = YEAR_MONTH_RE.captures(&text)?;
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 1)
        })
        .or_else(|| {
            let caps = YEAR_RE.captures(&text)?;
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, 1, 1)
        })?;

    Some(date.format("%Y-%m-%d").to_string())
}

/// Lowercase, `_` → `-`, truncated to `max_len` characters.
pub fn normalize_language(value: &Value, max_len: usize) -> Option<String> {
    let text = value_text(value)?;
    let tag: String = text
        .to_lowercase()
        .replace('_', "-")
        .chars()
        .take(max_len)
        .collect();
    let tag = tag.trim_end_matches('-').to_string();
    if tag.is_empty() { None } else { Some(tag) }
}

/// Three ASCII letters, uppercased.
pub fn normalize_currency(value: &Value) -> Option<String> {
    let code = value_text(value)?.to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

/// Non-negative finite number from a JSON number or a numeric string.
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
                .chars()
                .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if number.is_finite() && number >= 0.0 {
        Some(number)
    } else {
        None
    }
}

/// Non-negative integral count.
pub fn parse_count(value: &Value) -> Option<u64> {
    if let Value::Number(n) = value
        && let Some(count) = n.as_u64()
    {
        return Some(count);
    }
    let number = parse_number(value)?;
    if number.fract() == 0.0 && number <= u64::MAX as f64 {
        Some(number as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seps() -> Vec<String> {
        vec![";".to_string(), "|".to_string(), ",".to_string()]
    }

    #[test]
    fn test_normalize_title() {
        let (display, normalized) = normalize_title(&json!("  The   Art of\tWar ")).unwrap();
        assert_eq!(display, "The Art of War");
        assert_eq!(normalized, "the art of war");
        assert!(normalize_title(&json!("   ")).is_none());
    }

    #[test]
    fn test_split_list_variants() {
        assert_eq!(
            split_list(&json!("Ada Lovelace;  Charles Babbage"), &seps()),
            vec!["Ada Lovelace", "Charles Babbage"]
        );
        assert_eq!(split_list(&json!(["A", " ", "B"]), &seps()), vec!["A", "B"]);
        assert_eq!(split_list(&json!("['Fiction', 'History']"), &seps()), vec!["Fiction", "History"]);
        assert_eq!(split_list(&json!("[\"X\", \"Y\"]"), &seps()), vec!["X", "Y"]);
        assert_eq!(
            split_list(&json!("['Harari, Yuval Noah', 'Gaiman, Neil']"), &seps()),
            vec!["Harari, Yuval Noah", "Gaiman, Neil"]
        );
        assert_eq!(
            split_list(&json!("[\"O'Brien, Flann\", 'Joyce, James']"), &seps()),
            vec!["O'Brien, Flann", "Joyce, James"]
        );
        assert_eq!(split_list(&json!("[Dune, Emma]"), &seps()), vec!["Dune", "Emma"]);
        assert!(split_list(&json!(" ; "), &seps()).is_empty());
    }

    #[test]
    fn test_isbn_normalizers() {
        assert_eq!(normalize_isbn13(&json!("978-0-14-312774-1")).as_deref(), Some("9780143127741"));
        assert_eq!(normalize_isbn13(&json!(9780143127741u64)).as_deref(), Some("9780143127741"));
        assert_eq!(normalize_isbn13(&json!("9780143127742")), None);
        assert_eq!(normalize_isbn10(&json!("0-306-40615-3")).as_deref(), Some("0306406153"));
        assert_eq!(normalize_isbn10(&json!("007462542x")).as_deref(), Some("007462542X"));
        assert_eq!(normalize_isbn10(&json!("030640615")), None);
        assert_eq!(normalize_isbn10(&json!(306406152u64)).as_deref(), Some("0306406152"));
        assert_eq!(normalize_isbn10(&json!(74625422u64)).as_deref(), Some("0074625422"));
        assert_eq!(normalize_isbn10(&json!(2005883u64)).as_deref(), Some("0002005883"));
        assert_eq!(normalize_isbn10(&json!(4062u64)), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date(&json!("2015-02-10")).as_deref(), Some("2015-02-10"));
        assert_eq!(parse_date(&json!("2015/2/10")).as_deref(), Some("2015-02-10"));
        assert_eq!(parse_date(&json!("10/02/2015")).as_deref(), Some("2015-02-10"));
        assert_eq!(parse_date(&json!("February 10, 2015")).as_deref(), Some("2015-02-10"));
        assert_eq!(parse_date(&json!("2015-02-10T08:00:00Z")).as_deref(), Some("2015-02-10"));
        assert_eq!(parse_date(&json!("2015-02")).as_deref(), Some("2015-02-01"));
        assert_eq!(parse_date(&json!("2015")).as_deref(), Some("2015-01-01"));
        assert_eq!(parse_date(&json!(2015)).as_deref(), Some("2015-01-01"));
        assert_eq!(parse_date(&json!("2015-13")), None);
        assert_eq!(parse_date(&json!("soon")), None);
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(&json!("EN"), 5).as_deref(), Some("en"));
        assert_eq!(normalize_language(&json!("en_US"), 5).as_deref(), Some("en-us"));
        assert_eq!(normalize_language(&json!("pt-BR-x-extra"), 5).as_deref(), Some("pt-br"));
        assert_eq!(normalize_language(&json!(""), 5), None);
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(&json!(" usd ")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(&json!("US$")), None);
        assert_eq!(normalize_currency(&json!("EURO")), None);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number(&json!(4.25)), Some(4.25));
        assert_eq!(parse_number(&json!("$12.99")), Some(12.99));
        assert_eq!(parse_number(&json!("1,234.5")), Some(1234.5));
        assert_eq!(parse_number(&json!("-3")), None);
        assert_eq!(parse_number(&json!("n/a")), None);
        assert_eq!(parse_count(&json!("12,345")), Some(12345));
        assert_eq!(parse_count(&json!(17)), Some(17));
        assert_eq!(parse_count(&json!("3.5")), None);
    }
}
