use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifiers::isbn::Isbn;

/// Digit runs, optionally hyphen-grouped, with an optional trailing `X` check character.
static DIGIT_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9](?:-?[0-9])*(?:-?[Xx])?").expect("valid regex"));

static ISBN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)isbn(-13|-10)?[:\s]?([0-9Xx\-\s]{10,20})").expect("valid regex")
});

/// First 10-character and first 13-digit run found in `text`, unvalidated.
pub fn extract_isbns(text: &str) -> (Option<String>, Option<String>) {
    let mut isbn10 = None;
    let mut isbn13 = None;

    for m in DIGIT_RUN_REGEX.find_iter(text) {
        let run: String = m.as_str().chars().filter(|c| *c != '-').collect();
        let has_check_x = run.ends_with(['X', 'x']);
        match run.len() {
            10 if isbn10.is_none() => isbn10 = Some(run.to_uppercase()),
            13 if isbn13.is_none() && !has_check_x => isbn13 = Some(run),
            _ => {}
        }
        if isbn10.is_some() && isbn13.is_some() {
            break;
        }
    }

    (isbn10, isbn13)
}

/// First checksum-valid ISBN introduced by an `ISBN` label.
pub fn extract_isbn_from_text(text: &str) -> Option<Isbn> {
    ISBN_REGEX
        .captures_iter(text)
        .filter_map(|m| m.get(2))
        .find_map(|raw| Isbn::parse(raw.as_str().trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_isbns_first_of_each_length() {
        let text = "see 0306406152 or 9780306406157, also 9780143127741 and 007462542X";
        let (isbn10, isbn13) = extract_isbns(text);
        assert_eq!(isbn10.as_deref(), Some("0306406152"));
        assert_eq!(isbn13.as_deref(), Some("9780306406157"));
    }

    #[test]
    fn test_extract_isbns_from_url() {
        let url = "https://books.example.com/isbn/978-0-14-312774-1/sapiens";
        assert_eq!(extract_isbns(url), (None, Some("9780143127741".to_string())));
    }

    #[test]
    fn test_extract_isbns_ignores_other_lengths() {
        let url = "https://www.goodreads.com/book/show/23692271-sapiens?ref=12345678901";
        assert_eq!(extract_isbns(url), (None, None));
    }

    #[test]
    fn test_extract_isbns_uppercases_check_character() {
        assert_eq!(extract_isbns("id 007462542x").0.as_deref(), Some("007462542X"));
    }

    #[test]
    fn test_extract_isbn_from_text() {
        let text = "My book ISBN-13: 978-3-16-148410-0 is great.";
        let isbn = extract_isbn_from_text(text).unwrap();
        assert_eq!(isbn.isbn13, "9783161484100");
    }
}
