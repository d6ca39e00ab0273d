use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    pub isbn10: Option<String>,
    pub formatted: String,
}

/// Removes hyphens and whitespace; a trailing `x` check character is uppercased.
pub fn strip_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn digit_values(s: &str) -> Option<Vec<u32>> {
    s.chars().map(|c| c.to_digit(10)).collect()
}

fn isbn13_check_digit(first12: &[u32]) -> u32 {
    let sum: u32 = first12
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

fn isbn10_check_char(first9: &[u32]) -> char {
    let sum: u32 = first9
        .iter()
        .enumerate()
        .map(|(i, &d)| (10 - i as u32) * d)
        .sum();
    match (11 - sum % 11) % 11 {
        10 => 'X',
        check => char::from_digit(check, 10).unwrap_or('0'),
    }
}

/// Exactly 13 digits whose last digit matches the (1,3)-weighted checksum.
pub fn validate_isbn13(s: &str) -> bool {
    if s.len() != 13 {
        return false;
    }
    match digit_values(s) {
        Some(digits) => isbn13_check_digit(&digits[..12]) == digits[12],
        None => false,
    }
}

/// Ten characters (last may be `X`/`x` = 10) whose position-weighted sum is divisible by 11.
pub fn validate_isbn10(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, c) in chars.iter().enumerate() {
        let value = match c {
            'X' | 'x' if i == 9 => 10,
            c => match c.to_digit(10) {
                Some(d) => d,
                None => return false,
            },
        };
        sum += (i as u32 + 1) * value;
    }
    sum % 11 == 0
}

/// `978` + the first nine digits + a recomputed ISBN-13 check digit.
pub fn convert_isbn10_to_13(s: &str) -> Option<String> {
    if !validate_isbn10(s) {
        return None;
    }
    let mut digits: Vec<u32> = vec![9, 7, 8];
    digits.extend(digit_values(&s[..9])?);
    let check = isbn13_check_digit(&digits);
    digits.push(check);
    Some(digits.iter().map(|d| d.to_string()).collect())
}

/// Only `978`-prefixed ISBN-13s have an ISBN-10 form.
pub fn convert_isbn13_to_10(s: &str) -> Option<String> {
    if !validate_isbn13(s) || !s.starts_with("978") {
        return None;
    }
    let first9 = digit_values(&s[3..12])?;
    let mut out: String = first9.iter().map(|d| d.to_string()).collect();
    out.push(isbn10_check_char(&first9));
    Some(out)
}

fn format_isbn13(s: &str) -> String {
    // 978-X-XXXX-XXXX-X grouping; real registrant ranges are not consulted
    if s.len() == 13 {
        format!("{}-{}-{}-{}-{}", &s[0..3], &s[3..4], &s[4..8], &s[8..12], &s[12..13])
    } else {
        s.to_string()
    }
}

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let stripped = strip_isbn(input);

        let (isbn13, isbn10) = if validate_isbn13(&stripped) {
            let isbn10 = convert_isbn13_to_10(&stripped);
            (stripped, isbn10)
        } else if let Some(isbn13) = convert_isbn10_to_13(&stripped) {
            (isbn13, Some(stripped))
        } else {
            return Err(ResolveError::InvalidIsbn(input.to_string()));
        };

        let formatted = format_isbn13(&isbn13);
        Ok(Self {
            raw: input.to_string(),
            isbn13,
            isbn10,
            formatted,
        })
    }

    /// Whether the parsed input was written as an ISBN-10.
    pub fn parsed_from_isbn10(&self) -> bool {
        strip_isbn(&self.raw).len() == 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_remembers_input_length() {
        assert!(Isbn::parse("0-306-40615-2").unwrap().parsed_from_isbn10());
        assert!(!Isbn::parse("978-0-306-40615-7").unwrap().parsed_from_isbn10());
    }

    #[test]
    fn valid_isbn13() {
        assert!(validate_isbn13("9780306406157"));
        assert!(validate_isbn13("9780143127741"));
        assert!(!validate_isbn13("9780306406158"));
        assert!(!validate_isbn13("978030640615"));
        assert!(!validate_isbn13("978030640615X"));
    }

    #[test]
    fn valid_isbn10() {
        assert!(validate_isbn10("0306406152"));
        assert!(validate_isbn10("007462542X"));
        assert!(validate_isbn10("007462542x"));
        assert!(!validate_isbn10("0306406153"));
        assert!(!validate_isbn10("X306406152"));
        assert!(!validate_isbn10("030640615"));
    }

    #[test]
    fn convert_isbn10_to_13_known_value() {
        assert_eq!(convert_isbn10_to_13("0306406152").as_deref(), Some("9780306406157"));
        assert_eq!(convert_isbn10_to_13("0306406153"), None);
    }

    #[test]
    fn convert_isbn13_to_10_known_value() {
        assert_eq!(convert_isbn13_to_10("9780306406157").as_deref(), Some("0306406152"));
        assert_eq!(convert_isbn13_to_10("9791032305690"), None);
    }

    #[test]
    fn strip_removes_hyphens_and_spaces() {
        assert_eq!(strip_isbn(" 978-0-306 40615-7 "), "9780306406157");
        assert_eq!(strip_isbn("0-07-462542-x"), "007462542X");
    }

    #[test]
    fn parse_isbn13_with_hyphens() {
        let isbn = Isbn::parse("978-0-306-40615-7").unwrap();
        assert_eq!(isbn.isbn13, "9780306406157");
        assert_eq!(isbn.isbn10.as_deref(), Some("0306406152"));
        assert_eq!(isbn.formatted, "978-0-3064-0615-7");
    }

    #[test]
    fn parse_isbn10_with_x_check() {
        let isbn = Isbn::parse("007462542X").unwrap();
        assert_eq!(isbn.isbn10.as_deref(), Some("007462542X"));
        assert!(validate_isbn13(&isbn.isbn13));
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        assert!(matches!(
            Isbn::parse("9780306406158"),
            Err(ResolveError::InvalidIsbn(_))
        ));
    }

    fn isbn13_from(first12: &[u32]) -> String {
        let mut digits = first12.to_vec();
        digits.push(isbn13_check_digit(first12));
        digits.iter().map(|d| d.to_string()).collect()
    }

    fn isbn10_from(first9: &[u32]) -> String {
        let mut s: String = first9.iter().map(|d| d.to_string()).collect();
        s.push(isbn10_check_char(first9));
        s
    }

    proptest! {
        #[test]
        fn every_checksummed_isbn13_validates(first12 in proptest::collection::vec(0u32..10, 12)) {
            prop_assert!(validate_isbn13(&isbn13_from(&first12)));
        }

        #[test]
        fn single_digit_mutation_breaks_isbn13(
            first12 in proptest::collection::vec(0u32..10, 12),
            pos in 0usize..13,
            delta in 1u32..10,
        ) {
            let valid = isbn13_from(&first12);
            let mut digits: Vec<u32> = valid.chars().filter_map(|c| c.to_digit(10)).collect();
            digits[pos] = (digits[pos] + delta) % 10;
            let mutated: String = digits.iter().map(|d| d.to_string()).collect();
            prop_assert!(!validate_isbn13(&mutated));
        }

        #[test]
        fn converted_isbn10_validates_as_isbn13(first9 in proptest::collection::vec(0u32..10, 9)) {
            let isbn10 = isbn10_from(&first9);
            prop_assert!(validate_isbn10(&isbn10));
            let isbn13 = convert_isbn10_to_13(&isbn10).unwrap();
            prop_assert!(validate_isbn13(&isbn13));
            prop_assert_eq!(convert_isbn13_to_10(&isbn13), Some(isbn10));
        }
    }
}
