//! ISBN normalization, checksum validation and extraction from free text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IsbnError {
    #[error("ISBN must have 10 or 13 characters, got {0}")]
    Length(usize),
    #[error("ISBN contains invalid characters")]
    Characters,
    #[error("ISBN checksum does not match")]
    Checksum,
}

/// A validated ISBN, stored in its 13-digit form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Isbn(String);

/// Strip separators and upper-case the check character
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let value = match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

pub fn is_valid_isbn13(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    if !(isbn.starts_with("978") || isbn.starts_with("979")) {
        return false;
    }

    let sum: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let digit = (b - b'0') as u32;
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();
    sum % 10 == 0
}

fn isbn13_check_digit(first12: &str) -> char {
    let sum: u32 = first12
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = (b - b'0') as u32;
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();
    let check = (10 - sum % 10) % 10;
    char::from(b'0' + check as u8)
}

fn isbn10_check_digit(first9: &str) -> char {
    let sum: u32 = first9
        .bytes()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * (10 - i as u32))
        .sum();
    match (11 - sum % 11) % 11 {
        10 => 'X',
        d => char::from(b'0' + d as u8),
    }
}

/// Convert a valid ISBN-10 to its ISBN-13 form
pub fn to_isbn13(isbn10: &str) -> Option<String> {
    let normalized = normalize(isbn10);
    if normalized.len() != 10 || !is_valid_isbn10(&normalized) {
        return None;
    }
    let first12 = format!("978{}", &normalized[..9]);
    let check = isbn13_check_digit(&first12);
    Some(format!("{}{}", first12, check))
}

impl Isbn {
    pub fn parse(raw: &str) -> Result<Self, IsbnError> {
        let normalized = normalize(raw);
        match normalized.len() {
            10 => {
                if !normalized[..9].bytes().all(|b| b.is_ascii_digit()) {
                    return Err(IsbnError::Characters);
                }
                to_isbn13(&normalized).map(Isbn).ok_or(IsbnError::Checksum)
            }
            13 => {
                if !normalized.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(IsbnError::Characters);
                }
                if !is_valid_isbn13(&normalized) {
                    return Err(IsbnError::Checksum);
                }
                Ok(Isbn(normalized))
            }
            other => Err(IsbnError::Length(other)),
        }
    }

    pub fn isbn13(&self) -> &str {
        &self.0
    }

    /// ISBN-10 form, which only exists for the 978 prefix
    pub fn isbn10(&self) -> Option<String> {
        if !self.0.starts_with("978") {
            return None;
        }
        let first9 = &self.0[3..12];
        Some(format!("{}{}", first9, isbn10_check_digit(first9)))
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Isbn {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Isbn::parse(s)
    }
}

static ISBN_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:97[89][\s-]?)?(?:\d[\s-]?){9}[\dX]\b").expect("valid ISBN regex")
});

/// Find every valid ISBN mentioned in a block of text, in order of appearance
pub fn find_in_text(text: &str) -> Vec<Isbn> {
    let mut found: Vec<Isbn> = Vec::new();
    for m in ISBN_CANDIDATE.find_iter(text) {
        if let Ok(isbn) = Isbn::parse(m.as_str()) {
            if !found.contains(&isbn) {
                found.push(isbn);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("978-2-07-040850-4"), "9782070408504");
        assert_eq!(normalize("0 8044 2957 x"), "080442957X");
    }

    #[test]
    fn test_checksums() {
        assert!(is_valid_isbn10("0306406152"));
        assert!(is_valid_isbn10("080442957X"));
        assert!(!is_valid_isbn10("0306406153"));
        assert!(is_valid_isbn13("9780306406157"));
        assert!(!is_valid_isbn13("9780306406158"));
        // valid mod-10 sum but not a bookland prefix
        assert!(!is_valid_isbn13("4006381333931"));
    }

    #[test]
    fn test_parse_isbn10_converts_to_13() {
        let isbn = Isbn::parse("0-306-40615-2").unwrap();
        assert_eq!(isbn.isbn13(), "9780306406157");
        assert_eq!(isbn.isbn10().as_deref(), Some("0306406152"));
    }

    #[test]
    fn test_to_isbn13() {
        assert_eq!(to_isbn13("0-306-40615-2").as_deref(), Some("9780306406157"));
        assert_eq!(to_isbn13("0306406153"), None);
        assert_eq!(to_isbn13("9780306406157"), None);
    }

    #[test]
    fn test_parse_isbn10_with_x_check() {
        let isbn = Isbn::parse("080442957X").unwrap();
        assert_eq!(isbn.isbn13(), "9780804429573");
        assert_eq!(isbn.isbn10().as_deref(), Some("080442957X"));
    }

    #[test]
    fn test_979_has_no_isbn10() {
        let isbn = Isbn::parse("979-10-90636-07-1").unwrap();
        assert_eq!(isbn.isbn10(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Isbn::parse("12345"), Err(IsbnError::Length(5)));
        assert_eq!(Isbn::parse("97803064061X7"), Err(IsbnError::Characters));
        assert_eq!(Isbn::parse("9780306406158"), Err(IsbnError::Checksum));
    }

    #[test]
    fn test_find_in_text() {
        let text = "Printed in USA\nISBN 978-0-306-40615-7\nalso ISBN-10: 0306406152 and 123456789";
        let found = find_in_text(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].isbn13(), "9780306406157");
    }
}
