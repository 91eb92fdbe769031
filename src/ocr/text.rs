//! Regex heuristics extracting bibliographic fields from raw cover text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::isbn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParsedCover {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
}

static BY_AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:written\s+)?by\s+(.{3,80})$").expect("valid author regex")
});

static PUBLISHER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(press|books|publishing|publishers|house|editions?|verlag)\b")
        .expect("valid publisher regex")
});

static NAME_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Z][a-z'\-]+|[A-Z]\.)(?:\s+(?:[A-Z][a-z'\-]+|[A-Z]\.)){1,3}$")
        .expect("valid name regex")
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(isbn|bestsell|a novel|new york times|copyright|©|\$\s?\d|£\s?\d|€\s?\d|www\.|\.com|edition|volume|vol\.|introduction by|foreword by|translated by)",
    )
    .expect("valid noise regex")
});

fn clean(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn alphabetic_ratio(line: &str) -> f64 {
    let total = line.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return 0.0;
    }
    let alpha = line.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / total as f64
}

/// Turn `"THE HOBBIT"` into `"The Hobbit"`; mixed-case lines are kept as-is
fn tidy_case(line: &str) -> String {
    if line.chars().any(|c| c.is_lowercase()) {
        return line.to_string();
    }
    line.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract title, author, ISBN and publisher from OCR text of a cover
pub fn parse_cover_text(text: &str) -> ParsedCover {
    let lines: Vec<String> = text
        .lines()
        .map(clean)
        .filter(|l| !l.is_empty())
        .collect();

    let isbn = isbn::find_in_text(text)
        .into_iter()
        .next()
        .map(|i| i.isbn13().to_string());

    let mut author: Option<String> = None;
    let mut author_line: Option<usize> = None;
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = BY_AUTHOR.captures(line) {
            author = Some(tidy_case(caps[1].trim()));
            author_line = Some(idx);
            break;
        }
    }

    let mut publisher: Option<String> = None;
    let mut publisher_line: Option<usize> = None;
    for (idx, line) in lines.iter().enumerate().rev() {
        if Some(idx) != author_line && PUBLISHER.is_match(line) && line.chars().count() <= 60 {
            publisher = Some(line.clone());
            publisher_line = Some(idx);
            break;
        }
    }

    let is_name_like = |line: &str| NAME_LIKE.is_match(&tidy_case(line)) && !NOISE.is_match(line);

    // Prefer lines that do not read like a person's name, then the most letters
    let title_line = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != author_line && Some(*idx) != publisher_line)
        .filter(|(_, l)| l.chars().count() >= 2 && !NOISE.is_match(l) && alphabetic_ratio(l) > 0.6)
        .max_by_key(|(_, l)| (!is_name_like(l), l.chars().filter(|c| c.is_alphabetic()).count()))
        .map(|(idx, _)| idx);

    if author.is_none() {
        author = lines
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != title_line && Some(*idx) != publisher_line)
            .find(|(_, l)| is_name_like(l))
            .map(|(_, l)| tidy_case(l));
    }

    let title = title_line.map(|idx| tidy_case(&lines[idx]));

    ParsedCover {
        title,
        author,
        isbn,
        publisher,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_line_and_isbn() {
        let text = "THE LEFT HAND OF DARKNESS\nby Ursula K. Le Guin\nAce Books\nISBN 978-0-306-40615-7";
        let parsed = parse_cover_text(text);
        assert_eq!(parsed.author.as_deref(), Some("Ursula K. Le Guin"));
        assert_eq!(parsed.isbn.as_deref(), Some("9780306406157"));
        assert_eq!(parsed.publisher.as_deref(), Some("Ace Books"));
        assert_eq!(parsed.title.as_deref(), Some("The Left Hand Of Darkness"));
    }

    #[test]
    fn test_name_like_author_without_by() {
        let text = "Project Hail Mary\nAndy Weir\nNew York Times Bestselling author of The Martian";
        let parsed = parse_cover_text(text);
        assert_eq!(parsed.author.as_deref(), Some("Andy Weir"));
        assert_eq!(parsed.title.as_deref(), Some("Project Hail Mary"));
        assert_eq!(parsed.isbn, None);
    }

    #[test]
    fn test_uppercase_author_is_tidied() {
        let parsed = parse_cover_text("DUNE\nBY FRANK HERBERT");
        assert_eq!(parsed.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(parsed.title.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(parse_cover_text("  \n \n"), ParsedCover::default());
    }

    #[test]
    fn test_noise_only() {
        let parsed = parse_cover_text("$14.99\nwww.example.com");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.author, None);
    }
}
