//! Title/author candidate ranking from positioned OCR lines

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lines considered after salience ranking
const MAX_RANKED_LINES: usize = 20;
/// Candidates kept per category
const MAX_CANDIDATES: usize = 5;
const MAX_VALUE_CHARS: usize = 200;
const MAX_AUTHOR_CHARS: usize = 80;
const DEFAULT_LANGUAGE: &str = "en";

/// One line of text detected on a cover
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OcrLine {
    pub text: String,
    /// Recognition confidence in `0.0..=1.0`
    pub confidence: f64,
    /// Quadrilateral `[[x1,y1],[x2,y2],[x3,y3],[x4,y4]]` in pixels
    #[serde(default)]
    pub bbox: Vec<[f64; 2]>,
}

impl OcrLine {
    /// Area of the axis-aligned box enclosing `bbox`
    pub fn area(&self) -> f64 {
        if self.bbox.is_empty() {
            return 0.0;
        }
        let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
        let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
        for [x, y] in &self.bbox {
            min_x = min_x.min(*x);
            max_x = max_x.max(*x);
            min_y = min_y.min(*y);
            max_y = max_y.max(*y);
        }
        (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
    }

    fn salience(&self) -> f64 {
        self.confidence * (1.0 + self.area() / 10_000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Candidates {
    pub title_candidates: Vec<Candidate>,
    pub author_candidates: Vec<Candidate>,
    pub language_guess: String,
}

impl Default for Candidates {
    fn default() -> Self {
        Self {
            title_candidates: Vec::new(),
            author_candidates: Vec::new(),
            language_guess: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

fn normalize_line(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_VALUE_CHARS)
        .collect()
}

fn looks_like_authors(text: &str) -> bool {
    text.chars().count() < MAX_AUTHOR_CHARS
        && (text.contains(',') || text.contains(" and ") || text.contains(" & "))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn dedup(items: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|c| !c.value.is_empty() && seen.insert(c.value.to_lowercase()))
        .take(MAX_CANDIDATES)
        .collect()
}

/// Rank OCR lines by `confidence * (1 + area / 10000)` and split the most
/// salient ones into title and author candidates. Short or blank lines still
/// occupy a ranking slot.
pub fn rank_candidates(lines: &[OcrLine]) -> Candidates {
    let mut ranked: Vec<&OcrLine> = lines.iter().collect();
    ranked.sort_by(|a, b| b.salience().total_cmp(&a.salience()));

    let mut titles = Vec::new();
    let mut authors = Vec::new();

    for line in ranked.into_iter().take(MAX_RANKED_LINES) {
        let text = normalize_line(&line.text);
        if text.chars().count() < 3 {
            continue;
        }
        let candidate = Candidate {
            value: text,
            confidence: round3(line.confidence),
        };
        if looks_like_authors(&candidate.value) {
            authors.push(candidate);
        } else {
            titles.push(candidate);
        }
    }

    Candidates {
        title_candidates: dedup(titles),
        author_candidates: dedup(authors),
        language_guess: DEFAULT_LANGUAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, confidence: f64, w: f64, h: f64) -> OcrLine {
        OcrLine {
            text: text.to_string(),
            confidence,
            bbox: vec![[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]],
        }
    }

    #[test]
    fn test_area() {
        assert_eq!(line("x", 1.0, 100.0, 20.0).area(), 2000.0);
        let no_box = OcrLine {
            text: "x".into(),
            confidence: 1.0,
            bbox: vec![],
        };
        assert_eq!(no_box.area(), 0.0);
    }

    #[test]
    fn test_large_text_ranks_first() {
        let lines = vec![
            line("small print edition", 0.99, 50.0, 10.0),
            line("THE  GREAT\nGATSBY", 0.90, 400.0, 120.0),
        ];
        let result = rank_candidates(&lines);
        assert_eq!(result.title_candidates[0].value, "THE GREAT GATSBY");
        assert_eq!(result.title_candidates[0].confidence, 0.9);
        assert_eq!(result.title_candidates[1].value, "small print edition");
        assert_eq!(result.language_guess, "en");
    }

    #[test]
    fn test_blank_lines_take_ranking_slots() {
        let mut lines: Vec<OcrLine> = (0..MAX_RANKED_LINES)
            .map(|_| line("   ", 0.99, 500.0, 200.0))
            .collect();
        lines.push(line("Quiet Title", 0.5, 10.0, 10.0));
        let result = rank_candidates(&lines);
        assert!(result.title_candidates.is_empty());

        lines.truncate(MAX_RANKED_LINES - 1);
        lines.push(line("Quiet Title", 0.5, 10.0, 10.0));
        let result = rank_candidates(&lines);
        assert_eq!(result.title_candidates[0].value, "Quiet Title");
    }

    #[test]
    fn test_author_split_and_dedup() {
        let lines = vec![
            line("Good Omens", 0.95, 300.0, 80.0),
            line("Neil Gaiman & Terry Pratchett", 0.93, 200.0, 30.0),
            line("neil gaiman & terry pratchett", 0.80, 200.0, 30.0),
            line("ab", 0.99, 500.0, 500.0),
        ];
        let result = rank_candidates(&lines);
        assert_eq!(result.title_candidates.len(), 1);
        assert_eq!(result.author_candidates.len(), 1);
        assert_eq!(result.author_candidates[0].value, "Neil Gaiman & Terry Pratchett");
    }

    #[test]
    fn test_long_comma_line_is_title() {
        let long = format!("{}, {}", "a".repeat(50), "b".repeat(40));
        let result = rank_candidates(&[line(&long, 0.5, 10.0, 10.0)]);
        assert_eq!(result.title_candidates.len(), 1);
        assert!(result.author_candidates.is_empty());
    }

    #[test]
    fn test_caps_at_five() {
        let lines: Vec<OcrLine> = (0..12)
            .map(|i| line(&format!("Title line {}", i), 0.9, 10.0 * i as f64, 10.0))
            .collect();
        let result = rank_candidates(&lines);
        assert_eq!(result.title_candidates.len(), 5);
        assert_eq!(result.title_candidates[0].value, "Title line 11");
    }
}
