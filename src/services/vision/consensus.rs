//! Field-by-field consensus over the readings of several strands

use indexmap::IndexMap;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::{isbn::Isbn, models::cover::VisionReading};

/// Used when a provider did not report a usable confidence
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub value: String,
    /// Mean confidence of the votes in the winning group
    pub confidence: f64,
    /// Share of all votes that landed in the winning group
    pub agreement: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedReading {
    pub title: Option<String>,
    pub author: Option<String>,
    /// ISBN-13
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Default)]
struct Group {
    score: f64,
    count: usize,
    best: Option<Vote>,
}

/// Comparison key: NFKD, diacritics dropped, case-folded, punctuation-insensitive
pub fn normalize_key(value: &str) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Group equivalent votes, score groups by summed confidence and return the
/// best group's highest-confidence original spelling. Ties go to the group
/// seen first.
pub fn pick(votes: &[Vote]) -> Option<Winner> {
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    let mut total = 0usize;

    for vote in votes {
        let key = normalize_key(&vote.value);
        if key.is_empty() {
            continue;
        }
        total += 1;
        let group = groups.entry(key).or_default();
        group.score += vote.confidence;
        group.count += 1;
        if group.best.as_ref().map_or(true, |b| vote.confidence > b.confidence) {
            group.best = Some(vote.clone());
        }
    }

    let mut winner: Option<&Group> = None;
    for group in groups.values() {
        if winner.map_or(true, |w| group.score > w.score) {
            winner = Some(group);
        }
    }

    let group = winner?;
    let best = group.best.as_ref()?;
    Some(Winner {
        value: best.value.clone(),
        confidence: group.score / group.count as f64,
        agreement: group.count as f64 / total as f64,
    })
}

fn reading_confidence(reading: &VisionReading) -> f64 {
    if reading.confidence.is_finite() && reading.confidence > 0.0 {
        reading.confidence.min(1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

fn votes<F>(readings: &[VisionReading], field: F) -> Vec<Vote>
where
    F: Fn(&VisionReading) -> Option<String>,
{
    readings
        .iter()
        .filter_map(|r| {
            field(r).map(|value| Vote {
                value: value.trim().to_string(),
                confidence: reading_confidence(r),
            })
        })
        .filter(|v| !v.value.is_empty())
        .collect()
}

/// Merge readings; overall confidence is the mean over decided fields of
/// winner confidence times agreement ratio
pub fn merge(readings: &[VisionReading]) -> MergedReading {
    let title = pick(&votes(readings, |r| r.title.clone()));
    let author = pick(&votes(readings, |r| r.author.clone()));
    // Invalid ISBNs do not vote
    let isbn = pick(&votes(readings, |r| {
        r.isbn
            .as_deref()
            .and_then(|raw| Isbn::parse(raw).ok())
            .map(|i| i.isbn13().to_string())
    }));
    let publisher = pick(&votes(readings, |r| r.publisher.clone()));

    let decided: Vec<&Winner> = [&title, &author, &isbn, &publisher]
        .into_iter()
        .flatten()
        .collect();
    let confidence = if decided.is_empty() {
        0.0
    } else {
        let sum: f64 = decided.iter().map(|w| w.confidence * w.agreement).sum();
        round3(sum / decided.len() as f64)
    };

    MergedReading {
        title: title.map(|w| w.value),
        author: author.map(|w| w.value),
        isbn: isbn.map(|w| w.value),
        publisher: publisher.map(|w| w.value),
        confidence,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(value: &str, confidence: f64) -> Vote {
        Vote {
            value: value.to_string(),
            confidence,
        }
    }

    fn reading(title: &str, author: &str, isbn: Option<&str>, confidence: f64) -> VisionReading {
        VisionReading {
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            isbn: isbn.map(str::to_string),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  L'Étranger! "), "l etranger");
        assert_eq!(normalize_key("THE LORD of the Rings"), "the lord of the rings");
        assert_eq!(normalize_key("ﬁction"), "fiction");
        assert_eq!(normalize_key("..."), "");
    }

    #[test]
    fn test_pick_prefers_agreement_over_single_confident_vote() {
        let winner = pick(&[
            vote("The Hobbit", 0.6),
            vote("the hobbit.", 0.7),
            vote("The Habbit", 0.95),
        ])
        .unwrap();
        assert_eq!(winner.value, "the hobbit.");
        assert!((winner.confidence - 0.65).abs() < 1e-9);
        assert!((winner.agreement - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pick_tie_goes_to_first_group() {
        let winner = pick(&[vote("Emma", 0.8), vote("Persuasion", 0.8)]).unwrap();
        assert_eq!(winner.value, "Emma");
        assert_eq!(winner.agreement, 0.5);
    }

    #[test]
    fn test_pick_empty() {
        assert_eq!(pick(&[]), None);
        assert_eq!(pick(&[vote("--", 0.9)]), None);
    }

    #[test]
    fn test_merge_full_agreement() {
        let merged = merge(&[
            reading("Dune", "Frank Herbert", Some("978-0-441-17271-9"), 0.9),
            reading("DUNE", "frank herbert", Some("0441172717"), 0.7),
        ]);
        assert_eq!(merged.title.as_deref(), Some("Dune"));
        assert_eq!(merged.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(merged.isbn.as_deref(), Some("9780441172719"));
        assert_eq!(merged.publisher, None);
        assert_eq!(merged.confidence, 0.8);
    }

    #[test]
    fn test_merge_disagreement_lowers_confidence() {
        let merged = merge(&[
            reading("Dune", "Frank Herbert", None, 0.8),
            reading("Dune Messiah", "Frank Herbert", Some("123"), 0.8),
        ]);
        assert_eq!(merged.isbn, None);
        // title 0.8 * 0.5, author 0.8 * 1.0
        assert_eq!(merged.confidence, 0.6);
    }

    #[test]
    fn test_missing_confidence_uses_default() {
        let merged = merge(&[reading("Emma", "Jane Austen", None, 0.0)]);
        assert_eq!(merged.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_merge_nothing() {
        assert_eq!(merge(&[]), MergedReading::default());
    }
}
