//! Heuristics over OCR output of book covers
//!
//! - [`text`]: regex-based extraction of title/author/ISBN/publisher from raw text
//! - [`candidates`]: salience ranking of positioned OCR lines into title and author candidates

pub mod candidates;
pub mod text;

pub use candidates::{rank_candidates, Candidate, Candidates, OcrLine};
pub use text::{parse_cover_text, ParsedCover};
