//! Types exchanged by the cover analysis pipeline

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{book::Book, metadata::BookMetadata};
use crate::ocr::Candidates;

/// What one vision provider read from a cover
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisionReading {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    /// Self-reported confidence in `0.0..=1.0`
    #[serde(default)]
    pub confidence: f64,
    /// All text visible on the cover, line by line
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrandStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StrandOutcome {
    pub provider: String,
    pub status: StrandStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub reading: Option<VisionReading>,
}

/// Merged result of all strands
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CoverAnalysis {
    pub metadata: Option<BookMetadata>,
    /// Overall confidence in `0.0..=1.0`; zero when nothing could be read
    pub confidence: f64,
    pub candidates: Candidates,
    pub strands: Vec<StrandOutcome>,
    /// Set when the analysis created a book
    pub book: Option<Book>,
}
