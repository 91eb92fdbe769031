//! Concurrent cover analysis across all enabled strands

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;

use super::{
    build_providers,
    consensus::{self, MergedReading, DEFAULT_CONFIDENCE},
    retry::with_linear_backoff,
    CoverImage, VisionProvider,
};
use crate::{
    config::VisionConfig,
    error::AppResult,
    isbn::Isbn,
    models::{
        book::MetadataSource,
        cover::{CoverAnalysis, StrandOutcome, StrandStatus, VisionReading},
        metadata::BookMetadata,
    },
    ocr::{parse_cover_text, rank_candidates, OcrLine},
    services::metadata::IsbnLookup,
};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl From<&VisionConfig> for RetryPolicy {
    fn from(config: &VisionConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }
}

#[derive(Clone)]
pub struct CoverAnalyzer {
    providers: Vec<Arc<dyn VisionProvider>>,
    lookup: Option<Arc<dyn IsbnLookup>>,
    retry: RetryPolicy,
}

impl CoverAnalyzer {
    pub fn new(
        providers: Vec<Arc<dyn VisionProvider>>,
        lookup: Option<Arc<dyn IsbnLookup>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            providers,
            lookup,
            retry,
        }
    }

    pub fn from_config(config: &VisionConfig, lookup: Arc<dyn IsbnLookup>) -> AppResult<Self> {
        let providers = build_providers(config)?;
        Ok(Self::new(providers, Some(lookup), RetryPolicy::from(config)))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Read a cover with every strand and merge the answers. Never fails:
    /// when nothing could be read the result is empty with confidence 0.
    pub async fn analyze(&self, image: &CoverImage) -> CoverAnalysis {
        if self.providers.is_empty() {
            return CoverAnalysis::default();
        }

        let strands = join_all(self.providers.iter().map(|p| self.run_strand(p.as_ref(), image))).await;

        let readings: Vec<VisionReading> = strands
            .iter()
            .filter_map(|s| s.reading.clone())
            .collect();
        if readings.is_empty() {
            tracing::warn!("All {} cover analysis strands failed", strands.len());
        }

        let candidates = rank_candidates(&text_lines(&readings));
        let merged = consensus::merge(&readings);
        let metadata = match cover_metadata(&merged) {
            Some(metadata) => Some(self.enrich(metadata).await),
            None => None,
        };

        let confidence = if metadata.is_some() { merged.confidence } else { 0.0 };
        CoverAnalysis {
            metadata,
            confidence,
            candidates,
            strands,
            book: None,
        }
    }

    async fn run_strand(&self, provider: &dyn VisionProvider, image: &CoverImage) -> StrandOutcome {
        let started = Instant::now();
        let result = with_linear_backoff(self.retry.max_attempts, self.retry.base_delay, move || {
            provider.analyze(image)
        })
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(reading) => {
                tracing::debug!(provider = provider.name(), duration_ms, "Strand succeeded");
                StrandOutcome {
                    provider: provider.name().to_string(),
                    status: StrandStatus::Ok,
                    duration_ms,
                    error: None,
                    reading: Some(fill_gaps(reading)),
                }
            }
            Err(e) => {
                tracing::warn!(provider = provider.name(), duration_ms, "Strand failed: {}", e);
                StrandOutcome {
                    provider: provider.name().to_string(),
                    status: StrandStatus::Failed,
                    duration_ms,
                    error: Some(e.to_string()),
                    reading: None,
                }
            }
        }
    }

    /// Prefer catalogue title and author when the agreed ISBN is known
    async fn enrich(&self, cover: BookMetadata) -> BookMetadata {
        let (Some(lookup), Some(isbn)) = (self.lookup.as_ref(), cover.isbn13.clone()) else {
            return cover;
        };
        match lookup.lookup_isbn(&isbn).await {
            Ok(Some(catalogue)) => merge_catalogue(cover, catalogue),
            Ok(None) => cover,
            Err(e) => {
                tracing::warn!("Enrichment of {} failed: {}", isbn, e);
                cover
            }
        }
    }
}

/// Complete missing fields of a reading from its raw text
fn fill_gaps(mut reading: VisionReading) -> VisionReading {
    let Some(text) = reading.text.as_deref() else {
        return reading;
    };
    let parsed = parse_cover_text(text);
    reading.title = reading.title.or(parsed.title);
    reading.author = reading.author.or(parsed.author);
    reading.isbn = reading.isbn.or(parsed.isbn);
    reading.publisher = reading.publisher.or(parsed.publisher);
    reading
}

/// Raw text of every reading as unpositioned OCR lines
fn text_lines(readings: &[VisionReading]) -> Vec<OcrLine> {
    readings
        .iter()
        .flat_map(|r| {
            let confidence = if r.confidence > 0.0 { r.confidence } else { DEFAULT_CONFIDENCE };
            r.text
                .as_deref()
                .unwrap_or_default()
                .lines()
                .map(move |line| OcrLine {
                    text: line.to_string(),
                    confidence,
                    bbox: Vec::new(),
                })
        })
        .collect()
}

/// Metadata read off the cover; needs a title or an ISBN
fn cover_metadata(merged: &MergedReading) -> Option<BookMetadata> {
    if merged.title.is_none() && merged.isbn.is_none() {
        return None;
    }
    let isbn = merged.isbn.as_deref().and_then(|i| Isbn::parse(i).ok());
    Some(BookMetadata {
        title: merged.title.clone().unwrap_or_default(),
        authors: merged
            .author
            .iter()
            .flat_map(|a| a.split(','))
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        publisher: merged.publisher.clone(),
        isbn10: isbn.as_ref().and_then(|i| i.isbn10()),
        isbn13: isbn.map(|i| i.isbn13().to_string()),
        source: Some(MetadataSource::CoverAnalysis),
        ..Default::default()
    })
}

fn merge_catalogue(cover: BookMetadata, catalogue: BookMetadata) -> BookMetadata {
    BookMetadata {
        title: if catalogue.title.is_empty() { cover.title } else { catalogue.title },
        authors: if catalogue.authors.is_empty() { cover.authors } else { catalogue.authors },
        publisher: catalogue.publisher.or(cover.publisher),
        isbn10: catalogue.isbn10.or(cover.isbn10),
        isbn13: catalogue.isbn13.or(cover.isbn13),
        ..catalogue
    }
}
