//! Book creation from a cover photo

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{book::MetadataSource, cover::CoverAnalysis},
    services::{
        books::BooksService,
        uploads::UploadsService,
        vision::{CoverAnalyzer, CoverImage},
    },
};

#[derive(Clone)]
pub struct CoversService {
    analyzer: CoverAnalyzer,
    books: BooksService,
    uploads: UploadsService,
}

impl CoversService {
    pub fn new(analyzer: CoverAnalyzer, books: BooksService, uploads: UploadsService) -> Self {
        Self {
            analyzer,
            books,
            uploads,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.analyzer.provider_names()
    }

    /// Analyze an uploaded photo; with `create` the merged metadata becomes a
    /// new book owned by the caller, using the photo as its cover
    pub async fn analyze(&self, user_id: Uuid, image: Vec<u8>, create: bool) -> AppResult<CoverAnalysis> {
        let upload = self.uploads.validate_image(image)?;
        let mut analysis = self.analyzer.analyze(&CoverImage::from(&upload)).await;

        tracing::info!(
            confidence = analysis.confidence,
            strands = analysis.strands.len(),
            "Cover analyzed for user {}",
            user_id
        );

        if !create {
            return Ok(analysis);
        }

        let Some(metadata) = analysis.metadata.as_ref().filter(|m| !m.title.is_empty()) else {
            tracing::info!("Cover analysis found no title, no book created");
            return Ok(analysis);
        };

        let mut request = metadata.to_create_book();
        if request.author.is_empty() {
            request.author = "Unknown".to_string();
        }
        request.cover_image_url = None;

        let book = self
            .books
            .create(user_id, request, MetadataSource::CoverAnalysis)
            .await?;
        let book = self.books.set_cover(user_id, book.id, &upload).await?;
        analysis.book = Some(book);
        Ok(analysis)
    }
}
