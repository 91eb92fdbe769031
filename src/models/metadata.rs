//! Bibliographic metadata returned by catalogue lookups

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::book::{CreateBook, MetadataSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub page_count: Option<i32>,
    pub categories: Vec<String>,
    pub language: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub cover_image_url: Option<String>,
    pub source: Option<MetadataSource>,
}

impl BookMetadata {
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Request body for creating a book from this metadata
    pub fn to_create_book(&self) -> CreateBook {
        CreateBook {
            title: self.title.clone(),
            author: self.author_line(),
            description: self.description.clone(),
            isbn: self.isbn13.clone().or_else(|| self.isbn10.clone()),
            cover_image_url: self.cover_image_url.clone(),
            publisher: self.publisher.clone(),
            published_date: self.published_date.clone(),
            page_count: self.page_count,
            language: self.language.clone(),
            categories: self.categories.clone(),
            club_id: None,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct MetadataSearchQuery {
    pub title: Option<String>,
    pub author: Option<String>,
}
