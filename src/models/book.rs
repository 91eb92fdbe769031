//! Book model and related request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

text_enum! {
    /// Lending state of a shared book
    pub enum BookStatus {
        Available => "available",
        Borrowed => "borrowed",
        Reserved => "reserved",
        Unavailable => "unavailable",
    }
}

text_enum! {
    /// Where the bibliographic data of a book came from
    pub enum MetadataSource {
        Manual => "manual",
        GoogleBooks => "google_books",
        OpenLibrary => "open_library",
        CoverAnalysis => "cover_analysis",
    }
}

impl Default for BookStatus {
    fn default() -> Self {
        BookStatus::Available
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub cover_image_url: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub categories: Vec<String>,
    pub status: BookStatus,
    pub borrower_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub club_id: Option<Uuid>,
    pub metadata_source: MetadataSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_borrowed_by(&self, user_id: Uuid) -> bool {
        self.status == BookStatus::Borrowed && self.borrower_id == Some(user_id)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Only books owned by this user
    pub owner_id: Option<Uuid>,
    /// Only books shared with this club
    pub club_id: Option<Uuid>,
    pub status: Option<BookStatus>,
    /// Case-insensitive match on title, author or ISBN
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[serde(deserialize_with = "crate::models::trimmed")]
    #[validate(length(min = 1, max = 300, message = "Title must be 1 to 300 characters"))]
    pub title: String,
    #[serde(deserialize_with = "crate::models::trimmed")]
    #[validate(length(min = 1, max = 200, message = "Author must be 1 to 200 characters"))]
    pub author: String,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    /// ISBN-10 or ISBN-13, separators allowed
    pub isbn: Option<String>,
    #[validate(url(message = "Invalid cover image URL"))]
    pub cover_image_url: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    #[validate(range(min = 1, max = 100000, message = "Page count must be between 1 and 100000"))]
    pub page_count: Option<i32>,
    pub language: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub club_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[serde(default, deserialize_with = "crate::models::trimmed_opt")]
    #[validate(length(min = 1, max = 300, message = "Title must be 1 to 300 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::models::trimmed_opt")]
    #[validate(length(min = 1, max = 200, message = "Author must be 1 to 200 characters"))]
    pub author: Option<String>,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    pub isbn: Option<String>,
    #[validate(url(message = "Invalid cover image URL"))]
    pub cover_image_url: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    #[validate(range(min = 1, max = 100000, message = "Page count must be between 1 and 100000"))]
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub categories: Option<Vec<String>>,
    /// Manual status change; `borrowed` is only reachable through lending
    pub status: Option<BookStatus>,
    pub club_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LendBook {
    pub borrower_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
}

/// Fully resolved values written by the repository on insert
#[derive(Debug, Clone)]
pub struct NewBook {
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub cover_image_url: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub categories: Vec<String>,
    pub club_id: Option<Uuid>,
    pub metadata_source: MetadataSource,
}
