//! Catalogue lookups (Google Books, Open Library)

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::metadata::{BookMetadata, MetadataSearchQuery},
};

use super::AuthenticatedUser;

/// Look up a book by ISBN-10 or ISBN-13
#[utoipa::path(
    get,
    path = "/metadata/isbn/{isbn}",
    tag = "metadata",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "ISBN-10 or ISBN-13, hyphens allowed")
    ),
    responses(
        (status = 200, description = "Catalogue record", body = BookMetadata),
        (status = 400, description = "Invalid ISBN"),
        (status = 404, description = "No catalogue knows this ISBN")
    )
)]
pub async fn lookup_isbn(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookMetadata>> {
    state
        .services
        .metadata
        .lookup(&isbn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No metadata found for ISBN {}", isbn)))
}

/// Search the catalogue by title and/or author
#[utoipa::path(
    get,
    path = "/metadata/search",
    tag = "metadata",
    security(("bearer_auth" = [])),
    params(MetadataSearchQuery),
    responses(
        (status = 200, description = "Matching records", body = Vec<BookMetadata>),
        (status = 400, description = "Neither title nor author given")
    )
)]
pub async fn search(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MetadataSearchQuery>,
) -> AppResult<Json<Vec<BookMetadata>>> {
    let results = state
        .services
        .metadata
        .search(query.title.as_deref(), query.author.as_deref())
        .await?;
    Ok(Json(results))
}
