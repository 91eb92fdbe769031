//! Book endpoints: shelf listing, lending and cover handling

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, CreateBook, LendBook, UpdateBook},
        cover::CoverAnalysis,
        MetadataSource,
    },
};

use super::{read_file_field, AuthenticatedUser, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AnalyzeCoverQuery {
    /// Create a book from the merged metadata
    #[serde(default)]
    pub create: bool,
}

/// List books with filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = PaginatedResponse<Book>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state.services.books.search(&query).await?;
    Ok(Json(PaginatedResponse::new(books, total, query.page, query.per_page)))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_by_id(id).await?;
    Ok(Json(book))
}

/// Add a book to the caller's shelf
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid book data or ISBN"),
        (status = 403, description = "Not a member of the club")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state
        .services
        .books
        .create(claims.user_id(), book, MetadataSource::Manual)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book (owner only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Status change not allowed")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.update(claims.user_id(), id, update).await?;
    Ok(Json(book))
}

/// Delete a book (owner only, not while borrowed)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Not the owner"),
        (status = 422, description = "Book is currently borrowed")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.books.delete(claims.user_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lend a book to another user
#[utoipa::path(
    post,
    path = "/books/{id}/lend",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = LendBook,
    responses(
        (status = 200, description = "Book lent", body = Book),
        (status = 400, description = "Invalid borrower or due date"),
        (status = 403, description = "Not the owner"),
        (status = 422, description = "Book is not available")
    )
)]
pub async fn lend_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<LendBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.lend(claims.user_id(), id, request).await?;
    Ok(Json(book))
}

/// Return a borrowed book (owner or borrower)
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = Book),
        (status = 403, description = "Neither owner nor borrower"),
        (status = 422, description = "Book is not borrowed")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.return_book(claims.user_id(), id).await?;
    Ok(Json(book))
}

/// Upload a cover image for a book (multipart field `image`)
#[utoipa::path(
    post,
    path = "/books/{id}/cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Field `image`: JPEG, PNG or WebP"),
    responses(
        (status = 200, description = "Cover stored", body = Book),
        (status = 400, description = "Missing, oversized or unsupported image"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn upload_cover(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<Book>> {
    let bytes = read_file_field(&mut multipart, "image").await?;
    let image = state.services.uploads.validate_image(bytes)?;
    let book = state
        .services
        .books
        .set_cover(claims.user_id(), id, &image)
        .await?;
    Ok(Json(book))
}

/// Read a cover photo with the configured vision providers
#[utoipa::path(
    post,
    path = "/books/analyze-cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(AnalyzeCoverQuery),
    request_body(content = String, content_type = "multipart/form-data", description = "Field `image`: JPEG, PNG or WebP"),
    responses(
        (status = 200, description = "Merged reading with per-provider outcomes", body = CoverAnalysis),
        (status = 400, description = "Missing, oversized or unsupported image")
    )
)]
pub async fn analyze_cover(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AnalyzeCoverQuery>,
    mut multipart: Multipart,
) -> AppResult<Json<CoverAnalysis>> {
    let bytes = read_file_field(&mut multipart, "image").await?;
    let analysis = state
        .services
        .covers
        .analyze(claims.user_id(), bytes, query.create)
        .await?;
    Ok(Json(analysis))
}
