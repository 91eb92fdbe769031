//! Books repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::contains_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, NewBook, UpdateBook},
        page_bounds, BookStatus,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with filters and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(owner_id) = query.owner_id {
            params.push(owner_id.to_string());
            conditions.push(format!("owner_id = CAST(${} AS UUID)", params.len()));
        }

        if let Some(club_id) = query.club_id {
            params.push(club_id.to_string());
            conditions.push(format!("club_id = CAST(${} AS UUID)", params.len()));
        }

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(ref search) = query.search {
            let search = search.trim();
            if !search.is_empty() {
                params.push(contains_pattern(search));
                let n = params.len();
                conditions.push(format!(
                    "(LOWER(title) LIKE ${n} ESCAPE '\\' OR LOWER(author) LIKE ${n} ESCAPE '\\' OR isbn13 LIKE ${n} ESCAPE '\\' OR isbn10 LIKE ${n} ESCAPE '\\')"
                ));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            r#"
            SELECT * FROM books
            {}
            ORDER BY created_at DESC
            LIMIT {} OFFSET {}
            "#,
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Create a new book
    pub async fn create(&self, book: &NewBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, owner_id, title, author, description, isbn10, isbn13,
                cover_image_url, publisher, published_date, page_count, language,
                categories, status, club_id, metadata_source, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW(), NOW()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book.owner_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.isbn10)
        .bind(&book.isbn13)
        .bind(&book.cover_image_url)
        .bind(&book.publisher)
        .bind(&book.published_date)
        .bind(book.page_count)
        .bind(&book.language)
        .bind(&book.categories)
        .bind(BookStatus::Available)
        .bind(book.club_id)
        .bind(book.metadata_source)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update book fields; `None` leaves a field unchanged. A status change
    /// never applies to a borrowed book: returns `None` in that case, or when
    /// the book does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        update: &UpdateBook,
        isbn10: Option<&str>,
        isbn13: Option<&str>,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                description = COALESCE($4, description),
                isbn10 = COALESCE($5, isbn10),
                isbn13 = COALESCE($6, isbn13),
                cover_image_url = COALESCE($7, cover_image_url),
                publisher = COALESCE($8, publisher),
                published_date = COALESCE($9, published_date),
                page_count = COALESCE($10, page_count),
                language = COALESCE($11, language),
                categories = COALESCE($12, categories),
                status = COALESCE($13, status),
                club_id = COALESCE($14, club_id),
                updated_at = NOW()
            WHERE id = $1 AND ($13::text IS NULL OR status <> 'borrowed')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.description)
        .bind(isbn10)
        .bind(isbn13)
        .bind(&update.cover_image_url)
        .bind(&update.publisher)
        .bind(&update.published_date)
        .bind(update.page_count)
        .bind(&update.language)
        .bind(&update.categories)
        .bind(update.status)
        .bind(update.club_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Mark an available book as borrowed. Returns `None` if the book was
    /// not available any more.
    pub async fn lend(
        &self,
        id: Uuid,
        borrower_id: Uuid,
        due_date: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET status = 'borrowed', borrower_id = $2, due_date = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(borrower_id)
        .bind(due_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Mark a borrowed book as available again. Returns `None` if the book
    /// was not borrowed.
    pub async fn mark_returned(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET status = 'available', borrower_id = NULL, due_date = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'borrowed'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    pub async fn set_cover(&self, id: Uuid, cover_image_url: &str) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "UPDATE books SET cover_image_url = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(cover_image_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Detach books of a user from a club they left
    pub async fn unshare_from_club(&self, club_id: Uuid, owner_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE books SET club_id = NULL, updated_at = NOW() WHERE club_id = $1 AND owner_id = $2",
        )
        .bind(club_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Detach all books from a deleted club
    pub async fn unshare_all_from_club(&self, club_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("UPDATE books SET club_id = NULL, updated_at = NOW() WHERE club_id = $1")
            .bind(club_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
