//! Book sharing service: catalogue entries, lending and covers

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    isbn::Isbn,
    models::{
        book::{Book, BookQuery, BookStatus, CreateBook, LendBook, MetadataSource, NewBook, UpdateBook},
        notification::NotificationKind,
    },
    repository::Repository,
    services::{
        notifications::NotificationsService,
        uploads::{ImageUpload, UploadsService},
    },
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    notifications: NotificationsService,
    uploads: UploadsService,
}

impl BooksService {
    pub fn new(repository: Repository, notifications: NotificationsService, uploads: UploadsService) -> Self {
        Self {
            repository,
            notifications,
            uploads,
        }
    }

    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Add a book to the caller's shelf
    pub async fn create(&self, owner_id: Uuid, book: CreateBook, source: MetadataSource) -> AppResult<Book> {
        book.validate()?;
        let (isbn10, isbn13) = resolve_isbn(book.isbn.as_deref())?;

        if let Some(club_id) = book.club_id {
            self.require_active_member(club_id, owner_id).await?;
        }

        let created = self
            .repository
            .books
            .create(&NewBook {
                owner_id,
                title: book.title.trim().to_string(),
                author: book.author.trim().to_string(),
                description: book.description,
                isbn10,
                isbn13,
                cover_image_url: book.cover_image_url,
                publisher: book.publisher,
                published_date: book.published_date,
                page_count: book.page_count,
                language: book.language,
                categories: book.categories,
                club_id: book.club_id,
                metadata_source: source,
            })
            .await?;

        tracing::info!("User {} added book {} ({})", owner_id, created.id, source);
        Ok(created)
    }

    /// Owner-only update
    pub async fn update(&self, user_id: Uuid, id: Uuid, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;
        let book = self.repository.books.get_by_id(id).await?;
        require_owner(&book, user_id)?;

        if let Some(status) = update.status {
            check_manual_status(&book, status)?;
        }
        if let Some(club_id) = update.club_id {
            self.require_active_member(club_id, user_id).await?;
        }

        let (isbn10, isbn13) = resolve_isbn(update.isbn.as_deref())?;
        let updated = self
            .repository
            .books
            .update(id, &update, isbn10.as_deref(), isbn13.as_deref())
            .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                // Lent between the check above and the write
                let current = self.repository.books.get_by_id(id).await?;
                Err(rejected_status_update(&current, update.status))
            }
        }
    }

    /// Owner-only delete; borrowed books must be returned first
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        let book = self.repository.books.get_by_id(id).await?;
        require_owner(&book, user_id)?;
        if book.status == BookStatus::Borrowed {
            return Err(AppError::BusinessRule(
                "Cannot delete a book while it is borrowed".to_string(),
            ));
        }
        self.repository.books.delete(id).await
    }

    pub async fn lend(&self, user_id: Uuid, id: Uuid, request: LendBook) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        check_lend(&book, user_id, request.borrower_id, request.due_date, Utc::now())?;

        let borrower = self
            .repository
            .users
            .find_by_id(request.borrower_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", request.borrower_id)))?;

        let lent = self
            .repository
            .books
            .lend(id, borrower.id, request.due_date)
            .await?
            .ok_or_else(|| AppError::BusinessRule("Book is not available".to_string()))?;

        let owner_name = self
            .repository
            .users
            .find_by_id(user_id)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| "A member".to_string());

        self.notifications
            .notify_quietly(
                borrower.id,
                NotificationKind::BookLent,
                "Book lent to you",
                format!("{} lent you \"{}\"", owner_name, lent.title),
                json!({ "book_id": lent.id, "owner_id": user_id, "due_date": lent.due_date }),
            )
            .await;

        tracing::info!("Book {} lent to {}", lent.id, borrower.id);
        Ok(lent)
    }

    /// Owner or borrower marks a borrowed book as returned
    pub async fn return_book(&self, user_id: Uuid, id: Uuid) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        check_return(&book, user_id)?;
        let borrower_id = book.borrower_id;

        let returned = self
            .repository
            .books
            .mark_returned(id)
            .await?
            .ok_or_else(|| AppError::BusinessRule("Book is not borrowed".to_string()))?;

        let borrower_name = match borrower_id {
            Some(borrower_id) => self.repository.users.find_by_id(borrower_id).await?.map(|u| u.name),
            None => None,
        }
        .unwrap_or_else(|| "The borrower".to_string());

        self.notifications
            .notify_quietly(
                returned.owner_id,
                NotificationKind::BookReturned,
                "Book returned",
                format!("{} returned \"{}\"", borrower_name, returned.title),
                json!({ "book_id": returned.id, "borrower_id": borrower_id }),
            )
            .await;

        tracing::info!("Book {} returned", returned.id);
        Ok(returned)
    }

    /// Store an uploaded cover and point the book at it
    pub async fn set_cover(&self, user_id: Uuid, id: Uuid, image: &ImageUpload) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        require_owner(&book, user_id)?;
        let stored = self.uploads.store_cover(image).await?;
        self.repository.books.set_cover(id, &stored.url).await
    }

    async fn require_active_member(&self, club_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self.repository.clubs.get_membership(club_id, user_id).await? {
            Some(membership) if membership.is_active() => Ok(()),
            _ => Err(AppError::Authorization(
                "You must be an active member of the club to share books with it".to_string(),
            )),
        }
    }
}

/// Split an optional user-supplied ISBN into `(isbn10, isbn13)`
pub fn resolve_isbn(raw: Option<&str>) -> AppResult<(Option<String>, Option<String>)> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok((None, None)),
        Some(raw) => {
            let isbn = Isbn::parse(raw)
                .map_err(|e| AppError::Validation(format!("Invalid ISBN {}: {}", raw, e)))?;
            Ok((isbn.isbn10(), Some(isbn.isbn13().to_string())))
        }
    }
}

fn require_owner(book: &Book, user_id: Uuid) -> AppResult<()> {
    if book.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(AppError::Authorization("Only the owner can do this".to_string()))
    }
}

fn check_manual_status(book: &Book, status: BookStatus) -> AppResult<()> {
    if status == BookStatus::Borrowed {
        return Err(AppError::BusinessRule(
            "Use the lend operation to mark a book as borrowed".to_string(),
        ));
    }
    if book.status == BookStatus::Borrowed {
        return Err(AppError::BusinessRule(
            "Use the return operation for a borrowed book".to_string(),
        ));
    }
    Ok(())
}

fn rejected_status_update(current: &Book, status: Option<BookStatus>) -> AppError {
    status
        .and_then(|status| check_manual_status(current, status).err())
        .unwrap_or_else(|| AppError::BusinessRule("Book status changed during the update".to_string()))
}

fn check_lend(
    book: &Book,
    lender_id: Uuid,
    borrower_id: Uuid,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    require_owner(book, lender_id)?;
    if borrower_id == book.owner_id {
        return Err(AppError::BadRequest("You cannot lend a book to yourself".to_string()));
    }
    if book.status != BookStatus::Available {
        return Err(AppError::BusinessRule(format!("Book is {}", book.status)));
    }
    if matches!(due_date, Some(due) if due <= now) {
        return Err(AppError::Validation("Due date must be in the future".to_string()));
    }
    Ok(())
}

fn check_return(book: &Book, user_id: Uuid) -> AppResult<()> {
    if book.status != BookStatus::Borrowed {
        return Err(AppError::BusinessRule("Book is not borrowed".to_string()));
    }
    if !book.is_owned_by(user_id) && !book.is_borrowed_by(user_id) {
        return Err(AppError::Authorization(
            "Only the owner or the borrower can return a book".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book(owner: Uuid, status: BookStatus, borrower: Option<Uuid>) -> Book {
        let now = Utc::now();
        Book {
            id: Uuid::new_v4(),
            owner_id: owner,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: None,
            isbn10: None,
            isbn13: None,
            cover_image_url: None,
            publisher: None,
            published_date: None,
            page_count: None,
            language: None,
            categories: vec![],
            status,
            borrower_id: borrower,
            due_date: None,
            club_id: None,
            metadata_source: MetadataSource::Manual,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_resolve_isbn() {
        assert_eq!(resolve_isbn(None).unwrap(), (None, None));
        assert_eq!(resolve_isbn(Some("  ")).unwrap(), (None, None));
        assert_eq!(
            resolve_isbn(Some("0-306-40615-2")).unwrap(),
            (Some("0306406152".to_string()), Some("9780306406157".to_string()))
        );
        assert_eq!(
            resolve_isbn(Some("979-10-90636-07-1")).unwrap(),
            (None, Some("9791090636071".to_string()))
        );
        assert!(matches!(resolve_isbn(Some("12345")), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_lend_rules() {
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let now = Utc::now();
        let available = book(owner, BookStatus::Available, None);

        assert!(check_lend(&available, owner, friend, Some(now + Duration::days(14)), now).is_ok());
        assert!(check_lend(&available, owner, friend, None, now).is_ok());
        assert!(matches!(
            check_lend(&available, friend, owner, None, now),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            check_lend(&available, owner, owner, None, now),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            check_lend(&available, owner, friend, Some(now - Duration::hours(1)), now),
            Err(AppError::Validation(_))
        ));

        let borrowed = book(owner, BookStatus::Borrowed, Some(friend));
        assert!(matches!(
            check_lend(&borrowed, owner, Uuid::new_v4(), None, now),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_return_rules() {
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let borrowed = book(owner, BookStatus::Borrowed, Some(friend));

        assert!(check_return(&borrowed, owner).is_ok());
        assert!(check_return(&borrowed, friend).is_ok());
        assert!(matches!(
            check_return(&borrowed, Uuid::new_v4()),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            check_return(&book(owner, BookStatus::Available, None), owner),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_manual_status_changes() {
        let owner = Uuid::new_v4();
        let available = book(owner, BookStatus::Available, None);
        assert!(check_manual_status(&available, BookStatus::Unavailable).is_ok());
        assert!(check_manual_status(&available, BookStatus::Borrowed).is_err());

        let borrowed = book(owner, BookStatus::Borrowed, Some(Uuid::new_v4()));
        assert!(check_manual_status(&borrowed, BookStatus::Available).is_err());
    }

    #[test]
    fn test_status_update_rejected_after_concurrent_lend() {
        let owner = Uuid::new_v4();
        let lent = book(owner, BookStatus::Borrowed, Some(Uuid::new_v4()));
        match rejected_status_update(&lent, Some(BookStatus::Unavailable)) {
            AppError::BusinessRule(message) => assert!(message.contains("return operation")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(
            rejected_status_update(&lent, None),
            AppError::BusinessRule(_)
        ));
    }
}
