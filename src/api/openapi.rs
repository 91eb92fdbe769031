//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, clubs, health, messages, metadata, notifications, ocr, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookclub API",
        version = "1.0.0",
        description = "Community book sharing REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::update_me,
        auth::delete_me,
        // Users
        users::get_user,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::lend_book,
        books::return_book,
        books::upload_cover,
        books::analyze_cover,
        // Clubs
        clubs::create_club,
        clubs::list_my_clubs,
        clubs::discover_clubs,
        clubs::get_club,
        clubs::update_club,
        clubs::delete_club,
        clubs::join_club,
        clubs::list_members,
        clubs::list_requests,
        clubs::approve_request,
        clubs::reject_request,
        clubs::remove_member,
        clubs::regenerate_invite_code,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        // Messages
        messages::start_conversation,
        messages::list_conversations,
        messages::list_messages,
        messages::send_message,
        messages::mark_read,
        // Metadata
        metadata::lookup_isbn,
        metadata::search,
        // OCR
        ocr::candidates,
    ),
    components(
        schemas(
            // Users
            crate::models::user::User,
            crate::models::user::PublicUser,
            crate::models::user::UserSummary,
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::user::AuthResponse,
            crate::models::user::UpdateProfile,
            // Books
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::MetadataSource,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::LendBook,
            // Clubs
            crate::models::club::Club,
            crate::models::club::UserClub,
            crate::models::club::ClubMember,
            crate::models::club::ClubRole,
            crate::models::club::MemberStatus,
            crate::models::club::CreateClub,
            crate::models::club::UpdateClub,
            crate::models::club::JoinClub,
            crate::models::club::JoinClubResponse,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::NotificationKind,
            crate::models::notification::UnreadCount,
            // Messages
            crate::models::message::Conversation,
            crate::models::message::ConversationSummary,
            crate::models::message::Message,
            crate::models::message::StartConversation,
            crate::models::message::SendMessage,
            crate::models::message::MarkedRead,
            // Metadata and covers
            crate::models::metadata::BookMetadata,
            crate::models::cover::VisionReading,
            crate::models::cover::StrandStatus,
            crate::models::cover::StrandOutcome,
            crate::models::cover::CoverAnalysis,
            // OCR
            ocr::CandidatesRequest,
            crate::ocr::OcrLine,
            crate::ocr::Candidate,
            crate::ocr::Candidates,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and own account"),
        (name = "users", description = "Public profiles"),
        (name = "books", description = "Shelves, lending and covers"),
        (name = "clubs", description = "Clubs and memberships"),
        (name = "notifications", description = "Notification inbox"),
        (name = "messages", description = "Direct messages"),
        (name = "metadata", description = "Catalogue lookups"),
        (name = "ocr", description = "OCR post-processing")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/books/analyze-cover"));
        assert!(doc.paths.paths.contains_key("/clubs/{id}/requests/{user_id}/approve"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
