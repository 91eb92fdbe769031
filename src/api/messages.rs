//! Direct message endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::message::{
        Conversation, ConversationSummary, MarkedRead, Message, MessageQuery, SendMessage,
        StartConversation,
    },
};

use super::AuthenticatedUser;

/// Get or create the conversation with another user
#[utoipa::path(
    post,
    path = "/messages/conversations",
    tag = "messages",
    security(("bearer_auth" = [])),
    request_body = StartConversation,
    responses(
        (status = 200, description = "Conversation", body = Conversation),
        (status = 400, description = "Cannot message yourself"),
        (status = 404, description = "User not found")
    )
)]
pub async fn start_conversation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<StartConversation>,
) -> AppResult<Json<Conversation>> {
    let conversation = state
        .services
        .messages
        .start_conversation(claims.user_id(), request.user_id)
        .await?;
    Ok(Json(conversation))
}

/// Caller's conversations, most recent activity first
#[utoipa::path(
    get,
    path = "/messages/conversations",
    tag = "messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Conversations", body = Vec<ConversationSummary>)
    )
)]
pub async fn list_conversations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let conversations = state
        .services
        .messages
        .list_conversations(claims.user_id())
        .await?;
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/messages/conversations/{id}/messages",
    tag = "messages",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Conversation ID"),
        MessageQuery
    ),
    responses(
        (status = 200, description = "Messages, newest first", body = Vec<Message>),
        (status = 403, description = "Not a participant")
    )
)]
pub async fn list_messages(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = state
        .services
        .messages
        .list_messages(claims.user_id(), id, &query)
        .await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/messages/conversations/{id}/messages",
    tag = "messages",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = SendMessage,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 400, description = "Empty or too long message"),
        (status = 403, description = "Not a participant")
    )
)]
pub async fn send_message(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessage>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = state
        .services
        .messages
        .send(claims.user_id(), id, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    post,
    path = "/messages/conversations/{id}/read",
    tag = "messages",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Number of messages marked read", body = MarkedRead),
        (status = 403, description = "Not a participant")
    )
)]
pub async fn mark_read(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MarkedRead>> {
    let marked = state.services.messages.mark_read(claims.user_id(), id).await?;
    Ok(Json(MarkedRead { marked }))
}
