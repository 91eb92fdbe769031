//! Direct messages between two members

use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        message::{preview, Conversation, ConversationSummary, Message, MessageQuery, MAX_MESSAGE_CHARS},
        notification::NotificationKind,
    },
    repository::Repository,
    services::notifications::NotificationsService,
};

#[derive(Clone)]
pub struct MessagesService {
    repository: Repository,
    notifications: NotificationsService,
}

impl MessagesService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Get or create the conversation between the caller and `other_id`
    pub async fn start_conversation(&self, user_id: Uuid, other_id: Uuid) -> AppResult<Conversation> {
        if user_id == other_id {
            return Err(AppError::BadRequest(
                "You cannot start a conversation with yourself".to_string(),
            ));
        }
        self.repository.users.get_by_id(other_id).await?;
        self.repository
            .messages
            .get_or_create_conversation(user_id, other_id)
            .await
    }

    pub async fn list_conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let rows = self.repository.messages.list_conversations(user_id).await?;
        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    /// Messages newest first, paged with `before`
    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        query: &MessageQuery,
    ) -> AppResult<Vec<Message>> {
        self.participant_conversation(conversation_id, user_id).await?;
        self.repository
            .messages
            .list_messages(conversation_id, query.before, query.limit())
            .await
    }

    pub async fn send(&self, user_id: Uuid, conversation_id: Uuid, content: &str) -> AppResult<Message> {
        let content = clean_content(content)?;
        let conversation = self.participant_conversation(conversation_id, user_id).await?;
        let recipient_id = conversation.other_participant(user_id);

        let message = self
            .repository
            .messages
            .insert_message(conversation_id, user_id, recipient_id, &content)
            .await?;

        let sender_name = self.repository.users.get_by_id(user_id).await?.name;
        self.notifications
            .notify_quietly(
                recipient_id,
                NotificationKind::NewMessage,
                format!("New message from {}", sender_name),
                preview(&content),
                json!({ "conversation_id": conversation_id, "message_id": message.id, "sender_id": user_id }),
            )
            .await;

        Ok(message)
    }

    /// Mark everything addressed to the caller as read
    pub async fn mark_read(&self, user_id: Uuid, conversation_id: Uuid) -> AppResult<u64> {
        self.participant_conversation(conversation_id, user_id).await?;
        self.repository.messages.mark_read(conversation_id, user_id).await
    }

    async fn participant_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.repository.messages.get_conversation(conversation_id).await?;
        if !conversation.has_participant(user_id) {
            return Err(AppError::Authorization(
                "You are not part of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }
}

/// Trimmed message body of 1 to `MAX_MESSAGE_CHARS` characters
fn clean_content(content: &str) -> AppResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content("  hello \n").unwrap(), "hello");
        assert!(matches!(clean_content(" \n\t "), Err(AppError::Validation(_))));
        assert!(clean_content(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(clean_content(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}
