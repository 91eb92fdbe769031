//! Direct messages repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::message::{ordered_pair, preview, Conversation, ConversationRow, Message},
};

#[derive(Clone)]
pub struct MessagesRepository {
    pool: Pool<Postgres>,
}

impl MessagesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_conversation(&self, id: Uuid) -> AppResult<Conversation> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM dm_conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation with id {} not found", id)))
    }

    /// Return the conversation between two users, creating it if needed
    pub async fn get_or_create_conversation(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        let (user_a, user_b) = ordered_pair(a, b);

        sqlx::query(
            r#"
            INSERT INTO dm_conversations (id, user_a, user_b, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_a, user_b) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_a)
        .bind(user_b)
        .execute(&self.pool)
        .await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM dm_conversations WHERE user_a = $1 AND user_b = $2",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Conversations of a user, most recently active first
    pub async fn list_conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationRow>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.last_message_at, c.last_message_preview, c.created_at,
                   CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END AS other_user_id,
                   u.name AS other_user_name,
                   u.profile_picture_url AS other_user_picture,
                   (SELECT COUNT(*) FROM dm_messages m
                    WHERE m.conversation_id = c.id AND m.recipient_id = $1 AND m.read_at IS NULL) AS unread_count
            FROM dm_conversations c
            LEFT JOIN users u ON u.id = CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END
            WHERE c.user_a = $1 OR c.user_b = $1
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Messages of a conversation, newest first
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM dm_messages
            WHERE conversation_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Store a message and bump the conversation's preview
    pub async fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO dm_messages (id, conversation_id, sender_id, recipient_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE dm_conversations SET last_message_at = $2, last_message_preview = $3 WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(message.created_at)
        .bind(preview(content))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Mark every message addressed to `user_id` in a conversation as read
    pub async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE dm_messages SET read_at = NOW()
            WHERE conversation_id = $1 AND recipient_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
