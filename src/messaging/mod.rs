/// Direct messages and conversation aggregation
///
/// A conversation is the unordered pair of users that exchanged at least one
/// message. Pairs are grouped by their canonical key `(LEAST(a, b), GREATEST(a, b))`
/// (see [`ConversationKey`]); the latest message and unread count are derived
/// at query time rather than stored.
use crate::{
    db::models::{ConversationSummary, MessageRecord, ThreadMessage},
    error::{SurfError, SurfResult},
    validation::ConversationKey,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Body of a send request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(required(message = "A valid receiver id is required"))]
    pub receiver_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(min = 1, max = 1000, message = "Message must be 1-1000 characters"))]
    pub content: String,
}

impl SendMessageRequest {
    pub fn normalize(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// Message manager
#[derive(Clone)]
pub struct MessageManager {
    db: PgPool,
}

impl MessageManager {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// One row per counterpart, most recent conversation first
    pub async fn list_conversations(&self, user_id: Uuid) -> SurfResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            "WITH latest AS (
                 SELECT DISTINCT ON (LEAST(sender_id, receiver_id), GREATEST(sender_id, receiver_id))
                        CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS other_user_id,
                        content AS last_message,
                        created_at AS last_message_time
                 FROM messages
                 WHERE sender_id = $1 OR receiver_id = $1
                 ORDER BY LEAST(sender_id, receiver_id), GREATEST(sender_id, receiver_id),
                          created_at DESC, id DESC
             ),
             unread AS (
                 SELECT sender_id, COUNT(*) AS unread_count
                 FROM messages
                 WHERE receiver_id = $1 AND read_at IS NULL
                 GROUP BY sender_id
             )
             SELECT l.other_user_id,
                    u.username AS other_username,
                    u.avatar_url AS other_avatar_url,
                    l.last_message,
                    l.last_message_time,
                    COALESCE(unread.unread_count, 0) AS unread_count
             FROM latest l
             JOIN users u ON u.id = l.other_user_id
             LEFT JOIN unread ON unread.sender_id = l.other_user_id
             ORDER BY l.last_message_time DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(conversations)
    }

    /// All messages between the two users, oldest first
    ///
    /// Marks every unread message from `other_user_id` to `user_id` as read.
    pub async fn get_thread(&self, user_id: Uuid, other_user_id: Uuid) -> SurfResult<Vec<ThreadMessage>> {
        let key = ConversationKey::new(user_id, other_user_id);

        let messages = sqlx::query_as::<_, ThreadMessage>(
            "SELECT m.id, m.sender_id, m.receiver_id,
                    s.username AS sender_username,
                    r.username AS receiver_username,
                    m.content, m.created_at, m.read_at
             FROM messages m
             JOIN users s ON s.id = m.sender_id
             JOIN users r ON r.id = m.receiver_id
             WHERE LEAST(m.sender_id, m.receiver_id) = $1
               AND GREATEST(m.sender_id, m.receiver_id) = $2
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(key.low)
        .bind(key.high)
        .fetch_all(&self.db)
        .await?;

        let marked = self.mark_read(user_id, key.other(user_id)).await?;
        if marked > 0 {
            tracing::debug!("Marked {} messages from {} read for {}", marked, other_user_id, user_id);
        }

        Ok(messages)
    }

    /// Send a message; the content must already be validated
    pub async fn send(&self, sender_id: Uuid, receiver_id: Uuid, content: &str) -> SurfResult<MessageRecord> {
        if sender_id == receiver_id {
            return Err(SurfError::field("receiver_id", "You cannot message yourself"));
        }

        let receiver: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(receiver_id)
            .fetch_optional(&self.db)
            .await?;

        if receiver.is_none() {
            return Err(SurfError::NotFound("Receiver not found".to_string()));
        }

        let message = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, sender_id, receiver_id, content)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&self.db)
        .await?;

        Ok(message)
    }

    /// Messages addressed to `user_id` that have not been read
    pub async fn unread_count(&self, user_id: Uuid) -> SurfResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, reader: Uuid, sender: Uuid) -> SurfResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = NOW()
             WHERE sender_id = $1 AND receiver_id = $2 AND read_at IS NULL",
        )
        .bind(sender)
        .bind(reader)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
