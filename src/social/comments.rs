use crate::{
    db::models::CommentView,
    error::{SurfError, SurfResult},
    validation::Pagination,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const NOT_FOUND_OR_UNAUTHORIZED: &str = "Comment not found or unauthorized";

/// Body of comment create and edit requests
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 500, message = "Comment must be 1-500 characters"))]
    pub content: String,
}

impl CommentRequest {
    pub fn normalize(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// One page of a session's comments
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub pagination: Pagination,
    pub total: i64,
}

/// Comment manager
#[derive(Clone)]
pub struct CommentManager {
    db: PgPool,
}

impl CommentManager {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Newest comments first
    pub async fn list(&self, session_id: Uuid, page: i64, limit: i64) -> SurfResult<CommentPage> {
        let comments = sqlx::query_as::<_, CommentView>(
            "SELECT c.id, c.session_id, c.user_id, u.username, u.avatar_url,
                    c.content, c.created_at, c.updated_at
             FROM session_comments c
             JOIN users u ON u.id = c.user_id
             WHERE c.session_id = $1
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(session_id)
        .bind(limit)
        .bind(Pagination::offset(page, limit))
        .fetch_all(&self.db)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM session_comments WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.db)
                .await?;

        Ok(CommentPage {
            comments,
            pagination: Pagination::new(page, limit, total),
            total,
        })
    }

    /// Add a comment; the content must already be validated
    pub async fn add(&self, user_id: Uuid, session_id: Uuid, content: &str) -> SurfResult<CommentView> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM surf_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db)
            .await?;

        if exists.is_none() {
            return Err(SurfError::NotFound("Session not found".to_string()));
        }

        let comment = sqlx::query_as::<_, CommentView>(
            "WITH inserted AS (
                 INSERT INTO session_comments (id, user_id, session_id, content)
                 VALUES ($1, $2, $3, $4)
                 RETURNING *
             )
             SELECT c.id, c.session_id, c.user_id, u.username, u.avatar_url,
                    c.content, c.created_at, c.updated_at
             FROM inserted c
             JOIN users u ON u.id = c.user_id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(session_id)
        .bind(content)
        .fetch_one(&self.db)
        .await?;

        Ok(comment)
    }

    /// Edit a comment; author only
    pub async fn update(&self, comment_id: Uuid, user_id: Uuid, content: &str) -> SurfResult<CommentView> {
        sqlx::query_as::<_, CommentView>(
            "WITH updated AS (
                 UPDATE session_comments SET content = $1, updated_at = NOW()
                 WHERE id = $2 AND user_id = $3
                 RETURNING *
             )
             SELECT c.id, c.session_id, c.user_id, u.username, u.avatar_url,
                    c.content, c.created_at, c.updated_at
             FROM updated c
             JOIN users u ON u.id = c.user_id",
        )
        .bind(content)
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SurfError::NotFoundOrUnauthorized(NOT_FOUND_OR_UNAUTHORIZED.to_string()))
    }

    /// Delete a comment; author only
    pub async fn delete(&self, comment_id: Uuid, user_id: Uuid) -> SurfResult<()> {
        let result = sqlx::query("DELETE FROM session_comments WHERE id = $1 AND user_id = $2")
            .bind(comment_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SurfError::NotFoundOrUnauthorized(
                NOT_FOUND_OR_UNAUTHORIZED.to_string(),
            ));
        }

        Ok(())
    }
}
