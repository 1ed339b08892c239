use crate::error::{SurfError, SurfResult};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Like state of a session relative to one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

/// Like manager
#[derive(Clone)]
pub struct LikeManager {
    db: PgPool,
}

impl LikeManager {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Like the session if the user has not, otherwise remove the like
    ///
    /// The `(user_id, session_id)` unique constraint is what keeps concurrent
    /// toggles from producing duplicate likes.
    pub async fn toggle(&self, user_id: Uuid, session_id: Uuid) -> SurfResult<LikeState> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM surf_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db)
            .await?;

        if exists.is_none() {
            return Err(SurfError::NotFound("Session not found".to_string()));
        }

        let removed = sqlx::query("DELETE FROM session_likes WHERE user_id = $1 AND session_id = $2")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        let liked = if removed > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO session_likes (id, user_id, session_id) VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, session_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(session_id)
            .execute(&self.db)
            .await
            .map_err(|e| match SurfError::from(e) {
                // Session deleted between the check and the insert
                SurfError::Database(db) if is_foreign_key_violation(&db) => {
                    SurfError::NotFound("Session not found".to_string())
                }
                other => other,
            })?;
            true
        };

        let like_count = self.count(session_id).await?;

        Ok(LikeState { liked, like_count })
    }

    /// Like count and whether `user_id` is among the likers
    pub async fn status(&self, user_id: Uuid, session_id: Uuid) -> SurfResult<LikeState> {
        let (like_count, liked): (i64, bool) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $1), FALSE)
             FROM session_likes WHERE session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.db)
        .await?;

        Ok(LikeState { liked, like_count })
    }

    async fn count(&self, session_id: Uuid) -> SurfResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM session_likes WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23503")
        .unwrap_or(false)
}
