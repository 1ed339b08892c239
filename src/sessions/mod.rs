/// Surf session storage and feed queries
use crate::{
    db::models::{SessionRecord, SessionView},
    error::{SurfError, SurfResult},
    uploads::UploadStore,
    validation::{ImageChange, Pagination, SessionFields},
};
use sqlx::PgPool;
use uuid::Uuid;

/// Session columns joined with the author and social aggregates; `$1` is the viewer
const SESSION_VIEW_SELECT: &str = "
    SELECT s.id, s.user_id, u.username, u.avatar_url,
           s.title, s.description, s.image_url, s.location,
           s.wave_height, s.wave_period, s.wind_speed, s.wind_direction, s.tide_type,
           s.rating, s.created_at, s.updated_at,
           (SELECT COUNT(*) FROM session_likes l WHERE l.session_id = s.id) AS like_count,
           (SELECT COUNT(*) FROM session_comments c WHERE c.session_id = s.id) AS comment_count,
           EXISTS (
               SELECT 1 FROM session_likes ul WHERE ul.session_id = s.id AND ul.user_id = $1
           ) AS user_liked
    FROM surf_sessions s
    JOIN users u ON u.id = s.user_id";

const NOT_FOUND_OR_UNAUTHORIZED: &str = "Session not found or unauthorized";

/// One page of the feed
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub sessions: Vec<SessionView>,
    pub pagination: Pagination,
    pub total: i64,
}

/// Session manager
#[derive(Clone)]
pub struct SessionManager {
    db: PgPool,
    uploads: UploadStore,
}

impl SessionManager {
    pub fn new(db: PgPool, uploads: UploadStore) -> Self {
        Self { db, uploads }
    }

    /// Newest sessions first, annotated relative to `viewer`
    pub async fn list_feed(&self, viewer: Uuid, page: i64, limit: i64) -> SurfResult<FeedPage> {
        let sessions = sqlx::query_as::<_, SessionView>(&format!(
            "{} ORDER BY s.created_at DESC, s.id DESC LIMIT $2 OFFSET $3",
            SESSION_VIEW_SELECT
        ))
        .bind(viewer)
        .bind(limit)
        .bind(Pagination::offset(page, limit))
        .fetch_all(&self.db)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM surf_sessions")
            .fetch_one(&self.db)
            .await?;

        Ok(FeedPage {
            sessions,
            pagination: Pagination::new(page, limit, total),
            total,
        })
    }

    /// The viewer's own sessions
    pub async fn list_mine(&self, viewer: Uuid) -> SurfResult<Vec<SessionView>> {
        self.list_for_user(viewer, viewer).await
    }

    /// All sessions of `owner`, annotated relative to `viewer`
    pub async fn list_for_user(&self, owner: Uuid, viewer: Uuid) -> SurfResult<Vec<SessionView>> {
        let sessions = sqlx::query_as::<_, SessionView>(&format!(
            "{} WHERE s.user_id = $2 ORDER BY s.created_at DESC, s.id DESC",
            SESSION_VIEW_SELECT
        ))
        .bind(viewer)
        .bind(owner)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    /// Store a new session
    ///
    /// `image` is resolved against no current image, so only an upload sets one.
    pub async fn create(
        &self,
        owner: Uuid,
        fields: SessionFields,
        image: ImageChange,
    ) -> SurfResult<SessionRecord> {
        let session = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO surf_sessions (
                 id, user_id, title, description, image_url, location,
                 wave_height, wave_period, wind_speed, wind_direction, tide_type, rating
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(image.apply(None))
        .bind(&fields.location)
        .bind(fields.wave_height)
        .bind(fields.wave_period)
        .bind(fields.wind_speed)
        .bind(fields.wind_direction.as_str())
        .bind(fields.tide_type.as_str())
        .bind(fields.rating)
        .fetch_one(&self.db)
        .await;

        let session = match session {
            Ok(session) => session,
            Err(e) => {
                self.discard_upload(&image).await;
                return Err(e.into());
            }
        };

        tracing::debug!("Session {} created by {}", session.id, owner);
        Ok(session)
    }

    pub async fn get(&self, id: Uuid, viewer: Uuid) -> SurfResult<SessionView> {
        sqlx::query_as::<_, SessionView>(&format!("{} WHERE s.id = $2", SESSION_VIEW_SELECT))
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| SurfError::NotFound("Session not found".to_string()))
    }

    /// Replace a session's attributes; owner only
    pub async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: SessionFields,
        image: ImageChange,
    ) -> SurfResult<SessionRecord> {
        let current: Option<(Option<String>,)> =
            sqlx::query_as("SELECT image_url FROM surf_sessions WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.db)
                .await?;

        let Some((current_image,)) = current else {
            self.discard_upload(&image).await;
            return Err(SurfError::NotFoundOrUnauthorized(
                NOT_FOUND_OR_UNAUTHORIZED.to_string(),
            ));
        };

        let new_image = image.apply(current_image.clone());

        let session = sqlx::query_as::<_, SessionRecord>(
            "UPDATE surf_sessions
             SET title = $1, description = $2, image_url = $3, location = $4,
                 wave_height = $5, wave_period = $6, wind_speed = $7,
                 wind_direction = $8, tide_type = $9, rating = $10, updated_at = NOW()
             WHERE id = $11 AND user_id = $12
             RETURNING *",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&new_image)
        .bind(&fields.location)
        .bind(fields.wave_height)
        .bind(fields.wave_period)
        .bind(fields.wind_speed)
        .bind(fields.wind_direction.as_str())
        .bind(fields.tide_type.as_str())
        .bind(fields.rating)
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;

        let Some(session) = session else {
            // Deleted between the two statements
            self.discard_upload(&image).await;
            return Err(SurfError::NotFoundOrUnauthorized(
                NOT_FOUND_OR_UNAUTHORIZED.to_string(),
            ));
        };

        if let Some(old) = current_image {
            if new_image.as_deref() != Some(old.as_str()) {
                self.uploads.remove_best_effort(&old).await;
            }
        }

        Ok(session)
    }

    /// Delete a session; owner only. Likes and comments cascade.
    pub async fn delete(&self, id: Uuid, owner: Uuid) -> SurfResult<()> {
        let deleted: Option<(Option<String>,)> = sqlx::query_as(
            "DELETE FROM surf_sessions WHERE id = $1 AND user_id = $2 RETURNING image_url",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;

        match deleted {
            Some((image_url,)) => {
                if let Some(url) = image_url {
                    self.uploads.remove_best_effort(&url).await;
                }
                tracing::debug!("Session {} deleted by {}", id, owner);
                Ok(())
            }
            None => Err(SurfError::NotFoundOrUnauthorized(
                NOT_FOUND_OR_UNAUTHORIZED.to_string(),
            )),
        }
    }

    async fn discard_upload(&self, image: &ImageChange) {
        if let ImageChange::Replace(url) = image {
            self.uploads.remove_best_effort(url).await;
        }
    }
}
