/// Account manager implementation using runtime queries
use crate::{
    account::{LoginRequest, Registration, RegisterRequest, LoginResult},
    auth::issue_token,
    config::ServerConfig,
    db::models::{ProfileView, PublicProfile, User, UserSummary, UserView},
    error::{SurfError, SurfResult},
    mailer::Mailer,
    uploads::UploadStore,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const VERIFICATION_TTL_HOURS: i64 = 24;
const RESET_TTL_HOURS: i64 = 1;
const SEARCH_LIMIT: i64 = 10;

/// Generic reply for password reset requests, whether or not the email exists
pub const RESET_REQUESTED_MESSAGE: &str = "If this email exists, a reset link has been sent";

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    db: PgPool,
    config: Arc<ServerConfig>,
    mailer: Mailer,
    uploads: UploadStore,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: PgPool, config: Arc<ServerConfig>, mailer: Mailer, uploads: UploadStore) -> Self {
        Self {
            db,
            config,
            mailer,
            uploads,
        }
    }

    /// Register a new, unverified account
    ///
    /// The request must already be normalized and validated. A token is
    /// issued straight away, but protected routes stay closed until the
    /// email address is verified.
    pub async fn register(&self, request: RegisterRequest) -> SurfResult<Registration> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 OR username = $2")
                .bind(&request.email)
                .bind(&request.username)
                .fetch_optional(&self.db)
                .await?;

        if existing.is_some() {
            return Err(SurfError::Conflict("User already exists".to_string()));
        }

        let password_hash =
            hash_password(request.password, self.config.authentication.bcrypt_cost).await?;

        let verification_token = generate_token();
        let verification_expires = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, username, password_hash, email_verified,
                                email_verification_token, email_verification_expires)
             VALUES ($1, $2, $3, $4, FALSE, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&request.username)
        .bind(&password_hash)
        .bind(&verification_token)
        .bind(verification_expires)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            let err = SurfError::Database(e);
            if err.is_unique_violation() {
                SurfError::Conflict("User already exists".to_string())
            } else {
                err
            }
        })?;

        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, &user.username, &verification_token)
            .await
        {
            tracing::warn!("Verification email to {} failed: {}", user.email, e);
        }

        let token = issue_token(user.id, &self.config.authentication)?;

        tracing::info!("Registered account {} ({})", user.username, user.id);

        Ok(Registration {
            token,
            user: UserView::from(&user),
        })
    }

    /// Consume a verification token
    pub async fn verify_email(&self, token: &str) -> SurfResult<UserView> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users
             SET email_verified = TRUE,
                 email_verification_token = NULL,
                 email_verification_expires = NULL
             WHERE email_verification_token = $1 AND email_verification_expires > NOW()
             RETURNING *",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            SurfError::InvalidOrExpiredToken("Invalid or expired verification token".to_string())
        })?;

        tracing::info!("Verified email for {}", user.id);
        Ok(UserView::from(&user))
    }

    /// Issue a fresh verification token and email it
    pub async fn resend_verification(&self, email: &str) -> SurfResult<()> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| SurfError::NotFound("User not found".to_string()))?;

        if user.email_verified {
            return Err(SurfError::AlreadyVerified);
        }

        let verification_token = generate_token();
        let verification_expires = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);

        sqlx::query(
            "UPDATE users SET email_verification_token = $1, email_verification_expires = $2
             WHERE id = $3",
        )
        .bind(&verification_token)
        .bind(verification_expires)
        .bind(user.id)
        .execute(&self.db)
        .await?;

        // Delivery is the point of this request, so a failure is reported
        self.mailer
            .send_verification_email(&user.email, &user.username, &verification_token)
            .await
    }

    /// Check credentials and issue a token
    pub async fn login(&self, request: LoginRequest) -> SurfResult<LoginResult> {
        let user = self
            .find_by_email(&request.email)
            .await?
            .ok_or(SurfError::InvalidCredentials)?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            return Err(SurfError::InvalidCredentials);
        }

        if !user.email_verified {
            return Err(SurfError::VerificationRequired { email: user.email });
        }

        let token = issue_token(user.id, &self.config.authentication)?;

        Ok(LoginResult {
            token,
            user: UserView::from(&user),
        })
    }

    /// Start a password reset for a verified account
    ///
    /// Unknown and unverified addresses succeed silently; email failures are logged.
    pub async fn forgot_password(&self, email: &str) -> SurfResult<()> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(());
        };

        if !user.email_verified {
            return Ok(());
        }

        let reset_token = generate_token();
        let reset_expires = Utc::now() + Duration::hours(RESET_TTL_HOURS);

        sqlx::query(
            "UPDATE users SET password_reset_token = $1, password_reset_expires = $2 WHERE id = $3",
        )
        .bind(&reset_token)
        .bind(reset_expires)
        .bind(user.id)
        .execute(&self.db)
        .await?;

        if let Err(e) = self
            .mailer
            .send_password_reset_email(&user.email, &user.username, &reset_token)
            .await
        {
            tracing::warn!("Password reset email to {} failed: {}", user.email, e);
        }

        Ok(())
    }

    /// Set a new password using a reset token
    pub async fn reset_password(&self, token: &str, new_password: String) -> SurfResult<()> {
        let invalid =
            || SurfError::InvalidOrExpiredToken("Invalid or expired reset token".to_string());

        let (user_id,): (Uuid,) = sqlx::query_as(
            "SELECT id FROM users WHERE password_reset_token = $1 AND password_reset_expires > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(invalid)?;

        let password_hash =
            hash_password(new_password, self.config.authentication.bcrypt_cost).await?;

        // The token condition is repeated so a concurrent reset cannot reuse it
        let result = sqlx::query(
            "UPDATE users
             SET password_hash = $1, password_reset_token = NULL, password_reset_expires = NULL
             WHERE id = $2 AND password_reset_token = $3",
        )
        .bind(&password_hash)
        .bind(user_id)
        .bind(token)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(invalid());
        }

        tracing::info!("Password reset for {}", user_id);
        Ok(())
    }

    /// Own profile with session count
    pub async fn profile(&self, user_id: Uuid) -> SurfResult<ProfileView> {
        sqlx::query_as::<_, ProfileView>(
            "SELECT u.id, u.email, u.username, u.avatar_url, u.email_verified, u.created_at,
                    (SELECT COUNT(*) FROM surf_sessions s WHERE s.user_id = u.id) AS session_count
             FROM users u
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SurfError::NotFound("User not found".to_string()))
    }

    /// Point the avatar at a stored upload, removing the previous file
    pub async fn update_avatar(&self, user_id: Uuid, avatar_url: &str) -> SurfResult<UserSummary> {
        let previous: Option<(Option<String>,)> =
            sqlx::query_as("SELECT avatar_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        let user = sqlx::query_as::<_, UserSummary>(
            "UPDATE users SET avatar_url = $1 WHERE id = $2 RETURNING id, username, avatar_url",
        )
        .bind(avatar_url)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SurfError::NotFound("User not found".to_string()))?;

        if let Some((Some(old_url),)) = previous {
            if old_url != avatar_url {
                self.uploads.remove_best_effort(&old_url).await;
            }
        }

        Ok(user)
    }

    /// Case-insensitive username search
    pub async fn search(&self, query: &str) -> SurfResult<Vec<UserSummary>> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Err(SurfError::BadRequest(
                "Search query must be at least 2 characters".to_string(),
            ));
        }

        let pattern = format!("%{}%", escape_like(query));

        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, avatar_url FROM users
             WHERE username ILIKE $1 ESCAPE '\\'
             ORDER BY username
             LIMIT $2",
        )
        .bind(pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// Another user's public profile
    pub async fn public_profile(&self, user_id: Uuid) -> SurfResult<PublicProfile> {
        sqlx::query_as::<_, PublicProfile>(
            "SELECT u.id, u.username, u.avatar_url, u.created_at,
                    (SELECT COUNT(*) FROM surf_sessions s WHERE s.user_id = u.id) AS session_count
             FROM users u
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SurfError::NotFound("User not found".to_string()))
    }

    /// Delete an account and everything it owns in one transaction
    ///
    /// Order: comments, likes, messages (both directions), sessions, user.
    /// Any failure rolls the whole transaction back. Uploaded files are
    /// removed only after the commit.
    pub async fn delete_account(&self, user_id: Uuid, password: String) -> SurfResult<()> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| SurfError::NotFound("User not found".to_string()))?;

        if !verify_password(password, user.password_hash.clone()).await? {
            return Err(SurfError::InvalidPassword);
        }

        let mut files: Vec<String> = sqlx::query_as::<_, (String,)>(
            "SELECT image_url FROM surf_sessions WHERE user_id = $1 AND image_url IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(url,)| url)
        .collect();
        files.extend(user.avatar_url.clone());

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM session_comments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM session_likes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM messages WHERE sender_id = $1 OR receiver_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Likes and comments by others on these sessions cascade
        sqlx::query("DELETE FROM surf_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for url in &files {
            self.uploads.remove_best_effort(url).await;
        }

        tracing::info!("Deleted account {} ({})", user.username, user_id);
        Ok(())
    }

    /// Null out verification and reset tokens past their expiry
    pub async fn clear_expired_tokens(&self) -> SurfResult<u64> {
        let verification = sqlx::query(
            "UPDATE users SET email_verification_token = NULL, email_verification_expires = NULL
             WHERE email_verification_expires IS NOT NULL AND email_verification_expires <= NOW()",
        )
        .execute(&self.db)
        .await?
        .rows_affected();

        let reset = sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL
             WHERE password_reset_expires IS NOT NULL AND password_reset_expires <= NOW()",
        )
        .execute(&self.db)
        .await?
        .rows_affected();

        Ok(verification + reset)
    }

    async fn find_by_email(&self, email: &str) -> SurfResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn hash_password(password: String, cost: u32) -> SurfResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| SurfError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(SurfError::from)
}

async fn verify_password(password: String, hash: String) -> SurfResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| SurfError::Internal(format!("Password check task failed: {}", e)))?
        .map_err(SurfError::from)
}

/// Escape LIKE metacharacters so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
