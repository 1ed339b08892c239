/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::SurfResult,
    mailer::Mailer,
    messaging::MessageManager,
    rate_limit::{RateLimitSettings, RateLimiter},
    sessions::SessionManager,
    social::{CommentManager, LikeManager},
    uploads::UploadStore,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: PgPool,
    pub account_manager: Arc<AccountManager>,
    pub session_manager: Arc<SessionManager>,
    pub like_manager: Arc<LikeManager>,
    pub comment_manager: Arc<CommentManager>,
    pub message_manager: Arc<MessageManager>,
    pub uploads: UploadStore,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    ///
    /// Connects to Postgres, applies migrations and prepares the upload directory.
    pub async fn new(config: ServerConfig) -> SurfResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.database).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let mailer = Mailer::new(config.email.clone(), &config.service.frontend_url)?;
        if !mailer.is_configured() {
            tracing::warn!("SURF_EMAIL_SMTP_URL not set, outgoing email is disabled");
        }

        let context = Self::from_parts(config, pool, mailer);
        context.uploads.ensure_dir().await?;

        Ok(context)
    }

    /// Assemble the context around an existing pool and mailer
    pub fn from_parts(config: ServerConfig, pool: PgPool, mailer: Mailer) -> Self {
        let config = Arc::new(config);
        let uploads = UploadStore::new(
            config.uploads.directory.clone(),
            config.uploads.max_file_size,
        );

        let account_manager = Arc::new(AccountManager::new(
            pool.clone(),
            Arc::clone(&config),
            mailer,
            uploads.clone(),
        ));
        let session_manager = Arc::new(SessionManager::new(pool.clone(), uploads.clone()));
        let like_manager = Arc::new(LikeManager::new(pool.clone()));
        let comment_manager = Arc::new(CommentManager::new(pool.clone()));
        let message_manager = Arc::new(MessageManager::new(pool.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.enabled,
            RateLimitSettings::default(),
        ));

        Self {
            config,
            db: pool,
            account_manager,
            session_manager,
            like_manager,
            comment_manager,
            message_manager,
            uploads,
            rate_limiter,
        }
    }
}
