/// Background task implementations
use crate::{context::AppContext, error::SurfResult};

/// Clear verification and reset tokens past their expiry
pub async fn cleanup_expired_tokens(ctx: &AppContext) -> SurfResult<u64> {
    ctx.account_manager.clear_expired_tokens().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> SurfResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

/// Forget rate limit buckets of clients that have gone quiet
pub fn prune_rate_limits(ctx: &AppContext) -> usize {
    ctx.rate_limiter.retain_recent();
    ctx.rate_limiter.tracked_clients()
}
