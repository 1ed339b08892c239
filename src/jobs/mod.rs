/// Periodic maintenance jobs
use crate::context::AppContext;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

pub mod tasks;

const TOKEN_CLEANUP_PERIOD: Duration = Duration::from_secs(60 * 60);
const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Runs maintenance tasks on fixed periods for the lifetime of the process
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Spawn one tokio task per job
    pub fn start(self: Arc<Self>) {
        tokio::spawn(Arc::clone(&self).token_cleanup_loop());
        tokio::spawn(Arc::clone(&self).health_check_loop());

        info!(
            "Maintenance jobs scheduled: token cleanup every {}m, health check every {}m",
            TOKEN_CLEANUP_PERIOD.as_secs() / 60,
            HEALTH_CHECK_PERIOD.as_secs() / 60
        );
    }

    async fn token_cleanup_loop(self: Arc<Self>) {
        let mut ticker = interval(TOKEN_CLEANUP_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match tasks::cleanup_expired_tokens(&self.context).await {
                Ok(0) => debug!("No expired verification or reset tokens"),
                Ok(count) => info!("Cleared {} expired verification/reset tokens", count),
                Err(e) => error!("Expired token cleanup failed: {}", e),
            }
        }
    }

    async fn health_check_loop(self: Arc<Self>) {
        let mut ticker = interval(HEALTH_CHECK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = tasks::health_check(&self.context).await {
                error!("Database health check failed: {}", e);
            }

            let tracked = tasks::prune_rate_limits(&self.context);
            debug!("Rate limiter tracking {} client buckets", tracked);
        }
    }
}
