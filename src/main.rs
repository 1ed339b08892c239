/// Session Surf Club API server
use anyhow::Context;
use std::sync::Arc;
use surf_club::{
    config::{LoggingConfig, DEFAULT_LOG_FILTER},
    jobs, server, AppContext, ServerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Session Surf Club v{}", env!("CARGO_PKG_VERSION"));

    let ctx = AppContext::new(config)
        .await
        .context("Failed to initialize application")?;
    let ctx = Arc::new(ctx);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
