/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{SurfError, SurfResult},
    rate_limit::rate_limit_middleware,
    uploads::PUBLIC_PREFIX,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Multipart framing and text fields on top of the file itself
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let body_limit = ctx.uploads.max_file_size() + FORM_OVERHEAD_BYTES;
    let uploads = ServeDir::new(ctx.uploads.base_path());

    Router::new()
        .route("/health", get(health_check))
        .merge(crate::api::routes())
        .nest_service(PUBLIC_PREFIX.trim_end_matches('/'), uploads)
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx.clone(), rate_limit_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&ctx.config.service.cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(allowed)
}

/// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> SurfResult<()> {
    let addr = ctx.config.bind_address();

    info!("Session Surf Club API listening on {}", addr);
    info!("   Frontend URL: {}", ctx.config.service.frontend_url);
    info!("   Uploads: {}", ctx.uploads.base_path().display());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SurfError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| SurfError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
