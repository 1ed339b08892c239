/// Like toggle and status endpoints
use crate::{api::PathParam, auth::AuthUser, context::AppContext, error::SurfResult};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use uuid::Uuid;

/// Build like routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/session/:session_id", post(toggle_like).get(like_status))
}

async fn toggle_like(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(session_id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    let state = ctx.like_manager.toggle(user.id, session_id).await?;

    let message = if state.liked {
        "Session liked"
    } else {
        "Session unliked"
    };

    Ok(Json(json!({
        "message": message,
        "liked": state.liked,
        "likeCount": state.like_count
    })))
}

async fn like_status(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(session_id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    let state = ctx.like_manager.status(user.id, session_id).await?;

    Ok(Json(json!({
        "likeCount": state.like_count,
        "userLiked": state.liked
    })))
}
