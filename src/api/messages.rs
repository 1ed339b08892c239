/// Direct message endpoints
use crate::{
    api::{JsonBody, PathParam},
    auth::AuthUser,
    context::AppContext,
    error::{SurfError, SurfResult},
    messaging::SendMessageRequest,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

/// Build message routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/unread-count", get(unread_count))
        .route("/conversations", get(list_conversations))
        .route("/conversation/:user_id", get(get_thread))
        .route("/send", post(send_message))
}

async fn unread_count(State(ctx): State<AppContext>, user: AuthUser) -> SurfResult<Json<Value>> {
    let count = ctx.message_manager.unread_count(user.id).await?;
    Ok(Json(json!({ "unreadCount": count })))
}

async fn list_conversations(
    State(ctx): State<AppContext>,
    user: AuthUser,
) -> SurfResult<Json<Value>> {
    let conversations = ctx.message_manager.list_conversations(user.id).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

async fn get_thread(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(other_user_id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    let messages = ctx
        .message_manager
        .get_thread(user.id, other_user_id)
        .await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn send_message(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Json(req), _): JsonBody<SendMessageRequest>,
) -> SurfResult<impl IntoResponse> {
    let req = req.normalize();
    req.validate()?;

    let receiver_id = req
        .receiver_id
        .ok_or_else(|| SurfError::field("receiver_id", "A valid receiver id is required"))?;

    let message = ctx
        .message_manager
        .send(user.id, receiver_id, &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Message sent successfully",
            "messageData": message
        })),
    ))
}
