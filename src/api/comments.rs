/// Comment endpoints
use crate::{
    api::{JsonBody, PathParam},
    auth::AuthUser,
    context::AppContext,
    error::SurfResult,
    social::CommentRequest,
    validation::PageQuery,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

const COMMENTS_DEFAULT_LIMIT: i64 = 20;
const COMMENTS_MAX_LIMIT: i64 = 50;

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/session/:session_id", get(list_comments).post(add_comment))
        .route("/:comment_id", put(update_comment).delete(delete_comment))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    _user: AuthUser,
    WithRejection(Path(session_id), _): PathParam<Uuid>,
    Query(query): Query<PageQuery>,
) -> SurfResult<Json<Value>> {
    let (page, limit) = query.resolve(COMMENTS_DEFAULT_LIMIT, COMMENTS_MAX_LIMIT);
    let result = ctx.comment_manager.list(session_id, page, limit).await?;

    Ok(Json(json!({
        "comments": result.comments,
        "pagination": {
            "currentPage": result.pagination.current_page,
            "totalPages": result.pagination.total_pages,
            "totalComments": result.total,
            "hasNext": result.pagination.has_next,
            "hasPrev": result.pagination.has_prev
        }
    })))
}

async fn add_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(session_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<CommentRequest>,
) -> SurfResult<impl IntoResponse> {
    let req = req.normalize();
    req.validate()?;

    let comment = ctx
        .comment_manager
        .add(user.id, session_id, &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added successfully",
            "comment": comment
        })),
    ))
}

async fn update_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(comment_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<CommentRequest>,
) -> SurfResult<Json<Value>> {
    let req = req.normalize();
    req.validate()?;

    let comment = ctx
        .comment_manager
        .update(comment_id, user.id, &req.content)
        .await?;

    Ok(Json(json!({
        "message": "Comment updated successfully",
        "comment": comment
    })))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(comment_id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    ctx.comment_manager.delete(comment_id, user.id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
