/// Surf session endpoints: feed, own sessions and CRUD
use crate::{
    api::{
        middleware::{read_upload_form, UploadForm},
        PathParam,
    },
    auth::AuthUser,
    context::AppContext,
    error::{SurfError, SurfResult},
    validation::{ImageChange, PageQuery, SessionFields},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use uuid::Uuid;

const FEED_DEFAULT_LIMIT: i64 = 10;
const FEED_MAX_LIMIT: i64 = 50;

/// Build session routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_feed).post(create_session))
        .route("/my-sessions", get(list_my_sessions))
        .route(
            "/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
}

async fn list_feed(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> SurfResult<Json<Value>> {
    let (page, limit) = query.resolve(FEED_DEFAULT_LIMIT, FEED_MAX_LIMIT);
    let feed = ctx.session_manager.list_feed(user.id, page, limit).await?;

    Ok(Json(json!({
        "sessions": feed.sessions,
        "pagination": {
            "currentPage": feed.pagination.current_page,
            "totalPages": feed.pagination.total_pages,
            "totalSessions": feed.total,
            "hasNext": feed.pagination.has_next,
            "hasPrev": feed.pagination.has_prev
        }
    })))
}

async fn list_my_sessions(
    State(ctx): State<AppContext>,
    user: AuthUser,
) -> SurfResult<Json<Value>> {
    let sessions = ctx.session_manager.list_mine(user.id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// Validate the text fields, then store the image if one was sent
async fn parse_session_form(
    ctx: &AppContext,
    multipart: Multipart,
) -> SurfResult<(SessionFields, Option<String>, Option<String>)> {
    let UploadForm { fields, file } = read_upload_form(multipart, "image").await?;
    let session_fields = SessionFields::from_form(&fields)?;

    let image_url = match file {
        Some(bytes) => Some(ctx.uploads.save_image("image", &bytes).await?),
        None => None,
    };

    let keep_current_image = fields.get("keep_current_image").cloned();
    Ok((session_fields, image_url, keep_current_image))
}

async fn create_session(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, SurfError>,
) -> SurfResult<impl IntoResponse> {
    let (fields, image_url, _) = parse_session_form(&ctx, multipart).await?;

    // No current image exists yet, so only an upload yields one
    let image = ImageChange::resolve(image_url, None);
    let session = ctx.session_manager.create(user.id, fields, image).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Session created successfully",
            "session": session
        })),
    ))
}

async fn get_session(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    let session = ctx.session_manager.get(id, user.id).await?;
    Ok(Json(json!({ "session": session })))
}

async fn update_session(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(multipart, _): WithRejection<Multipart, SurfError>,
) -> SurfResult<Json<Value>> {
    let (fields, image_url, keep_current_image) = parse_session_form(&ctx, multipart).await?;

    let image = ImageChange::resolve(image_url, keep_current_image.as_deref());
    let session = ctx
        .session_manager
        .update(id, user.id, fields, image)
        .await?;

    Ok(Json(json!({
        "message": "Session updated successfully",
        "session": session
    })))
}

async fn delete_session(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    ctx.session_manager.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Session deleted successfully" })))
}
