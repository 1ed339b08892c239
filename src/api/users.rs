/// User profile, avatar, search and account deletion endpoints
use crate::{
    account::DeleteAccountRequest,
    api::{
        middleware::{read_upload_form, UploadForm},
        PathParam,
    },
    auth::AuthUser,
    context::AppContext,
    error::{SurfError, SurfResult},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/avatar", put(update_avatar))
        .route("/delete-account", delete(delete_account))
        .route("/search", get(search_users))
        .route("/:id", get(get_public_profile))
}

async fn get_profile(State(ctx): State<AppContext>, user: AuthUser) -> SurfResult<Json<Value>> {
    let profile = ctx.account_manager.profile(user.id).await?;
    Ok(Json(json!({ "user": profile })))
}

async fn update_avatar(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, SurfError>,
) -> SurfResult<Json<Value>> {
    let UploadForm { file, .. } = read_upload_form(multipart, "avatar").await?;
    let bytes = file.ok_or_else(|| SurfError::BadRequest("No avatar file provided".to_string()))?;

    let avatar_url = ctx.uploads.save_image("avatar", &bytes).await?;

    let updated = match ctx.account_manager.update_avatar(user.id, &avatar_url).await {
        Ok(updated) => updated,
        Err(e) => {
            ctx.uploads.remove_best_effort(&avatar_url).await;
            return Err(e);
        }
    };

    Ok(Json(json!({
        "message": "Avatar updated successfully",
        "user": updated
    })))
}

async fn delete_account(
    State(ctx): State<AppContext>,
    user: AuthUser,
    body: Option<Json<DeleteAccountRequest>>,
) -> SurfResult<Json<Value>> {
    let password = body
        .and_then(|Json(req)| req.password)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| SurfError::BadRequest("Password is required".to_string()))?;

    ctx.account_manager.delete_account(user.id, password).await?;

    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search_users(
    State(ctx): State<AppContext>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> SurfResult<Json<Value>> {
    let users = ctx
        .account_manager
        .search(query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(json!({ "users": users })))
}

async fn get_public_profile(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> SurfResult<Json<Value>> {
    let profile = ctx.account_manager.public_profile(id).await?;
    let sessions = ctx.session_manager.list_for_user(id, user.id).await?;

    Ok(Json(json!({
        "user": profile,
        "sessions": sessions
    })))
}
