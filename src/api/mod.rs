/// API routes and handlers
pub mod auth;
pub mod comments;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod sessions;
pub mod users;

use crate::{context::AppContext, error::SurfError};
use axum::{extract::Path, Json, Router};
use axum_extra::extract::WithRejection;

/// JSON body whose rejection renders as a [`SurfError`]
pub type JsonBody<T> = WithRejection<Json<T>, SurfError>;

/// Path parameters whose rejection renders as a [`SurfError`]
pub type PathParam<T> = WithRejection<Path<T>, SurfError>;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/sessions", sessions::routes())
        .nest("/api/likes", likes::routes())
        .nest("/api/comments", comments::routes())
        .nest("/api/messages", messages::routes())
        .nest("/api/users", users::routes())
}
