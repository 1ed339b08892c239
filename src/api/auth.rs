/// Registration, verification, login and password reset endpoints
use crate::{
    account::{
        EmailRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, VerifyEmailRequest,
        RESET_REQUESTED_MESSAGE,
    },
    api::JsonBody,
    context::AppContext,
    error::SurfResult,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

async fn register(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> SurfResult<impl IntoResponse> {
    let req = req.normalize();
    req.validate()?;

    let registration = ctx.account_manager.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully. Please check your email to verify your account.",
            "token": registration.token,
            "user": registration.user,
            "requiresVerification": true
        })),
    ))
}

async fn verify_email(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<VerifyEmailRequest>,
) -> SurfResult<Json<Value>> {
    req.validate()?;

    let user = ctx.account_manager.verify_email(&req.token).await?;

    Ok(Json(json!({
        "message": "Email verified successfully",
        "user": user
    })))
}

async fn resend_verification(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<EmailRequest>,
) -> SurfResult<Json<Value>> {
    let req = req.normalize();
    req.validate()?;

    ctx.account_manager.resend_verification(&req.email).await?;

    Ok(Json(json!({ "message": "Verification email sent" })))
}

async fn login(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> SurfResult<Json<Value>> {
    let req = req.normalize();
    req.validate()?;

    let result = ctx.account_manager.login(req).await?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": result.token,
        "user": result.user
    })))
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<EmailRequest>,
) -> SurfResult<Json<Value>> {
    let req = req.normalize();
    req.validate()?;

    ctx.account_manager.forgot_password(&req.email).await?;

    Ok(Json(json!({ "message": RESET_REQUESTED_MESSAGE })))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): JsonBody<ResetPasswordRequest>,
) -> SurfResult<Json<Value>> {
    req.validate()?;

    ctx.account_manager
        .reset_password(&req.token, req.password)
        .await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}
