/// Unified error types for Session Surf Club
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum SurfError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input validation errors, one entry per violated field
    #[error("Validation failed ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),

    /// Malformed request that is not tied to a single field
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate email or username
    #[error("{0}")]
    Conflict(String),

    /// Verification or reset token unknown or past its expiry
    #[error("{0}")]
    InvalidOrExpiredToken(String),

    #[error("Email already verified")]
    AlreadyVerified,

    /// Missing, malformed or expired bearer token
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown email or wrong password, reported identically
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    VerificationRequired { email: String },

    /// Password re-confirmation failed
    #[error("Invalid password")]
    InvalidPassword,

    #[error("{0}")]
    NotFound(String),

    /// Resource missing or owned by someone else, reported identically
    #[error("{0}")]
    NotFoundOrUnauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Email delivery errors
    #[error("Email error: {0}")]
    Email(String),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SurfError {
    /// Shorthand for a validation error on a single field
    pub fn field(field: &str, message: &str) -> Self {
        SurfError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SurfError::Validation(_)
            | SurfError::BadRequest(_)
            | SurfError::Conflict(_)
            | SurfError::InvalidOrExpiredToken(_)
            | SurfError::AlreadyVerified => StatusCode::BAD_REQUEST,
            SurfError::Unauthorized(_)
            | SurfError::InvalidCredentials
            | SurfError::VerificationRequired { .. }
            | SurfError::InvalidPassword => StatusCode::UNAUTHORIZED,
            SurfError::NotFound(_) | SurfError::NotFoundOrUnauthorized(_) => StatusCode::NOT_FOUND,
            SurfError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            SurfError::Database(_)
            | SurfError::Email(_)
            | SurfError::Jwt(_)
            | SurfError::Io(_)
            | SurfError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            SurfError::Validation(_) => "ValidationError",
            SurfError::BadRequest(_) => "BadRequest",
            SurfError::Conflict(_) => "Conflict",
            SurfError::InvalidOrExpiredToken(_) => "InvalidOrExpiredToken",
            SurfError::AlreadyVerified => "AlreadyVerified",
            SurfError::Unauthorized(_) => "Unauthorized",
            SurfError::InvalidCredentials => "InvalidCredentials",
            SurfError::VerificationRequired { .. } => "VerificationRequired",
            SurfError::InvalidPassword => "InvalidPassword",
            SurfError::NotFound(_) => "NotFound",
            SurfError::NotFoundOrUnauthorized(_) => "NotFoundOrUnauthorized",
            SurfError::RateLimitExceeded => "RateLimitExceeded",
            _ => "ServerError",
        }
    }

    /// True when the error came from a Postgres unique constraint (SQLSTATE 23505)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SurfError::Database(e) => e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code == "23505")
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for SurfError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        // HashMap iteration order is unstable
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        SurfError::Validation(fields)
    }
}

impl From<bcrypt::BcryptError> for SurfError {
    fn from(err: bcrypt::BcryptError) -> Self {
        SurfError::Internal(format!("Password hashing failed: {}", err))
    }
}

impl From<JsonRejection> for SurfError {
    fn from(rejection: JsonRejection) -> Self {
        SurfError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for SurfError {
    fn from(rejection: PathRejection) -> Self {
        SurfError::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for SurfError {
    fn from(rejection: MultipartRejection) -> Self {
        SurfError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for SurfError {
    fn from(err: MultipartError) -> Self {
        SurfError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Convert SurfError to HTTP response
impl IntoResponse for SurfError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Don't leak details
            tracing::error!("Request failed: {}", self);
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = ErrorResponse {
            error: self.code().to_string(),
            message,
            errors: None,
            requires_verification: None,
            email: None,
        };

        match self {
            SurfError::Validation(errors) => {
                body.message = "Validation failed".to_string();
                body.errors = Some(errors);
            }
            SurfError::VerificationRequired { email } => {
                body.requires_verification = Some(true);
                body.email = Some(email);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for service operations
pub type SurfResult<T> = Result<T, SurfError>;
