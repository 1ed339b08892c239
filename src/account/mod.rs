/// Account management system
///
/// Handles registration, email verification, login, password resets,
/// profiles, user search and account deletion.

mod manager;

pub use manager::{generate_token, AccountManager, RESET_REQUESTED_MESSAGE};

use crate::db::models::UserView;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl RegisterRequest {
    pub fn normalize(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self.username = self.username.trim().to_string();
        self
    }
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginRequest {
    pub fn normalize(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self
    }
}

/// Request carrying only an email (resend verification, forgot password)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

impl EmailRequest {
    pub fn normalize(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self
    }
}

/// Email verification request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Password reset request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Account deletion request
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: Option<String>,
}

/// Result of a successful registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub token: String,
    pub user: UserView,
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: UserView,
}
