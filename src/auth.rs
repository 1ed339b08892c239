/// Bearer token issuance, verification and the authenticated-user extractor
use crate::{
    api::middleware::extract_bearer_token,
    config::AuthConfig,
    context::AppContext,
    error::{SurfError, SurfResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// JWT claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed HS256 token for a user
pub fn issue_token(user_id: Uuid, config: &AuthConfig) -> SurfResult<String> {
    let now = Utc::now().timestamp();
    let exp = now
        .checked_add(config.jwt_expires_in)
        .ok_or_else(|| SurfError::Jwt("Token lifetime out of range".to_string()))?;
    let claims = Claims {
        user_id,
        iat: now,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| SurfError::Jwt(format!("Failed to generate token: {}", e)))
}

/// Verify signature and expiry, returning the claims
pub fn verify_token(token: &str, jwt_secret: &str) -> SurfResult<Claims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    SurfError::Unauthorized("Token has expired".to_string())
                }
                _ => SurfError::Unauthorized("Invalid token".to_string()),
            }
        })
}

/// The authenticated requester, re-validated against the database on every request
#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = SurfError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| SurfError::Unauthorized("Access token required".to_string()))?;

        let claims = verify_token(&token, &state.config.authentication.jwt_secret)?;

        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT id, username, email, email_verified FROM users WHERE id = $1",
        )
        .bind(claims.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| SurfError::Unauthorized("Invalid token".to_string()))?;

        // Tokens are issued at registration, but protected actions wait for verification
        if !user.email_verified {
            return Err(SurfError::VerificationRequired { email: user.email });
        }

        Ok(user)
    }
}
