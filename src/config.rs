/// Configuration management for Session Surf Club
use crate::error::{SurfError, SurfResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub uploads: UploadConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL of the web client, used to build links in emails
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
}

/// Postgres connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connect_timeout: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued tokens in seconds
    pub jwt_expires_in: i64,
    pub bcrypt_cost: u32,
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub directory: PathBuf,
    /// Maximum accepted file size in bytes
    pub max_file_size: usize,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
    pub json: bool,
}

pub const DEFAULT_LOG_FILTER: &str = "surf_club=debug,tower_http=debug";

/// Upper bound on `SURF_JWT_EXPIRES_IN`
pub const MAX_JWT_LIFETIME_SECS: i64 = 365 * 86400;

pub const DEFAULT_FROM_ADDRESS: &str = "\"Session Surf Club\" <noreply@sessionsurf.com>";

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SurfResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SURF_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SURF_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| SurfError::Internal("Invalid port number".to_string()))?;
        let frontend_url = env::var("SURF_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origins = env::var("SURF_CORS_ORIGINS")
            .unwrap_or_else(|_| frontend_url.clone())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let url = env::var("DATABASE_URL")
            .map_err(|_| SurfError::Internal("DATABASE_URL must be set".to_string()))?;
        let max_connections = env_or("SURF_DB_MAX_CONNECTIONS", 10);
        let min_connections = env_or("SURF_DB_MIN_CONNECTIONS", 1);
        let connect_timeout = env_or("SURF_DB_CONNECT_TIMEOUT", 30);

        let jwt_secret = env::var("SURF_JWT_SECRET")
            .map_err(|_| SurfError::Internal("SURF_JWT_SECRET must be set".to_string()))?;
        let jwt_expires_in = parse_expiry(
            &env::var("SURF_JWT_EXPIRES_IN").unwrap_or_else(|_| "7d".to_string()),
        )?;
        let bcrypt_cost = env_or("SURF_BCRYPT_COST", 12);

        let directory = env::var("SURF_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let max_file_size = env_or("SURF_UPLOAD_LIMIT", 5 * 1024 * 1024);

        let email = env::var("SURF_EMAIL_SMTP_URL").ok().map(|smtp_url| EmailConfig {
            smtp_url,
            from_address: env::var("SURF_EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
        });

        let rate_limit_enabled = env_or("SURF_RATE_LIMITS_ENABLED", true);

        let level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        let json = env::var("SURF_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                frontend_url,
                cors_origins,
            },
            database: DatabaseConfig {
                url,
                max_connections,
                min_connections,
                connect_timeout,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_expires_in,
                bcrypt_cost,
            },
            uploads: UploadConfig {
                directory,
                max_file_size,
            },
            email,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
            },
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> SurfResult<()> {
        if self.service.hostname.is_empty() {
            return Err(SurfError::Internal("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(SurfError::Internal(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if !(4..=31).contains(&self.authentication.bcrypt_cost) {
            return Err(SurfError::Internal(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }

        if !(1..=MAX_JWT_LIFETIME_SECS).contains(&self.authentication.jwt_expires_in) {
            return Err(SurfError::Internal(
                "JWT lifetime must be between 1 second and 365 days".to_string(),
            ));
        }

        if self.uploads.max_file_size == 0 {
            return Err(SurfError::Internal("Upload limit cannot be zero".to_string()));
        }

        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s` or bare seconds
pub fn parse_expiry(value: &str) -> SurfResult<i64> {
    let value = value.trim();
    let invalid = || SurfError::Internal(format!("Invalid token lifetime: {:?}", value));

    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], c),
        Some(_) => (value, 's'),
        None => return Err(invalid()),
    };

    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(invalid()),
    };

    amount.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 5000,
                frontend_url: "http://localhost:3000".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            database: DatabaseConfig {
                url: "postgres://localhost/surf".to_string(),
                max_connections: 5,
                min_connections: 1,
                connect_timeout: 5,
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                jwt_expires_in: 3600,
                bcrypt_cost: 12,
            },
            uploads: UploadConfig {
                directory: PathBuf::from("./uploads"),
                max_file_size: 1024,
            },
            email: None,
            rate_limit: RateLimitConfig { enabled: true },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }

    #[test]
    fn test_parse_expiry_units() {
        assert_eq!(parse_expiry("7d").unwrap(), 7 * 86400);
        assert_eq!(parse_expiry("12h").unwrap(), 12 * 3600);
        assert_eq!(parse_expiry("30m").unwrap(), 1800);
        assert_eq!(parse_expiry("45s").unwrap(), 45);
        assert_eq!(parse_expiry("3600").unwrap(), 3600);
    }

    #[test]
    fn test_parse_expiry_rejects_garbage() {
        assert!(parse_expiry("").is_err());
        assert!(parse_expiry("d").is_err());
        assert!(parse_expiry("7w").is_err());
        assert!(parse_expiry("soon").is_err());
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_short_secret() {
        let mut config = sample_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bcrypt_cost_bounds() {
        let mut config = sample_config();
        config.authentication.bcrypt_cost = 3;
        assert!(config.validate().is_err());
        config.authentication.bcrypt_cost = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_jwt_lifetime_bounds() {
        let mut config = sample_config();
        config.authentication.jwt_expires_in = MAX_JWT_LIFETIME_SECS;
        assert!(config.validate().is_ok());

        config.authentication.jwt_expires_in = MAX_JWT_LIFETIME_SECS + 1;
        assert!(config.validate().is_err());

        config.authentication.jwt_expires_in = parse_expiry("9999999999d").unwrap();
        assert!(config.validate().is_err());

        config.authentication.jwt_expires_in = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample_config().bind_address(), "127.0.0.1:5000");
    }
}
