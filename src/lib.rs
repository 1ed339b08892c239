//! Session Surf Club - REST backend
//!
//! Users register and verify their email, log surf sessions with photos and
//! conditions, and interact through likes, comments and direct messages.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod messaging;
pub mod rate_limit;
pub mod server;
pub mod sessions;
pub mod social;
pub mod uploads;
pub mod validation;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{SurfError, SurfResult};
