/// Rate Limiting System
use crate::error::{SurfError, SurfResult};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

/// Limiter quotas, applied per client address
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Requests per second for `/api/auth/*`
    pub auth_rps: u32,
    pub auth_burst: u32,
    /// Requests per second for everything else under `/api`
    pub api_rps: u32,
    pub api_burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            auth_rps: 5,
            auth_burst: 20,
            api_rps: 100,
            api_burst: 50,
        }
    }
}

/// Rate limiter manager
///
/// Each limiter keeps one bucket per client IP, so a client exhausting its
/// budget does not throttle anyone else.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    auth: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    api: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, settings: RateLimitSettings) -> Self {
        Self {
            enabled,
            auth: Arc::new(GovernorLimiter::keyed(quota(
                settings.auth_rps,
                settings.auth_burst,
            ))),
            api: Arc::new(GovernorLimiter::keyed(quota(
                settings.api_rps,
                settings.api_burst,
            ))),
        }
    }

    /// Check the strict limiter used by the unauthenticated auth endpoints
    pub fn check_auth(&self, client: IpAddr) -> SurfResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.auth
            .check_key(&client)
            .map_err(|_| SurfError::RateLimitExceeded)
    }

    /// Check the general API limiter
    pub fn check_api(&self, client: IpAddr) -> SurfResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.api
            .check_key(&client)
            .map_err(|_| SurfError::RateLimitExceeded)
    }

    /// Drop buckets of clients whose budget has fully refilled
    pub fn retain_recent(&self) {
        self.auth.retain_recent();
        self.api.retain_recent();
    }

    /// Number of clients currently tracked across both limiters
    pub fn tracked_clients(&self) -> usize {
        self.auth.len() + self.api.len()
    }
}

fn quota(rps: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

/// Peer address recorded by the listener; requests without one share a bucket
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, SurfError> {
    let client = client_ip(&request);
    let path = request.uri().path();

    if path.starts_with("/api/auth/") {
        ctx.rate_limiter.check_auth(client)?;
    } else if path.starts_with("/api/") {
        ctx.rate_limiter.check_api(client)?;
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(true, RateLimitSettings::default());

        assert!(limiter.check_auth(ip(1)).is_ok());
        assert!(limiter.check_api(ip(1)).is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let settings = RateLimitSettings {
            auth_rps: 1,
            auth_burst: 3,
            api_rps: 10,
            api_burst: 5,
        };
        let limiter = RateLimiter::new(true, settings);

        for _ in 0..3 {
            assert!(limiter.check_auth(ip(1)).is_ok());
        }
        assert!(matches!(
            limiter.check_auth(ip(1)),
            Err(SurfError::RateLimitExceeded)
        ));

        // The API limiter has its own budget
        assert!(limiter.check_api(ip(1)).is_ok());
    }

    #[test]
    fn test_clients_have_separate_budgets() {
        let settings = RateLimitSettings {
            auth_rps: 1,
            auth_burst: 2,
            api_rps: 1,
            api_burst: 2,
        };
        let limiter = RateLimiter::new(true, settings);

        for _ in 0..2 {
            assert!(limiter.check_auth(ip(1)).is_ok());
        }
        assert!(limiter.check_auth(ip(1)).is_err());

        assert!(limiter.check_auth(ip(2)).is_ok());
        assert!(limiter.check_auth(ip(2)).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_disabled_limiter_never_rejects() {
        let settings = RateLimitSettings {
            auth_rps: 1,
            auth_burst: 1,
            api_rps: 1,
            api_burst: 1,
        };
        let limiter = RateLimiter::new(false, settings);

        for _ in 0..10 {
            assert!(limiter.check_auth(ip(1)).is_ok());
            assert!(limiter.check_api(ip(1)).is_ok());
        }
    }
}
