//! Per-IP rate limiting for the login endpoint.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Login attempts allowed per client IP, refilled per minute.
pub struct RateLimitState {
    login: DefaultKeyedRateLimiter<String>,
    login_rate_limit: u32,
    trust_proxy_headers: bool,
}

impl RateLimitState {
    pub fn new(login_rate_limit: u32) -> Self {
        let per_minute = NonZeroU32::new(login_rate_limit).unwrap_or(NonZeroU32::MIN);
        Self {
            login: RateLimiter::keyed(Quota::per_minute(per_minute)),
            login_rate_limit,
            trust_proxy_headers: false,
        }
    }

    /// Key clients by `X-Forwarded-For`/`X-Real-IP`. Only safe behind a
    /// reverse proxy that overwrites those headers.
    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn login_rate_limit(&self) -> u32 {
        self.login_rate_limit
    }

    /// Check if a login attempt from `ip` is allowed.
    pub fn check_login(&self, ip: &str) -> bool {
        self.login.check_key(&ip.to_string()).is_ok()
    }

    /// Drop state for clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.login.retain_recent();
        self.login.shrink_to_fit();
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

fn header_str<'r>(req: &'r Request<Body>, name: &str) -> Option<&'r str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Client address used as the limiter key. With `trust_proxy_headers` the
/// first `X-Forwarded-For` hop wins, then `X-Real-IP`; otherwise only the
/// socket peer counts. Mock transports have no peer and share the `unknown`
/// bucket.
fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let forwarded = || {
        header_str(req, "X-Forwarded-For")
            .and_then(|chain| chain.split(',').next())
            .or_else(|| header_str(req, "X-Real-IP"))
    };
    trust_proxy_headers
        .then(forwarded)
        .flatten()
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects login attempts over the per-minute budget with 429.
pub async fn login_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req, state.trust_proxy_headers);
    if !state.check_login(&ip) {
        tracing::warn!(%ip, limit = state.login_rate_limit(), "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
