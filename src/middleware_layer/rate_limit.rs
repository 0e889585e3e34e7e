use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{error::AppError, services::rate_limiter::RateLimiter, state::AppState};

/// Whom a request is charged to.
///
/// The first `X-Forwarded-For` entry wins, so this is only trustworthy
/// behind a proxy that overwrites that header. Without one, the peer
/// address is used, and `"unknown"` when even that is missing.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn request_identity(req: &Request<Body>) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_identity(req.headers(), peer)
}

async fn admit(limiter: &RateLimiter, req: Request<Body>, next: Next) -> Response {
    let identity = request_identity(&req);
    let policy = limiter.policy();

    if !limiter.allow(&identity) {
        tracing::warn!("🚫 {} rate limit exceeded for {}", policy.name, identity);
        return AppError::RateLimited {
            retry_after_secs: policy.retry_after_secs,
        }
        .into_response();
    }

    next.run(req).await
}

/// A middleware that applies the standard policy: bursts of 30, 2 per second.
pub async fn standard_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(&state.limiters.standard, req, next).await
}

/// A middleware that applies the strict policy used for login.
pub async fn strict_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(&state.limiters.strict, req, next).await
}
