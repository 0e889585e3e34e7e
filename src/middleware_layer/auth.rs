use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    config::AuthMode,
    crypto::handle::redact,
    error::{AppError, Result},
    models::session::Principal,
    services::authorization::is_admin,
    state::AppState,
};

/// Name of the cookie carrying the session handle.
pub const SESSION_COOKIE: &str = "session_id";

const MISSING: AppError = AppError::Unauthorized("authentication required");
const INVALID: AppError = AppError::Unauthorized("invalid or expired token");

/// Extracts the session handle from the request cookies.
fn session_handle(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Extracts a bearer token from the `Authorization` header.
///
/// `Ok(None)` means the header is absent; a header with another scheme is
/// an invalid credential.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| INVALID)?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token.trim())),
        _ => Err(INVALID),
    }
}

/// Resolves the caller's identity using the process's credential variant.
///
/// # Returns
///
/// `Ok(None)` when no credential was sent, `Err(Unauthorized)` when one was
/// sent but does not check out, and `Err` of another kind when the session
/// backend fails.
pub async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
    cookies: &Cookies,
) -> Result<Option<Principal>> {
    match state.config.auth_mode {
        AuthMode::Session => {
            let Some(handle) = session_handle(cookies) else {
                return Ok(None);
            };
            match state.sessions.get(&handle).await? {
                Some(session) => Ok(Some(session.principal())),
                None => {
                    tracing::debug!("❌ Session {}… is unknown or expired", redact(&handle));
                    Err(INVALID)
                }
            }
        }
        AuthMode::Bearer => {
            let Some(token) = bearer_token(headers)? else {
                return Ok(None);
            };
            let claims = state.tokens.verify(token)?;
            Ok(Some(claims.principal()?))
        }
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap, cookies: &Cookies) -> Result<Principal> {
    resolve_principal(state, headers, cookies).await?.ok_or_else(|| {
        tracing::warn!("❌ No credential presented");
        MISSING
    })
}

/// A middleware that requires a valid credential.
///
/// On success the resolved [`Principal`] is stored in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    tracing::debug!("🔐 Checking authentication...");
    let principal = authenticate(&state, request.headers(), &cookies).await?;

    tracing::debug!("✅ User authenticated: {}", principal.subject_id);
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// A middleware that requires a valid credential with the admin role.
pub async fn require_admin(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let principal = authenticate(&state, request.headers(), &cookies).await?;

    if !is_admin(principal.role) {
        return Err(AppError::Forbidden(format!(
            "user {} is not an admin",
            principal.subject_id
        )));
    }

    tracing::debug!("✅ Admin authenticated: {}", principal.subject_id);
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// The caller's identity on routes where signing in is optional.
///
/// A missing, invalid, or expired credential all read as anonymous here;
/// only backend failures are errors.
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Principal>);

impl Viewer {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Viewer(Some(*principal)));
        }

        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

        match resolve_principal(state, &parts.headers, &cookies).await {
            Ok(principal) => Ok(Viewer(principal)),
            Err(AppError::Unauthorized(reason)) => {
                tracing::debug!("Treating viewer as anonymous: {}", reason);
                Ok(Viewer(None))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Ok(None)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthorized("invalid or expired token"))
        ));
    }
}
