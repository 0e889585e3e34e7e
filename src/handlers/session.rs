use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration},
};

use crate::{
    config::{AuthMode, Config},
    crypto::{handle::redact, password::verify_password_blocking},
    error::{AppError, Result},
    json::SonicJson,
    middleware_layer::auth::SESSION_COOKIE,
    models::user::{User, UserLoginForm},
    state::AppState,
};

/// What a successful login returns. `token` is only set in bearer mode.
#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Builds the `session_id` cookie for the current environment.
///
/// Always `HttpOnly` with `Path=/`. Production adds `Secure`,
/// `SameSite=Strict` and the configured domain; development uses `Lax`.
pub fn session_cookie(config: &Config, handle: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, handle);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(config.session_lifetime.as_secs() as i64));

    if config.is_production() {
        cookie.set_secure(true);
        cookie.set_same_site(SameSite::Strict);
        if let Some(domain) = &config.cookie_domain {
            cookie.set_domain(domain.clone());
        }
    } else {
        cookie.set_same_site(SameSite::Lax);
    }

    cookie
}

/// Handles login. Runs behind the strict rate limit.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    SonicJson(form): SonicJson<UserLoginForm>,
) -> Result<Response> {
    let login = form.form_data;
    tracing::info!("🔐 Login attempt for {}", login.email);

    let Some(credentials) = state.users.find_credentials(&login.email).await? else {
        tracing::warn!("❌ Login failed: unknown email {}", login.email);
        return Err(AppError::Unauthorized("invalid email or password"));
    };

    if !verify_password_blocking(login.password, credentials.password_hash).await? {
        tracing::warn!("❌ Login failed: wrong password for user {}", credentials.user.id);
        return Err(AppError::Unauthorized("invalid email or password"));
    }

    let user = credentials.user;
    let token = match state.config.auth_mode {
        AuthMode::Session => {
            if let Some(previous) = cookies.get(SESSION_COOKIE) {
                let previous = previous.value().to_string();
                state.sessions.destroy(&previous).await?;
                tracing::debug!("🗑️ Replaced session {}… on login", redact(&previous));
            }
            let handle = state.sessions.create(user.id, user.role).await?;
            tracing::info!("✅ Session {}… opened for user {}", redact(&handle), user.id);
            cookies.add(session_cookie(&state.config, handle));
            None
        }
        AuthMode::Bearer => {
            let token = state.tokens.issue(user.id, user.role)?;
            tracing::info!("✅ Token issued for user {}", user.id);
            Some(token)
        }
    };

    Ok(SonicJson(LoginResponse { user, token }).into_response())
}

/// Handles logout.
///
/// In session mode the session is destroyed and the cookie cleared. Bearer
/// tokens are stateless and stay valid until they expire.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<StatusCode> {
    if state.config.auth_mode == AuthMode::Session {
        if let Some(cookie) = cookies.get(SESSION_COOKIE) {
            let handle = cookie.value().to_string();
            state.sessions.destroy(&handle).await?;
            tracing::info!("👋 Session {}… closed", redact(&handle));
        }
        cookies.remove(session_cookie(&state.config, String::new()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str) -> Config {
        let vars = [
            ("JWT_SECRET", "secret"),
            ("ENVIRONMENT", environment),
            ("COOKIE_DOMAIN", "blog.example"),
        ];
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn production_cookie_is_hardened() {
        let cookie = session_cookie(&config("production"), "h".into());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.domain(), Some("blog.example"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::hours(3)));
    }

    #[test]
    fn dev_cookie_is_relaxed() {
        let cookie = session_cookie(&config("dev"), "h".into());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.domain(), None);
    }
}
