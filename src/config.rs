use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::crypto::token::TokenError;

/// The extra origin allowed when running locally.
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// Deployment environment; toggles cookie hardening and the dev CORS origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Which credential carries identity. Exactly one is active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Opaque `session_id` cookie resolved against the session store.
    Session,
    /// `Authorization: Bearer <jwt>` verified by the token codec.
    Bearer,
}

/// Where server-side sessions are kept.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis { url: String },
}

impl std::fmt::Debug for SessionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionBackend::Memory => f.write_str("Memory"),
            SessionBackend::Redis { url } => f
                .debug_struct("Redis")
                .field("url", &redact_userinfo(url))
                .finish(),
        }
    }
}

/// Replaces the `user:password@` part of a URL.
fn redact_userinfo(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "<redacted>".to_string();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{}://<redacted>@{}", scheme, host),
        None => url.to_string(),
    }
}

/// Upper bound for the session durations, in minutes (one year).
const MAX_MINUTES: u64 = 365 * 24 * 60;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub auth_mode: AuthMode,
    pub session_backend: SessionBackend,
    /// The URL of the PostgreSQL database.
    pub database_url: Option<String>,
    /// HMAC secret for the token codec.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// Absolute session lifetime.
    pub session_lifetime: Duration,
    /// Sliding idle timeout.
    pub session_idle_timeout: Duration,
    /// Cookie `Domain` attribute used in production.
    pub cookie_domain: Option<String>,
    /// Exact origins allowed to read responses cross-origin.
    pub cors_allowed_origins: Vec<String>,
    /// Extra origin allowed by the CSP for images and video.
    pub media_origin: Option<String>,
    /// Root directory of the local blob store.
    pub media_dir: String,
    /// Static frontend build.
    pub public_dir: String,
    pub bind_addr: SocketAddr,
    /// Limiter buckets idle this long are swept.
    pub limiter_idle_eviction: Duration,
    pub notify_from: String,
    pub admin_contact: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("auth_mode", &self.auth_mode)
            .field("session_backend", &self.session_backend)
            .field("jwt_secret", &"<redacted>")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`. A missing `JWT_SECRET` is fatal.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a `Config` from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET")
            .map(|s| Zeroizing::new(s.into_bytes()))
            .ok_or(TokenError::MissingSigningSecret)
            .context("JWT_SECRET must be set (generate with: openssl rand -hex 32)")?;

        let environment = match var("ENVIRONMENT").as_deref() {
            Some("dev") | Some("development") => Environment::Development,
            Some("production") | Some("prod") | None => Environment::Production,
            Some(other) => anyhow::bail!("Invalid ENVIRONMENT: {}", other),
        };

        let auth_mode = match var("AUTH_MODE").as_deref() {
            Some("session") | None => AuthMode::Session,
            Some("bearer") => AuthMode::Bearer,
            Some(other) => anyhow::bail!("Invalid AUTH_MODE: {} (expected session or bearer)", other),
        };

        let session_backend = match var("SESSION_BACKEND").as_deref() {
            Some("memory") | None => SessionBackend::Memory,
            Some("redis") => SessionBackend::Redis {
                url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            },
            Some(other) => anyhow::bail!("Invalid SESSION_BACKEND: {}", other),
        };

        let minutes = |key: &str, default: u64| -> Result<Duration> {
            let value: u64 = var(key)
                .unwrap_or_else(|| default.to_string())
                .parse()
                .with_context(|| format!("Invalid {}", key))?;
            if value == 0 || value > MAX_MINUTES {
                anyhow::bail!("{} must be between 1 and {}", key, MAX_MINUTES);
            }
            value
                .checked_mul(60)
                .map(Duration::from_secs)
                .with_context(|| format!("Invalid {}", key))
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            auth_mode,
            session_backend,
            database_url: var("DATABASE_URL"),
            jwt_secret,
            session_lifetime: minutes("SESSION_LIFETIME_MINUTES", 180)?,
            session_idle_timeout: minutes("SESSION_IDLE_TIMEOUT_MINUTES", 20)?,
            cookie_domain: var("COOKIE_DOMAIN"),
            cors_allowed_origins,
            media_origin: var("MEDIA_ORIGIN"),
            media_dir: var("MEDIA_DIR").unwrap_or_else(|| "media".to_string()),
            public_dir: var("PUBLIC_DIR").unwrap_or_else(|| "public".to_string()),
            bind_addr: var("BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            limiter_idle_eviction: Duration::from_secs(
                var("LIMITER_IDLE_EVICTION_SECS")
                    .unwrap_or_else(|| "600".to_string())
                    .parse()
                    .context("Invalid LIMITER_IDLE_EVICTION_SECS")?,
            ),
            notify_from: var("NOTIFY_FROM").unwrap_or_else(|| "noreply@localhost".to_string()),
            admin_contact: var("ADMIN_CONTACT").unwrap_or_else(|| "admin@localhost".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// The configured CORS allow-list, plus the local frontend in development.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = self.cors_allowed_origins.clone();
        if self.environment == Environment::Development && !origins.iter().any(|o| o == DEV_ORIGIN)
        {
            origins.push(DEV_ORIGIN.to_string());
        }
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
        assert!(config(&[("JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.auth_mode, AuthMode::Session);
        assert_eq!(cfg.session_backend, SessionBackend::Memory);
        assert_eq!(cfg.session_lifetime, Duration::from_secs(3 * 3600));
        assert_eq!(cfg.session_idle_timeout, Duration::from_secs(20 * 60));
        assert!(cfg.allowed_origins().is_empty());
    }

    #[test]
    fn dev_adds_local_origin() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("ENVIRONMENT", "dev"),
            ("CORS_ALLOWED_ORIGINS", "https://blog.example, https://www.blog.example"),
        ])
        .unwrap();
        assert_eq!(
            cfg.allowed_origins(),
            vec![
                "https://blog.example".to_string(),
                "https://www.blog.example".to_string(),
                DEV_ORIGIN.to_string(),
            ]
        );
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        assert!(config(&[("JWT_SECRET", "s"), ("AUTH_MODE", "both")]).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = config(&[
            ("JWT_SECRET", "topsecretvalue"),
            ("SESSION_BACKEND", "redis"),
            ("REDIS_URL", "redis://:hunter2@cache.internal:6379/0"),
        ])
        .unwrap();
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("topsecretvalue"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("cache.internal:6379/0"));
    }

    #[test]
    fn session_minutes_are_bounded() {
        for value in ["0", "525601", "18446744073709551615"] {
            assert!(config(&[("JWT_SECRET", "s"), ("SESSION_LIFETIME_MINUTES", value)]).is_err());
        }
        let cfg = config(&[("JWT_SECRET", "s"), ("SESSION_LIFETIME_MINUTES", "525600")]).unwrap();
        assert_eq!(cfg.session_lifetime, Duration::from_secs(525_600 * 60));
    }
}
