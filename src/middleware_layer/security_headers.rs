use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};

use crate::{config::Config, state::AppState};

/// The fixed header set stamped on every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &Config) -> Self {
        let media_sources = match config.media_origin.as_deref() {
            Some(origin) => format!("'self' {}", origin),
            None => "'self'".to_string(),
        };
        let csp = format!(
            "default-src 'self'; img-src {0}; media-src {0};",
            media_sources
        );
        let csp = HeaderValue::from_str(&csp).unwrap_or_else(|_| {
            tracing::warn!("⚠️ MEDIA_ORIGIN is not a valid header value; CSP falls back to 'self'");
            HeaderValue::from_static("default-src 'self'; img-src 'self'; media-src 'self';")
        });

        Self {
            headers: vec![
                (header::CONTENT_SECURITY_POLICY, csp),
                (
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ),
                (
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ),
                (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
                (
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ),
                (
                    HeaderName::from_static("permissions-policy"),
                    HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
                ),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }
}

/// Adds the security headers to whatever the inner layers return,
/// rejections included.
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in state.security_headers.iter() {
        headers.insert(name.clone(), value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(media_origin: Option<&str>) -> Config {
        let mut pairs = vec![("JWT_SECRET".to_string(), "s".to_string())];
        if let Some(origin) = media_origin {
            pairs.push(("MEDIA_ORIGIN".to_string(), origin.to_string()));
        }
        Config::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn csp_includes_media_origin() {
        let headers = SecurityHeaders::from_config(&config(Some("https://cdn.example")));
        let (_, csp) = headers
            .iter()
            .find(|(name, _)| *name == header::CONTENT_SECURITY_POLICY)
            .unwrap();
        assert_eq!(
            csp.to_str().unwrap(),
            "default-src 'self'; img-src 'self' https://cdn.example; media-src 'self' https://cdn.example;"
        );
    }

    #[test]
    fn full_header_set() {
        let headers = SecurityHeaders::from_config(&config(None));
        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "content-security-policy",
                "strict-transport-security",
                "x-content-type-options",
                "x-frame-options",
                "referrer-policy",
                "permissions-policy",
            ]
        );
    }
}
