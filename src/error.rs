use axum::{
    extract::{multipart::MultipartRejection, rejection::PathRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::crypto::token::TokenError;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No credential, or a credential that does not verify.
    #[error("Authentication failed: {0}")]
    Unauthorized(&'static str),

    /// A valid credential whose role does not allow the operation.
    #[error("Authorization failed: {0}")]
    Forbidden(String),

    /// The client exhausted its rate-limit bucket.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A resource not found error.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request body failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A malformed request.
    #[error("{message}: {detail}")]
    BadRequest { message: String, detail: String },

    /// A blob store failure.
    #[error("Blob store error: {0}")]
    BlobStore(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Redis(_)
            | AppError::Io(_)
            | AppError::BlobStore(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidToken | TokenError::ExpiredToken => {
                AppError::Unauthorized("invalid or expired token")
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request("invalid path parameter", rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::bad_request("not a valid multipart request", rejection.body_text())
    }
}

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let (message, detail) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                ("internal server error".to_string(), None)
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                ("internal server error".to_string(), None)
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                ("internal server error".to_string(), None)
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                ("internal server error".to_string(), None)
            }

            AppError::BlobStore(ref msg) => {
                tracing::error!("Blob store error: {}", msg);
                ("internal server error".to_string(), None)
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                ("internal server error".to_string(), None)
            }

            AppError::Unauthorized(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (msg.to_string(), None)
            }

            AppError::Forbidden(detail) => {
                tracing::warn!("Authorization failed: {}", detail);
                ("insufficient privileges".to_string(), non_empty(detail))
            }

            AppError::RateLimited { .. } => (
                "too many requests".to_string(),
                Some("please try again later".to_string()),
            ),

            AppError::NotFound(what) => {
                tracing::debug!("{} not found", what);
                (format!("{} not found", what), None)
            }

            AppError::Validation(detail) => {
                tracing::debug!("Validation error: {}", detail);
                ("invalid request body".to_string(), non_empty(detail))
            }

            AppError::BadRequest { message, detail } => {
                tracing::debug!("Bad request: {}: {}", message, detail);
                (message, non_empty(detail))
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            message,
            detail,
        };
        let json = sonic_rs::to_string(&body).unwrap_or_else(|_| {
            r#"{"status":500,"message":"internal server error"}"#.to_string()
        });

        let mut response = (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            json,
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

fn non_empty(detail: String) -> Option<String> {
    if detail.is_empty() { None } else { Some(detail) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_carries_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 10 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "10");
        let body = body_of(response).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["message"], "too many requests");
        assert_eq!(body["detail"], "please try again later");
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let response = AppError::Internal("pg: relation users missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["message"], "internal server error");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn token_errors_become_401() {
        let response = AppError::from(TokenError::ExpiredToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_of(response).await;
        assert_eq!(body["message"], "invalid or expired token");
    }
}
