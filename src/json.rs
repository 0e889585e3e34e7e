use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;

/// JSON request and response bodies encoded with `sonic_rs`.
///
/// Decoding failures become the uniform 400 error body rather than axum's
/// plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SonicJson<T>(pub T);

impl<T, S> FromRequest<S> for SonicJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request("error reading the request body", e.body_text()))?;

        sonic_rs::from_slice(&bytes)
            .map(SonicJson)
            .map_err(|e| AppError::bad_request("error decoding the request body", e.to_string()))
    }
}

impl<T: Serialize> IntoResponse for SonicJson<T> {
    fn into_response(self) -> Response {
        match sonic_rs::to_string(&self.0) {
            Ok(json) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                json,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("❌ Response serialization failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Path parameters whose parse failures use the uniform error body.
#[derive(Debug, Clone, Copy)]
pub struct PathParam<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(PathParam(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    #[derive(Debug, serde::Deserialize, Serialize, PartialEq)]
    struct Payload {
        title: String,
    }

    #[tokio::test]
    async fn decodes_valid_bodies() {
        let req = Request::new(Body::from(r#"{"title":"hello"}"#));
        let SonicJson(payload) = SonicJson::<Payload>::from_request(req, &()).await.unwrap();
        assert_eq!(payload.title, "hello");
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let req = Request::new(Body::from("{not json"));
        let err = SonicJson::<Payload>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn encodes_with_json_content_type() {
        let response = SonicJson(Payload { title: "x".into() }).into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"title":"x"}"#);
    }
}
