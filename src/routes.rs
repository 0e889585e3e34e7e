use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::path::Path;
use tower::ServiceExt;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers,
    middleware_layer::{
        auth::{require_admin, require_auth},
        cors::cors,
        rate_limit::{standard_limit, strict_limit},
        security_headers::security_headers,
    },
    services::{blob_store::MEDIA_URL_PREFIX, media::MAX_TOTAL_UPLOAD_SIZE},
    state::AppState,
};

/// Slack on top of the file payload for multipart boundaries and text fields.
const MULTIPART_OVERHEAD: usize = 1 << 20;

/// Builds the application router.
///
/// Every request passes CORS, then the security headers, then a rate limit,
/// then (where required) authentication, then the handler. Route-level
/// layers added later wrap the earlier ones, so each group installs auth
/// first and the limiter last.
pub fn build_router(state: AppState) -> Router {
    let login_routes = Router::new()
        .route("/api/session", post(handlers::session::login))
        .route_layer(from_fn_with_state(state.clone(), strict_limit));

    let public_routes = Router::new()
        .route("/api/session", delete(handlers::session::logout))
        .route("/api/posts", get(handlers::posts::recent_posts))
        .route("/api/posts/recent", get(handlers::posts::recent_public_posts))
        .route("/api/posts/{id}", get(handlers::posts::get_post))
        .route(
            "/api/user",
            post(handlers::users::register).get(handlers::users::current_user),
        )
        .route("/api/media/{id}", get(handlers::media::get_media))
        .route_layer(from_fn_with_state(state.clone(), standard_limit));

    let member_routes = Router::new()
        .route(
            "/api/user/{id}",
            get(handlers::users::get_user).put(handlers::users::update_user),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route_layer(from_fn_with_state(state.clone(), standard_limit));

    let admin_routes = Router::new()
        .route("/api/posts", post(handlers::posts::create_post))
        .route(
            "/api/posts/{id}",
            axum::routing::put(handlers::posts::update_post).delete(handlers::posts::delete_post),
        )
        .route("/api/user/list", get(handlers::users::list_users))
        .route("/api/user/{id}", delete(handlers::users::delete_user))
        .route(
            "/api/media",
            post(handlers::media::upload_media)
                .layer(DefaultBodyLimit::max(MAX_TOTAL_UPLOAD_SIZE + MULTIPART_OVERHEAD)),
        )
        .route("/api/media/{id}", delete(handlers::media::delete_media))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .route_layer(from_fn_with_state(state.clone(), standard_limit));

    let media = ServeDir::new(&state.config.media_dir);

    Router::new()
        .merge(login_routes)
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .nest_service(MEDIA_URL_PREFIX, media)
        .fallback(frontend)
        .layer(CookieManagerLayer::new())
        .layer(from_fn_with_state(state.clone(), security_headers))
        .layer(from_fn_with_state(state.clone(), cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .with_state(state)
}

/// Serves the frontend build, with `index.html` for client-side routes.
/// Unmatched API paths get the JSON 404 instead.
async fn frontend(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response> {
    let path = request.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return Err(AppError::NotFound("route"));
    }

    let public_dir = Path::new(&state.config.public_dir);
    let spa = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));
    let Ok(response) = spa.oneshot(request).await;
    Ok(response.into_response())
}
