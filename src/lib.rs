//! Blog backend: posts, users, media and sessions behind a CORS, security
//! header, rate limit and authentication middleware chain.

pub mod config;
pub mod db;
pub mod error;
pub mod json;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod handle;
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod media;
    pub mod post;
    pub mod role;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod media;
    pub mod memory;
    pub mod post;
    pub mod user;
}

pub mod services {
    pub mod authorization;
    pub mod blob_store;
    pub mod media;
    pub mod notifier;
    pub mod rate_limiter;
    pub mod redis_sessions;
    pub mod session_store;
}

pub mod handlers {
    pub mod media;
    pub mod posts;
    pub mod session;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod cors;
    pub mod rate_limit;
    pub mod security_headers;
}

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
