use std::sync::Arc;

use crate::{
    config::{Config, SessionBackend},
    crypto::token::TokenCodec,
    error::{AppError, Result},
    middleware_layer::{cors::CorsPolicy, security_headers::SecurityHeaders},
    repositories::{
        media::{MediaRepository, PgMediaRepository},
        memory::{MemoryMediaRepository, MemoryPostRepository, MemoryUserRepository},
        post::{PgPostRepository, PostRepository},
        user::{PgUserRepository, UserRepository},
    },
    services::{
        blob_store::{BlobStore, LocalBlobStore, MemoryBlobStore},
        notifier::{LogNotifier, MemoryNotifier, Notifier},
        rate_limiter::RateLimiters,
        redis_sessions::RedisSessionStore,
        session_store::{MemorySessionStore, SessionPolicy, SessionStore},
    },
};

/// The pluggable collaborators behind the handlers.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub media: Arc<dyn MediaRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backends {
    /// Everything in process memory.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            users: Arc::new(MemoryUserRepository::default()),
            posts: Arc::new(MemoryPostRepository::default()),
            media: Arc::new(MemoryMediaRepository::default()),
            sessions: Arc::new(MemorySessionStore::new(SessionPolicy::from_config(config))),
            notifier: Arc::new(MemoryNotifier::default()),
            blobs: Arc::new(MemoryBlobStore::default()),
        }
    }
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub media: Arc<dyn MediaRepository>,
    /// Server-side sessions; only consulted in session mode.
    pub sessions: Arc<dyn SessionStore>,
    /// Signs and verifies bearer tokens.
    pub tokens: TokenCodec,
    pub limiters: RateLimiters,
    pub notifier: Arc<dyn Notifier>,
    pub blobs: Arc<dyn BlobStore>,
    pub cors: Arc<CorsPolicy>,
    /// Precomputed response headers.
    pub security_headers: Arc<SecurityHeaders>,
}

impl AppState {
    /// Creates a new `AppState` wired to PostgreSQL, the configured session
    /// backend, the local media directory, and the logging notifier.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::Internal("DATABASE_URL must be set".to_string()))?;
        let pool = crate::db::create_pool(database_url)?;
        crate::db::ping(&pool).await?;
        tracing::info!("✅ PostgreSQL pool initialized with deadpool-postgres");

        let policy = SessionPolicy::from_config(config);
        let sessions: Arc<dyn SessionStore> = match &config.session_backend {
            SessionBackend::Memory => {
                tracing::info!("✅ In-memory session store initialized");
                Arc::new(MemorySessionStore::new(policy))
            }
            SessionBackend::Redis { url } => Arc::new(RedisSessionStore::connect(url, policy).await?),
        };

        let backends = Backends {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            media: Arc::new(PgMediaRepository::new(pool)),
            sessions,
            notifier: Arc::new(LogNotifier),
            blobs: Arc::new(LocalBlobStore::new(&config.media_dir)),
        };

        Self::with_backends(config, backends)
    }

    /// Assembles the state around caller-supplied backends.
    pub fn with_backends(config: &Config, backends: Backends) -> Result<Self> {
        let tokens = TokenCodec::new(&config.jwt_secret)?;

        let limiters = RateLimiters::new(config.limiter_idle_eviction);
        tracing::info!("✅ Rate limiters initialized (standard + strict)");

        Ok(AppState {
            config: Arc::new(config.clone()),
            users: backends.users,
            posts: backends.posts,
            media: backends.media,
            sessions: backends.sessions,
            tokens,
            limiters,
            notifier: backends.notifier,
            blobs: backends.blobs,
            cors: Arc::new(CorsPolicy::from_config(config)),
            security_headers: Arc::new(SecurityHeaders::from_config(config)),
        })
    }

    /// Reclaims memory held by idle limiter buckets and dead sessions.
    pub async fn sweep(&self) {
        let buckets = self.limiters.sweep();
        match self.sessions.sweep().await {
            Ok(sessions) => {
                if buckets + sessions > 0 {
                    tracing::debug!(
                        "🧹 Swept {} limiter buckets and {} sessions",
                        buckets,
                        sessions
                    );
                }
            }
            Err(e) => tracing::error!("❌ Session sweep failed: {}", e),
        }
    }
}
