//! Bird - a social networking server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - JSON API under /api                                      │
//! │  - Session auth under /auth                                 │
//! │  - Chat WebSocket, payment webhook, media files             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Posts, feed, profiles, network, communities, chat        │
//! │  - Recommendation and payment call-outs                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Ranking cache (moka)                                     │
//! │  - Local media directory                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP and WebSocket handlers
//! - `auth`: Password login, session tokens, extractors
//! - `chat`: Per-room broadcast groups
//! - `service`: Business logic layer
//! - `data`: Database and cache layer
//! - `storage`: Local media storage
//! - `worker`: Thumbnail queue and story sweeper
//! - `recommendation`, `payments`: Outbound integrations
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod payments;
pub mod recommendation;
pub mod service;
pub mod storage;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use recommendation::Recommender;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Last good feed ordering per viewer
    pub ranking_cache: Arc<data::RankingCache>,

    /// Uploaded media on local disk
    pub storage: Arc<storage::MediaStorage>,

    /// Chat channel layer
    pub chat_hub: Arc<chat::ChatHub>,

    /// Producer side of the video thumbnail queue
    pub thumbnails: worker::ThumbnailQueue,

    /// Recommendation ingest and ranking
    pub recommender: Arc<dyn Recommender>,

    /// Mercado Pago client
    pub payments: Arc<payments::PaymentGateway>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (migrations run on connect)
    /// 2. Initialize the ranking cache
    /// 3. Prepare media storage
    /// 4. Start the thumbnail worker
    /// 5. Build the outbound clients
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        metrics::USERS_TOTAL.set(db.count_active_users().await?);
        tracing::info!("Database connected");

        // 2. Initialize caches
        let ranking_cache = Arc::new(data::RankingCache::new(
            config.cache.ranking_max_entries,
            Duration::from_secs(config.cache.ranking_ttl),
        ));
        tracing::info!("Caches initialized");

        // 3. Media storage
        let storage = Arc::new(storage::MediaStorage::new(&config.media)?);
        tracing::info!(root = %config.media.root.display(), "Media storage initialized");

        // 4. Thumbnail worker
        let (thumbnails, receiver) = worker::ThumbnailQueue::new(worker::QUEUE_CAPACITY);
        worker::ThumbnailWorker::new(db.clone(), storage.clone(), config.media.ffmpeg_path.clone())
            .spawn(receiver);

        // 5. Outbound integrations
        let recommender: Arc<dyn Recommender> = if config.recommendation.enabled {
            tracing::info!(
                base_url = %config.recommendation.base_url,
                "Recommendation service enabled"
            );
            Arc::new(recommendation::HttpRecommender::new(&config.recommendation)?)
        } else {
            Arc::new(recommendation::DisabledRecommender)
        };

        let payments = Arc::new(payments::PaymentGateway::new(&config.payments)?);
        if !payments.is_configured() {
            tracing::warn!("Mercado Pago access token missing; checkout disabled");
        }

        let chat_hub = Arc::new(chat::ChatHub::new(config.chat.channel_capacity));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            ranking_cache,
            storage,
            chat_hub,
            thumbnails,
            recommender,
            payments,
        })
    }
}

/// Upper bound for request bodies; the largest upload is a 40 MiB video
const MAX_BODY_BYTES: usize = 48 * 1024 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, extract::DefaultBodyLimit, middleware};
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);
    let media_service = ServeDir::new(state.storage.root());
    let media_path = state.config.media.public_path.trim_end_matches('/').to_string();

    let metrics_routes = api::metrics_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/auth", auth::auth_router())
        .nest("/api", api::api_router())
        .merge(api::chat_socket_router())
        .merge(api::payments_webhook_router())
        .merge(metrics_routes)
        .nest_service(&media_path, media_service)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
