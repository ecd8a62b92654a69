//! osutweet - sign in with Twitter, link an osu! account, record its statistics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Twitter sign-in handshake (/connect/twitter)             │
//! │  - Settings, home, health, metrics                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Handshake controller                                     │
//! │  - Settings (tweet toggle, osu! player linking)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │        Data Layer            │        External APIs         │
//! │  - SQLite (sqlx)             │  - Twitter (OAuth 1.0a)      │
//! │  - Signed cookie sessions    │  - osu! API v1               │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and shared middleware
//! - `auth`: Twitter sign-in handshake, sessions, extractors
//! - `service`: Settings business logic
//! - `data`: Database layer
//! - `twitter`: Twitter OAuth 1.0a client
//! - `osu`: osu! API client
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod osu;
pub mod service;
pub mod twitter;

use std::sync::Arc;
use std::time::Duration;

/// Request bodies larger than this are rejected
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like database pool and API clients.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Signed-cookie session store
    pub sessions: auth::CookieSessionStore,

    /// Twitter sign-in handshake
    pub handshake: auth::HandshakeController,

    /// Settings operations
    pub settings: Arc<service::SettingsService>,
}

impl AppState {
    /// Initialize application state with the real Twitter and osu! clients
    ///
    /// # Steps
    /// 1. Build the shared HTTP client
    /// 2. Create the Twitter and osu! clients
    /// 3. Connect to SQLite database
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(&config.http.user_agent)
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .build()?;

        let twitter = twitter::TwitterClient::new(http_client.clone(), &config.twitter);
        let osu = osu::OsuClient::new(
            http_client,
            config.osu.api_base_url.clone(),
            config.osu.api_key.clone(),
        );

        Self::with_clients(config, Arc::new(twitter), Arc::new(osu)).await
    }

    /// Initialize application state with the given external clients
    pub async fn with_clients(
        config: config::AppConfig,
        provider: Arc<dyn auth::ProviderClient>,
        osu: Arc<dyn osu::OsuApi>,
    ) -> Result<Self, error::AppError> {
        let db = Arc::new(
            data::Database::connect_with(
                &config.database.path,
                config.database.max_connections,
                Duration::from_secs(config.database.acquire_timeout_seconds),
            )
            .await?,
        );
        tracing::info!("Database connected");

        let sessions = auth::CookieSessionStore::new(
            config.auth.session_secret.clone(),
            config.auth.session_max_age,
            config.should_use_secure_cookies(),
        );
        let handshake = auth::HandshakeController::new(provider, db.clone());
        let settings = Arc::new(service::SettingsService::new(db.clone(), osu));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            handshake,
            settings,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
///
/// Layers, outermost first: request ID assignment, tracing, request ID
/// propagation, compression, body limit, error pages, request counting.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{
        compression::CompressionLayer,
        limit::RequestBodyLimitLayer,
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        trace::TraceLayer,
    };

    let trace_layer = TraceLayer::new_for_http().make_span_with(
        |request: &axum::http::Request<axum::body::Body>| api::request_span(request),
    );

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::home_router())
        .merge(auth::auth_router())
        .merge(api::settings_router())
        .merge(api::metrics_router())
        .layer(middleware::from_fn(api::track_requests))
        .layer(middleware::from_fn(api::render_error_page))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace_layer)
        .layer(SetRequestIdLayer::x_request_id(api::MakeRequestUlid))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
