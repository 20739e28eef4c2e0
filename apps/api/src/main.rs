mod admin;
mod analysis;
mod auth;
mod config;
mod db;
mod errors;
mod industries;
mod learning;
mod llm_client;
mod models;
mod pagination;
mod pitches;
mod rate_limit;
mod routes;
mod state;
mod storage;
mod team;
mod training;
mod users;

use anyhow::Result;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::LlmPitchAnalyzer;
use crate::auth::directory::{promote_admin, PgAccountDirectory};
use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimits;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::AudioStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PitchCoach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url).await?;
    if let Some(email) = &config.admin_email {
        promote_admin(&db, email).await?;
    }

    // Initialize S3 / MinIO
    let storage = AudioStorage::from_config(&config).await;
    info!("Audio storage initialized (bucket: {})", config.s3_bucket);

    // Initialize model client and the pitch analyzer on top of it
    let llm = LlmClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
    )?;
    info!("LLM client initialized (model: {})", llm.model());
    let analyzer = Arc::new(LlmPitchAnalyzer(llm.clone()));

    let state = AppState {
        accounts: Arc::new(PgAccountDirectory(db.clone())),
        db,
        llm,
        analyzer,
        storage,
        jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
        admin_email: config.admin_email.clone(),
        limits: RateLimits::new(config.rate_limit_per_minute, config.auth_rate_limit_per_minute),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    // Peer addresses feed the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Permissive unless `CORS_ORIGIN` pins a single frontend origin.
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    Ok(match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    })
}
