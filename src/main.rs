use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use transfer_check_api::config::{Config, StoreBackend};
use transfer_check_api::db::Database;
use transfer_check_api::engine::MatchingEngine;
use transfer_check_api::handlers::{self, ApiDoc, AppState};
use transfer_check_api::memory_store::MemoryRecordStore;
use transfer_check_api::pg_store::PgRecordStore;
use transfer_check_api::rest_store::RestRecordStore;
use transfer_check_api::store::RecordStore;

/// Connects the record store selected by `STORE_BACKEND`.
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match &config.backend {
        StoreBackend::Postgres { database_url } => {
            let db = Database::new(database_url, config.store_timeout).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgRecordStore::new(db.pool))
        }
        StoreBackend::Rest { base_url, api_key } => {
            let store = RestRecordStore::new(base_url.clone(), api_key.clone())
                .map_err(|e| anyhow::anyhow!("Failed to build REST store client: {}", e))?;
            tracing::info!("✓ REST store client initialized: {}", base_url);
            Arc::new(store)
        }
        StoreBackend::Memory { seed_file } => {
            let store = MemoryRecordStore::from_json_file(seed_file)?;
            tracing::info!("In-memory store seeded from {}", seed_file);
            Arc::new(store)
        }
    };

    Ok(store)
}

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the record store, the search cache and
/// the HTTP routes with their middleware (CORS, rate limiting), then serves.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transfer_check_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store = build_store(&config).await?;
    if !store.health_check().await {
        tracing::warn!("Record store did not answer the startup probe; serving anyway");
    }

    let engine = MatchingEngine::new(store, config.store_timeout);

    // Search cache is built inside the state; TTL of zero disables it
    let app_state = Arc::new(AppState::new(engine, config.clone()));
    if app_state.search_cache.is_some() {
        tracing::info!(
            "Search response cache initialized ({:?} TTL, 10k capacity)",
            config.search_cache_ttl
        );
    } else {
        tracing::info!("Search response cache disabled");
    }

    // Configure per-IP rate limiter
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: searches carry no body, 64KB is plenty
            .layer(RequestBodyLimitLayer::new(64 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check and docs bypass rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
