use crate::config::Config;
use crate::engine::MatchingEngine;
use crate::errors::AppError;
use crate::fingerprint::term_fingerprint;
use crate::legacy::{LegacyRecord, StatusWarnings};
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use moka::future::Cache;
use std::sync::Arc;
use utoipa::OpenApi;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Tiered search engine over the configured record store.
    pub engine: Arc<MatchingEngine>,
    /// Application configuration.
    pub config: Config,
    /// Search response cache keyed by trimmed term.
    /// `None` when `SEARCH_CACHE_TTL_SECS=0`.
    pub search_cache: Option<Cache<String, SearchResponse>>,
}

impl AppState {
    pub fn new(engine: MatchingEngine, config: Config) -> Self {
        let search_cache = if config.search_cache_ttl.is_zero() {
            None
        } else {
            Some(
                Cache::builder()
                    .time_to_live(config.search_cache_ttl)
                    .max_capacity(10_000)
                    .build(),
            )
        };

        Self {
            engine: Arc::new(engine),
            config,
            search_cache,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, search, transfer_check),
    components(schemas(
        SearchResponse,
        TransferCheckResponse,
        HealthResponse,
        LegacyRecord,
        StatusWarnings,
        MatchTier
    )),
    tags((name = "transfer-check", description = "Opportunity lookup by phone or name"))
)]
pub struct ApiDoc;

/// Search and transfer-check routes. Health and docs are mounted separately so
/// they stay outside the rate limiter.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/search", get(search))
        .route("/api/v1/transfer-check/:phone", get(transfer_check))
}

/// Health check endpoint.
///
/// Reports the service version and whether the record store answers a probe
/// within the store timeout. Always 200 so load balancers see the process as up.
#[utoipa::path(
    get,
    path = "/health",
    tag = "transfer-check",
    responses((status = 200, description = "Service status", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store_reachable = state.engine.store_healthy().await;
    if !store_reachable {
        tracing::warn!(
            "Health check: {} store unreachable",
            state.config.backend.label()
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if store_reachable { "healthy" } else { "degraded" }.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store_reachable,
        }),
    )
}

/// GET /api/v1/search
///
/// Resolves a phone number (any format) or free text to the single opportunity
/// to display. Responses are cached by term for `SEARCH_CACHE_TTL_SECS`.
#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "transfer-check",
    params(SearchParams),
    responses(
        (status = 200, description = "Search outcome, found or not", body = SearchResponse),
        (status = 400, description = "Empty search term"),
        (status = 502, description = "Record store failed"),
        (status = 504, description = "Record store timed out")
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let term = params.term.trim().to_string();
    tracing::info!("GET /search - term {}", term_fingerprint(&term));

    if let Some(cache) = &state.search_cache {
        if let Some(cached) = cache.get(&term).await {
            tracing::debug!("Search cache hit");
            return Ok(Json(cached));
        }
    }

    let ctx = SearchContext::new(params.operator);
    let outcome = state.engine.search(&ctx, &term).await?;
    let response = SearchResponse::from_outcome(&outcome);

    tracing::info!(
        "Search finished. Found: {}, Candidates: {}, DQ prioritized: {}",
        response.found,
        response.found_count,
        response.dq_prioritized
    );

    if let Some(cache) = &state.search_cache {
        cache.insert(term, response.clone()).await;
    }

    Ok(Json(response))
}

/// GET /api/v1/transfer-check/:phone
///
/// Finds the transfer-view row whose opportunity name ends in the given phone
/// and reports the view's transfer status.
#[utoipa::path(
    get,
    path = "/api/v1/transfer-check/{phone}",
    tag = "transfer-check",
    params(("phone" = String, Path, description = "10-digit US/Canada phone in any format")),
    responses(
        (status = 200, description = "Lookup outcome, found or not", body = TransferCheckResponse),
        (status = 400, description = "Not a valid phone number"),
        (status = 502, description = "Record store failed")
    )
)]
pub async fn transfer_check(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Result<Json<TransferCheckResponse>, AppError> {
    tracing::info!("GET /transfer-check - phone {}", term_fingerprint(&phone));

    let ctx = SearchContext::default();
    let found = state
        .engine
        .lookup_by_opportunity_name_phone(&ctx, &phone)
        .await?;

    Ok(Json(match found {
        Some(candidate) => TransferCheckResponse {
            found: true,
            opportunity_id: Some(candidate.opportunity_id.clone()),
            record: Some(LegacyRecord::from_candidate(&candidate)),
        },
        None => TransferCheckResponse {
            found: false,
            opportunity_id: None,
            record: None,
        },
    }))
}
