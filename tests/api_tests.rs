/// HTTP-level tests for the search and transfer-check routes
/// Drives the router directly with tower's oneshot, backed by the in-memory store
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use transfer_check_api::config::{Config, StoreBackend};
use transfer_check_api::engine::MatchingEngine;
use transfer_check_api::handlers::{self, AppState};
use transfer_check_api::memory_store::MemoryRecordStore;
use transfer_check_api::models::{Lead, Opportunity, TransferCheckRow};
use transfer_check_api::store::RecordStore;

fn test_config(search_cache_ttl: Duration) -> Config {
    Config {
        backend: StoreBackend::Memory {
            seed_file: "unused.json".to_string(),
        },
        port: 3000,
        store_timeout: Duration::from_millis(500),
        search_cache_ttl,
        rate_limit_per_second: 10,
        rate_limit_burst: 20,
    }
}

fn seeded_store() -> Arc<MemoryRecordStore> {
    Arc::new(MemoryRecordStore::new(
        vec![Lead {
            id: "lead-1".to_string(),
            phone: Some("(757) 627-1618".to_string()),
            full_name: Some("Jane Doe".to_string()),
            created_at: None,
        }],
        vec![Opportunity {
            id: "op-1".to_string(),
            lead_id: "lead-1".to_string(),
            opportunity_name: Some("Jane Doe-(757) 627-1618".to_string()),
            current_stage: Some("Transferred".to_string()),
            opportunity_status: Some("Customer has current policy".to_string()),
            status_updated_at: None,
            created_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        }],
        vec![TransferCheckRow {
            opportunity_id: "op-1".to_string(),
            opportunity_name: Some("Jane Doe-(757) 627-1618".to_string()),
            current_stage: Some("Transferred".to_string()),
            opportunity_status: Some("Pending".to_string()),
            transfer_status: Some("Approved".to_string()),
            phone: Some("(757) 627-1618".to_string()),
            full_name: Some("Jane Doe".to_string()),
            status_updated_at: None,
            created_at: None,
        }],
    ))
}

fn app(store: Arc<MemoryRecordStore>, search_cache_ttl: Duration) -> Router {
    let config = test_config(search_cache_ttl);
    let store: Arc<dyn RecordStore> = store;
    let engine = MatchingEngine::new(store, config.store_timeout);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::api_routes())
        .with_state(Arc::new(AppState::new(engine, config)))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_search_returns_legacy_record_and_warnings() {
    let (status, body) = get_json(
        app(seeded_store(), Duration::ZERO),
        "/api/v1/search?term=757.627.1618",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);
    assert_eq!(body["found_count"], 1);
    assert_eq!(body["dq_prioritized"], false);
    assert_eq!(body["matched_by"], "exact_phone");
    assert_eq!(body["record"]["Mobile"], "(757) 627-1618");
    assert_eq!(body["record"]["Policy Status"], "Customer has current policy");
    assert_eq!(body["record"]["GHL Pipeline Stage"], "Transferred");
    assert_eq!(body["warnings"]["policy"], true);
    assert_eq!(body["warnings"]["dq"], false);
}

#[tokio::test]
async fn test_search_not_found_is_ok() {
    let (status, body) = get_json(
        app(seeded_store(), Duration::ZERO),
        "/api/v1/search?term=Nobody",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert_eq!(body["found_count"], 0);
    assert!(body["record"].is_null());
}

#[tokio::test]
async fn test_blank_term_is_bad_request() {
    let (status, body) = get_json(
        app(seeded_store(), Duration::ZERO),
        "/api/v1/search?term=%20%20",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let store = seeded_store();
    let app = app(store.clone(), Duration::from_secs(60));

    let (_, first) = get_json(app.clone(), "/api/v1/search?term=7576271618").await;
    let calls_after_first = store.calls().len();
    let (_, second) = get_json(app, "/api/v1/search?term=7576271618").await;

    assert_eq!(first, second);
    assert_eq!(store.calls().len(), calls_after_first);
}

#[tokio::test]
async fn test_transfer_check_by_phone() {
    let (status, body) = get_json(
        app(seeded_store(), Duration::ZERO),
        "/api/v1/transfer-check/7576271618",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);
    assert_eq!(body["opportunity_id"], "op-1");
    assert_eq!(body["record"]["Policy Status"], "Approved");

    let (status, _) = get_json(
        app(seeded_store(), Duration::ZERO),
        "/api/v1/transfer-check/12345",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_store_reachability() {
    let (status, body) = get_json(app(seeded_store(), Duration::ZERO), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_reachable"], true);
}
