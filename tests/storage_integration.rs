use std::env;
use std::sync::Arc;
use std::time::Duration;

use transfer_check_api::db::Database;
use transfer_check_api::engine::MatchingEngine;
use transfer_check_api::models::SearchContext;
use transfer_check_api::pg_store::PgRecordStore;
use transfer_check_api::store::RecordStore;

/// Read-only smoke test for the Postgres record store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_store_search_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url, Duration::from_secs(5)).await?;
    let store = PgRecordStore::new(db.pool.clone());

    assert!(store.health_check().await, "store should answer the health probe");

    // Every query shape must be accepted by the schema, whatever the data
    store.find_leads_by_exact_phone("7576271618", 20).await?;
    store.find_leads_by_phone_pattern("%757%627%1618%", 50).await?;
    store
        .find_opportunities_by_lead_ids(&["00000000-0000-0000-0000-000000000000".to_string()], 500, true)
        .await?;
    store.find_transfer_view_by_name_substring("100%_match", 200).await?;
    store.list_transfer_view(10).await?;

    let store: Arc<dyn RecordStore> = Arc::new(store);
    let engine = MatchingEngine::new(store, Duration::from_secs(5));
    engine
        .search(&SearchContext::new(Some("smoke-test".to_string())), "7576271618")
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    Ok(())
}
