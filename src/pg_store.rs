use async_trait::async_trait;
use sqlx::PgPool;

use crate::circuit_breaker::{guarded, StoreBreakers};
use crate::models::{Lead, Opportunity, TransferCheckRow};
use crate::store::{RecordStore, StoreError};

const LEAD_COLUMNS: &str = "id::text AS id, phone, full_name, created_at::timestamptz AS created_at";

const OPPORTUNITY_COLUMNS: &str = "id::text AS id, lead_id::text AS lead_id, opportunity_name, \
     current_stage, opportunity_status, status_updated_at::timestamptz AS status_updated_at, \
     created_at::timestamptz AS created_at";

const VIEW_COLUMNS: &str = "opportunity_id::text AS opportunity_id, opportunity_name, \
     current_stage, opportunity_status, transfer_status, phone, full_name, \
     status_updated_at::timestamptz AS status_updated_at, created_at::timestamptz AS created_at";

/// Record store reading `leads`, `opportunities` and `transfer_check_view` directly.
///
/// Ids are read as text so any key type in the schema works.
pub struct PgRecordStore {
    pool: PgPool,
    breakers: StoreBreakers,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breakers: StoreBreakers::new(),
        }
    }
}

/// Escape LIKE metacharacters so `term` matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_leads_by_exact_phone(
        &self,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let sql = format!("SELECT {} FROM leads WHERE phone = $1 LIMIT $2", LEAD_COLUMNS);

        guarded(&self.breakers.leads, async {
            let leads = sqlx::query_as::<_, Lead>(&sql)
                .bind(value)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(leads)
        })
        .await
    }

    async fn find_leads_by_phone_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leads WHERE phone LIKE $1 LIMIT $2",
            LEAD_COLUMNS
        );

        guarded(&self.breakers.leads, async {
            let leads = sqlx::query_as::<_, Lead>(&sql)
                .bind(pattern)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(leads)
        })
        .await
    }

    async fn find_opportunities_by_lead_ids(
        &self,
        lead_ids: &[String],
        limit: usize,
        order_by_created_desc: bool,
    ) -> Result<Vec<Opportunity>, StoreError> {
        if lead_ids.is_empty() {
            return Ok(Vec::new());
        }

        let order = if order_by_created_desc {
            "ORDER BY created_at DESC NULLS LAST"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM opportunities WHERE lead_id::text = ANY($1) {} LIMIT $2",
            OPPORTUNITY_COLUMNS, order
        );

        guarded(&self.breakers.opportunities, async {
            let opportunities = sqlx::query_as::<_, Opportunity>(&sql)
                .bind(lead_ids)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(opportunities)
        })
        .await
    }

    async fn find_transfer_view_by_name_substring(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<TransferCheckRow>, StoreError> {
        let sql = format!(
            "SELECT {} FROM transfer_check_view WHERE opportunity_name ILIKE $1 LIMIT $2",
            VIEW_COLUMNS
        );
        let pattern = format!("%{}%", escape_like(term));

        guarded(&self.breakers.transfer_view, async {
            let rows = sqlx::query_as::<_, TransferCheckRow>(&sql)
                .bind(&pattern)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        })
        .await
    }

    async fn list_transfer_view(&self, limit: usize) -> Result<Vec<TransferCheckRow>, StoreError> {
        let sql = format!("SELECT {} FROM transfer_check_view LIMIT $1", VIEW_COLUMNS);

        guarded(&self.breakers.transfer_view, async {
            let rows = sqlx::query_as::<_, TransferCheckRow>(&sql)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        })
        .await
    }

    async fn health_check(&self) -> bool {
        let view = sqlx::query("SELECT opportunity_id FROM transfer_check_view LIMIT 1")
            .fetch_optional(&self.pool)
            .await;

        match view {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Transfer view health probe failed, trying opportunities: {}", e);
                sqlx::query("SELECT id FROM opportunities LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await
                    .is_ok()
            }
        }
    }
}
