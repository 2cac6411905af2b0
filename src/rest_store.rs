use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::circuit_breaker::{guarded, StoreBreakers, StoreCircuitBreaker};
use crate::errors::AppError;
use crate::models::{Lead, Opportunity, TransferCheckRow};
use crate::store::{RecordStore, StoreError};

const LEAD_SELECT: &str = "id,phone,full_name,created_at";
const OPPORTUNITY_SELECT: &str =
    "id,lead_id,current_stage,opportunity_status,opportunity_name,status_updated_at,created_at";

/// Record store speaking PostgREST (the Supabase REST API).
///
/// Filters are pushed down as PostgREST operators (`eq`, `like`, `in`, `ilike`),
/// so the database does the matching and the limits are enforced server-side.
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    breakers: StoreBreakers,
}

impl RestRecordStore {
    /// Creates a new `RestRecordStore`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The project URL, e.g. `https://xyz.supabase.co`.
    /// * `api_key` - The anon or service key, sent as `apikey` and bearer token.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create REST store client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            breakers: StoreBreakers::new(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn breaker_for(&self, table: &str) -> &StoreCircuitBreaker {
        match table {
            "leads" => &self.breakers.leads,
            "opportunities" => &self.breakers.opportunities,
            _ => &self.breakers.transfer_view,
        }
    }

    /// GET a table with PostgREST query parameters and decode the rows.
    async fn select<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table);

        guarded(self.breaker_for(table), async {
            tracing::debug!("PostgREST GET {} {:?}", table, params);

            let response = self
                .client
                .get(&url)
                .header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .query(params)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::error!("PostgREST returned error {} for {}: {}", status, table, error_text);
                return Err(StoreError::Http(format!(
                    "PostgREST returned status {}: {}",
                    status, error_text
                )));
            }

            let rows: Vec<Value> = response.json().await?;
            Ok(decode_rows(table, rows))
        })
        .await
    }
}

/// Decode rows one by one. A row that does not fit the record shape is
/// dropped with a warning instead of failing the whole result.
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Dropping undecodable {} row: {}", table, e);
                None
            }
        })
        .collect();

    if decoded.len() != total {
        tracing::warn!("Decoded {}/{} {} rows", decoded.len(), total, table);
    }
    decoded
}

/// PostgREST `ilike` filter that matches `term` as a literal substring.
///
/// `%`, `_` and `\` are backslash-escaped. PostgREST turns `*` into `%` before
/// the escape is applied, so `*` is sent as the single-character wildcard `_`
/// and the caller must re-check hits with [`contains_literal`].
fn ilike_contains(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 8);
    pattern.push_str("ilike.%");
    for c in term.chars() {
        match c {
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            _ => pattern.push(c),
        }
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive literal substring test, same semantics as an escaped `ILIKE`.
fn contains_literal(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// PostgREST `in.(...)` list with every id double-quoted.
fn in_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn find_leads_by_exact_phone(
        &self,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.select(
            "leads",
            &[
                ("select", LEAD_SELECT.to_string()),
                ("phone", format!("eq.{}", value)),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn find_leads_by_phone_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.select(
            "leads",
            &[
                ("select", LEAD_SELECT.to_string()),
                ("phone", format!("like.{}", pattern)),
                ("limit", limit.to_string()),
            ],
        )
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

        let mut params = vec![
            ("select", OPPORTUNITY_SELECT.to_string()),
            ("lead_id", in_list(lead_ids)),
            ("limit", limit.to_string()),
        ];
        if order_by_created_desc {
            params.push(("order", "created_at.desc.nullslast".to_string()));
        }

        self.select("opportunities", &params).await
    }

    async fn find_transfer_view_by_name_substring(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<TransferCheckRow>, StoreError> {
        let rows: Vec<TransferCheckRow> = self
            .select(
                "transfer_check_view",
                &[
                    ("select", "*".to_string()),
                    ("opportunity_name", ilike_contains(term)),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                row.opportunity_name
                    .as_deref()
                    .is_some_and(|name| contains_literal(name, term))
            })
            .collect())
    }

    async fn list_transfer_view(&self, limit: usize) -> Result<Vec<TransferCheckRow>, StoreError> {
        self.select(
            "transfer_check_view",
            &[("select", "*".to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn health_check(&self) -> bool {
        let view: Result<Vec<Value>, StoreError> = self
            .select(
                "transfer_check_view",
                &[
                    ("select", "opportunity_id".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await;

        match view {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Transfer view health probe failed, trying opportunities: {}", e);
                let fallback: Result<Vec<Value>, StoreError> = self
                    .select(
                        "opportunities",
                        &[("select", "id".to_string()), ("limit", "1".to_string())],
                    )
                    .await;
                fallback.is_ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ilike_contains_escapes_wildcards() {
        assert_eq!(ilike_contains("Jane"), "ilike.%Jane%");
        assert_eq!(ilike_contains("100%_off"), "ilike.%100\\%\\_off%");
        assert_eq!(ilike_contains("Jane*"), "ilike.%Jane_%");
    }

    #[test]
    fn test_contains_literal_ignores_case_only() {
        assert!(contains_literal("Jane Doe-7576271618", "jane doe"));
        assert!(!contains_literal("Jane Doe", "Jane*"));
        assert!(contains_literal("Deal 100% off", "100%"));
    }

    #[test]
    fn test_in_list_quotes_ids() {
        assert_eq!(
            in_list(&["a1".to_string(), "b\"2".to_string()]),
            "in.(\"a1\",\"b\\\"2\")"
        );
    }

    #[test]
    fn test_decode_rows_drops_bad_rows() {
        let rows = vec![
            serde_json::json!({"id": "lead-1", "phone": "7576271618", "full_name": "Jane"}),
            serde_json::json!({"phone": "no id"}),
        ];
        let leads: Vec<Lead> = decode_rows("leads", rows);
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].id, "lead-1");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store =
            RestRecordStore::new("https://example.supabase.co/".to_string(), "key".to_string())
                .unwrap();
        assert_eq!(
            store.table_url("leads"),
            "https://example.supabase.co/rest/v1/leads"
        );
    }
}
