//! In-process record store.
//!
//! Backs the engine in tests and local runs (`STORE_BACKEND=memory` with a
//! JSON seed file). Optional fault injection lets callers simulate slow or
//! failing tiers.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Lead, Opportunity, TransferCheckRow};
use crate::store::{like_matches, RecordStore, StoreError};

/// Seed file layout for [`MemoryRecordStore::from_json_file`].
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub transfer_view: Vec<TransferCheckRow>,
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    leads: Vec<Lead>,
    opportunities: Vec<Opportunity>,
    transfer_view: Vec<TransferCheckRow>,
    exact_phone_delay: Option<Duration>,
    pattern_delay: Option<Duration>,
    fail_transfer_view: bool,
    calls: Mutex<Vec<String>>,
}

impl MemoryRecordStore {
    pub fn new(
        leads: Vec<Lead>,
        opportunities: Vec<Opportunity>,
        transfer_view: Vec<TransferCheckRow>,
    ) -> Self {
        Self {
            leads,
            opportunities,
            transfer_view,
            ..Self::default()
        }
    }

    pub fn from_seed(seed: MemorySeed) -> Self {
        Self::new(seed.leads, seed.opportunities, seed.transfer_view)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let seed: MemorySeed = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded memory store seed: {} leads, {} opportunities, {} view rows",
            seed.leads.len(),
            seed.opportunities.len(),
            seed.transfer_view.len()
        );
        Ok(Self::from_seed(seed))
    }

    /// Every exact-phone lookup sleeps this long first.
    pub fn with_exact_phone_delay(mut self, delay: Duration) -> Self {
        self.exact_phone_delay = Some(delay);
        self
    }

    /// Every phone-pattern lookup sleeps this long first.
    pub fn with_pattern_delay(mut self, delay: Duration) -> Self {
        self.pattern_delay = Some(delay);
        self
    }

    /// Transfer-view queries fail with an HTTP-style error.
    pub fn with_failing_transfer_view(mut self) -> Self {
        self.fail_transfer_view = true;
        self
    }

    /// Names of the queries issued so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, name: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.to_string());
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_leads_by_exact_phone(
        &self,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.record_call("find_leads_by_exact_phone");
        if let Some(delay) = self.exact_phone_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .leads
            .iter()
            .filter(|l| l.phone.as_deref() == Some(value))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_leads_by_phone_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.record_call("find_leads_by_phone_pattern");
        if let Some(delay) = self.pattern_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .leads
            .iter()
            .filter(|l| l.phone.as_deref().is_some_and(|p| like_matches(pattern, p)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_opportunities_by_lead_ids(
        &self,
        lead_ids: &[String],
        limit: usize,
        order_by_created_desc: bool,
    ) -> Result<Vec<Opportunity>, StoreError> {
        self.record_call("find_opportunities_by_lead_ids");

        let mut found: Vec<Opportunity> = self
            .opportunities
            .iter()
            .filter(|op| lead_ids.contains(&op.lead_id))
            .cloned()
            .collect();

        if order_by_created_desc {
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        found.truncate(limit);
        Ok(found)
    }

    async fn find_transfer_view_by_name_substring(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<TransferCheckRow>, StoreError> {
        self.record_call("find_transfer_view_by_name_substring");
        if self.fail_transfer_view {
            return Err(StoreError::Http("transfer view unavailable".to_string()));
        }

        let needle = term.to_lowercase();
        Ok(self
            .transfer_view
            .iter()
            .filter(|row| {
                row.opportunity_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_transfer_view(&self, limit: usize) -> Result<Vec<TransferCheckRow>, StoreError> {
        self.record_call("list_transfer_view");
        if self.fail_transfer_view {
            return Err(StoreError::Http("transfer view unavailable".to_string()));
        }

        Ok(self.transfer_view.iter().take(limit).cloned().collect())
    }

    async fn health_check(&self) -> bool {
        !self.fail_transfer_view
    }
}
