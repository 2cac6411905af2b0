//! Record store abstraction the matching engine reads from.
//!
//! Backends: [`crate::pg_store::PgRecordStore`] (direct Postgres),
//! [`crate::rest_store::RestRecordStore`] (PostgREST / Supabase) and
//! [`crate::memory_store::MemoryRecordStore`] (in-process).

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::models::{Lead, Opportunity, TransferCheckRow};

/// Failure reading from a record store.
#[derive(Debug)]
pub enum StoreError {
    /// SQL backend failure.
    Database(sqlx::Error),
    /// Transport failure or non-success status from an HTTP backend.
    Http(String),
    /// Response body could not be decoded into records.
    Decode(String),
    /// The call did not finish within the configured bound.
    Timeout(Duration),
    /// The circuit breaker is open; the backend was not called.
    Rejected,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Http(msg) => write!(f, "http error: {}", msg),
            StoreError::Decode(msg) => write!(f, "decode error: {}", msg),
            StoreError::Timeout(after) => write!(f, "timed out after {:?}", after),
            StoreError::Rejected => write!(f, "circuit breaker open, call rejected"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Http(err.to_string())
        }
    }
}

/// Read-only queries over leads, opportunities and the transfer-check view.
///
/// Every method takes an explicit `limit`; backends must never return more rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Leads whose stored phone equals `value` exactly.
    async fn find_leads_by_exact_phone(
        &self,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError>;

    /// Leads whose stored phone matches a LIKE pattern (`%` = any run of characters).
    async fn find_leads_by_phone_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError>;

    /// Opportunities referencing any of `lead_ids`.
    async fn find_opportunities_by_lead_ids(
        &self,
        lead_ids: &[String],
        limit: usize,
        order_by_created_desc: bool,
    ) -> Result<Vec<Opportunity>, StoreError>;

    /// View rows whose opportunity name contains `term`, ignoring case.
    async fn find_transfer_view_by_name_substring(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<TransferCheckRow>, StoreError>;

    /// Up to `limit` view rows, in backend order.
    async fn list_transfer_view(&self, limit: usize) -> Result<Vec<TransferCheckRow>, StoreError>;

    /// Whether the backend answers a trivial query.
    async fn health_check(&self) -> bool;
}

/// SQL LIKE semantics over plain strings: `%` matches any run, `_` any single
/// character. Used by backends that cannot push the pattern down.
pub fn like_matches(pattern: &str, value: &str) -> bool {
    fn go(p: &[char], v: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some((&'%', rest)) => (0..=v.len()).any(|i| go(rest, &v[i..])),
            Some((&'_', rest)) => !v.is_empty() && go(rest, &v[1..]),
            Some((c, rest)) => v.first() == Some(c) && go(rest, &v[1..]),
        }
    }

    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    go(&p, &v)
}
