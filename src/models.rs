use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::legacy::{LegacyRecord, StatusWarnings};

// ============ Store Records ============

/// A contactable person. Phones are stored as free text in many historical formats.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Lead {
    /// Opaque stable key.
    pub id: String,
    /// Phone exactly as it was captured.
    pub phone: Option<String>,
    /// Full name of the lead.
    pub full_name: Option<String>,
    /// Timestamp of creation.
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A sales/transfer event tied to exactly one lead.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    /// The lead this opportunity references. The opportunity does not own it.
    pub lead_id: String,
    /// Often encodes a phone suffix, e.g. `"Jane Doe-(757) 627-1618"`.
    pub opportunity_name: Option<String>,
    pub current_stage: Option<String>,
    pub opportunity_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub status_updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Read-only row of the `transfer_check_view` join (lead + opportunity).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TransferCheckRow {
    pub opportunity_id: String,
    pub opportunity_name: Option<String>,
    pub current_stage: Option<String>,
    pub opportunity_status: Option<String>,
    /// Status computed by the view for safe display.
    pub transfer_status: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub status_updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

// ============ Matching Domain ============

/// Which search tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Exact equality on one of the phone format variants.
    ExactPhone,
    /// Digit-pattern prefilter re-verified by normalization.
    PhonePattern,
    /// Case-insensitive substring over the transfer view's opportunity name.
    TransferView,
}

/// Lead fields carried alongside a candidate when it was joined from the lead table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub phone: Option<String>,
    pub full_name: Option<String>,
}

/// Unified record the selection policy ranks, regardless of which tier found it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub opportunity_id: String,
    pub lead_id: Option<String>,
    pub opportunity_name: Option<String>,
    pub current_stage: Option<String>,
    pub opportunity_status: Option<String>,
    pub transfer_status: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    /// Denormalized lead data used as a fallback by the legacy projection.
    pub lead: Option<LeadSummary>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub source: MatchTier,
}

impl Candidate {
    /// Joins an opportunity with the lead it references.
    ///
    /// The lead's phone and name are inlined; `transfer_status` mirrors the
    /// opportunity status since only the view computes a distinct one.
    pub fn from_opportunity(op: Opportunity, lead: Option<&Lead>, source: MatchTier) -> Self {
        Self {
            opportunity_id: op.id,
            lead_id: Some(op.lead_id),
            opportunity_name: op.opportunity_name,
            current_stage: op.current_stage,
            transfer_status: op.opportunity_status.clone(),
            opportunity_status: op.opportunity_status,
            phone: lead.and_then(|l| l.phone.clone()),
            full_name: lead.and_then(|l| l.full_name.clone()),
            lead: lead.map(|l| LeadSummary {
                phone: l.phone.clone(),
                full_name: l.full_name.clone(),
            }),
            status_updated_at: op.status_updated_at,
            created_at: op.created_at,
            source,
        }
    }

    pub fn from_transfer_row(row: TransferCheckRow) -> Self {
        Self {
            opportunity_id: row.opportunity_id,
            lead_id: None,
            opportunity_name: row.opportunity_name,
            current_stage: row.current_stage,
            opportunity_status: row.opportunity_status,
            transfer_status: row.transfer_status,
            phone: row.phone,
            full_name: row.full_name,
            lead: None,
            status_updated_at: row.status_updated_at,
            created_at: row.created_at,
            source: MatchTier::TransferView,
        }
    }

    /// Creation time in milliseconds, with a missing timestamp ranked as the epoch.
    pub fn created_at_millis(&self) -> i64 {
        self.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

/// The record picked for a search, with the size of the candidate set it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub record: Candidate,
    pub found_count: usize,
    /// True when the record was picked because it is disqualified, not because it is newest.
    pub dq_prioritized: bool,
}

/// Result of a search. Zero candidates is a normal outcome, distinct from an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(MatchResult),
    NotFound,
}

impl SearchOutcome {
    pub fn found_count(&self) -> usize {
        match self {
            SearchOutcome::Found(m) => m.found_count,
            SearchOutcome::NotFound => 0,
        }
    }
}

/// Explicit per-call context handed to the engine instead of ambient session state.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub request_id: Uuid,
    /// Who asked, when the caller knows it. Only used for tracing.
    pub operator: Option<String>,
}

impl SearchContext {
    pub fn new(operator: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operator,
        }
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new(None)
    }
}

// ============ API Models ============

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Phone number in any format, or free text matched against opportunity names.
    pub term: String,
    /// Optional operator label recorded in traces.
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub found: bool,
    pub found_count: usize,
    pub dq_prioritized: bool,
    pub matched_by: Option<MatchTier>,
    pub opportunity_id: Option<String>,
    pub record: Option<LegacyRecord>,
    pub warnings: StatusWarnings,
}

impl SearchResponse {
    pub fn from_outcome(outcome: &SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Found(m) => {
                let record = LegacyRecord::from_candidate(&m.record);
                let warnings = StatusWarnings::derive(&record, m.dq_prioritized);
                Self {
                    found: true,
                    found_count: m.found_count,
                    dq_prioritized: m.dq_prioritized,
                    matched_by: Some(m.record.source),
                    opportunity_id: Some(m.record.opportunity_id.clone()),
                    record: Some(record),
                    warnings,
                }
            }
            SearchOutcome::NotFound => Self {
                found: false,
                found_count: 0,
                dq_prioritized: false,
                matched_by: None,
                opportunity_id: None,
                record: None,
                warnings: StatusWarnings::default(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferCheckResponse {
    pub found: bool,
    pub opportunity_id: Option<String>,
    pub record: Option<LegacyRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub store_reachable: bool,
}

// ============ Timestamp Parsing ============

/// Parse a store timestamp into `DateTime<Utc>`.
///
/// Accepts RFC 3339, Postgres text output with an offset, and naive
/// timestamps (assumed UTC) as returned for `timestamp without time zone`.
pub fn parse_timestamp(timestamp_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            DateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f%#z")
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .ok()
}

/// Lenient timestamp field: unparseable values become `None` rather than
/// rejecting the whole row, matching the "missing timestamp = epoch" ranking rule.
fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|s| {
        let parsed = parse_timestamp(s);
        if parsed.is_none() {
            tracing::debug!("Ignoring unparseable timestamp '{}'", s);
        }
        parsed
    }))
}
