//! Projection of a matched record into the legacy display shape.
//!
//! The field names are a contract with the presentation layer, which keys its
//! warnings off `Policy Status` and `GHL Pipeline Stage`. Do not rename them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Candidate;

/// Shown for any field with no value.
pub const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LegacyRecord {
    #[serde(rename = "Mobile")]
    pub mobile: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Policy Status")]
    pub policy_status: String,
    #[serde(rename = "GHL Pipeline Stage")]
    pub ghl_pipeline_stage: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Full Name")]
    pub full_name: String,
}

/// First present, non-empty value, else the placeholder.
fn first_present<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    values
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

impl LegacyRecord {
    /// Pure projection; never fails and never validates.
    pub fn from_candidate(record: &Candidate) -> Self {
        let lead_phone = record.lead.as_ref().and_then(|l| l.phone.as_deref());
        let lead_name = record.lead.as_ref().and_then(|l| l.full_name.as_deref());

        let phone = first_present([record.phone.as_deref(), lead_phone]);
        let full_name = first_present([record.full_name.as_deref(), lead_name]);

        Self {
            mobile: phone.clone(),
            name: full_name.clone(),
            policy_status: first_present([
                record.opportunity_status.as_deref(),
                record.transfer_status.as_deref(),
            ]),
            ghl_pipeline_stage: first_present([record.current_stage.as_deref()]),
            status: first_present([record.opportunity_status.as_deref()]),
            phone,
            full_name,
        }
    }
}

/// UI warning flags derived from a projected record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusWarnings {
    /// The customer already holds a current policy.
    pub policy: bool,
    /// The lead was disqualified.
    pub dq: bool,
    /// An approved record already exists.
    pub existing: bool,
}

impl StatusWarnings {
    pub fn derive(record: &LegacyRecord, dq_prioritized: bool) -> Self {
        if dq_prioritized {
            return Self {
                dq: true,
                ..Self::default()
            };
        }

        let status = record.policy_status.to_lowercase();
        let policy = status.contains("customer has current policy");

        Self {
            policy,
            dq: !policy && status.contains("customer has already been dq from our agency"),
            existing: status.contains("approved"),
        }
    }
}
