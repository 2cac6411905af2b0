//! Tiered record matching.
//!
//! A search walks an explicit state machine over [`Tier`]:
//!
//! - `ExactProbe`: leads and opportunities found → `Selected`; leads without
//!   opportunities → `TextFallback`; no leads → `PatternFallback`
//! - `PatternFallback`: opportunities found → `Selected`, else `TextFallback`
//! - `TextFallback`: rows found → `Selected`, else `NotFound`
//!
//! Phone-shaped terms start at `ExactProbe`; anything else starts at
//! `TextFallback`. Store failures in the two phone tiers degrade to the next
//! tier; only a failure in `TextFallback` surfaces as an error.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::dq::DqClassifier;
use crate::errors::{AppError, ResultExt};
use crate::fingerprint::term_fingerprint;
use crate::models::{
    Candidate, Lead, LeadSummary, MatchResult, MatchTier, SearchContext, SearchOutcome,
};
use crate::phone::{extract_phone_from_opportunity_name, normalize_phone, CanonicalPhone};
use crate::store::{RecordStore, StoreError};

/// Leads fetched per exact-phone variant probe.
pub const EXACT_PHONE_LEAD_LIMIT: usize = 20;
/// Leads fetched by the digit-pattern prefilter.
pub const PATTERN_LEAD_LIMIT: usize = 50;
/// Opportunities fetched for the matched leads.
pub const OPPORTUNITY_LIMIT: usize = 500;
/// Transfer view rows fetched by the free-text fallback.
pub const TRANSFER_VIEW_LIMIT: usize = 200;
/// Transfer view rows scanned by the opportunity-name phone lookup.
pub const NAME_PHONE_SCAN_LIMIT: usize = 1000;

/// Search state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ExactProbe,
    PatternFallback,
    TextFallback,
    Selected,
    NotFound,
}

impl Tier {
    pub fn start(phone_shaped: bool) -> Self {
        if phone_shaped {
            Tier::ExactProbe
        } else {
            Tier::TextFallback
        }
    }

    /// Transition after running this tier.
    ///
    /// `leads` and `candidates` are what the tier found. Leads without
    /// opportunities in `ExactProbe` skip the pattern tier: the phone matched,
    /// there is just nothing linked to it.
    pub fn next(self, leads: usize, candidates: usize) -> Self {
        match self {
            Tier::ExactProbe if candidates > 0 => Tier::Selected,
            Tier::ExactProbe if leads > 0 => Tier::TextFallback,
            Tier::ExactProbe => Tier::PatternFallback,
            Tier::PatternFallback if candidates > 0 => Tier::Selected,
            Tier::PatternFallback => Tier::TextFallback,
            Tier::TextFallback if candidates > 0 => Tier::Selected,
            Tier::TextFallback => Tier::NotFound,
            terminal => terminal,
        }
    }
}

/// Pick one record from a candidate set.
///
/// The first DQ candidate in the given order wins outright, regardless of
/// recency. Otherwise the newest by `created_at` wins (missing = epoch), with
/// ties kept in the given order.
pub fn select_candidate(
    mut candidates: Vec<Candidate>,
    classifier: &DqClassifier,
) -> Option<MatchResult> {
    let found_count = candidates.len();

    if let Some(pos) = candidates
        .iter()
        .position(|c| classifier.is_dq_candidate(c))
    {
        let record = candidates.swap_remove(pos);
        return Some(MatchResult {
            record,
            found_count,
            dq_prioritized: true,
        });
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.created_at_millis()));
    candidates.into_iter().next().map(|record| MatchResult {
        record,
        found_count,
        dq_prioritized: false,
    })
}

/// Resolves a search term to one opportunity.
///
/// Stateless apart from configuration; one engine serves all requests.
pub struct MatchingEngine {
    store: Arc<dyn RecordStore>,
    store_timeout: Duration,
    classifier: DqClassifier,
}

impl MatchingEngine {
    pub fn new(store: Arc<dyn RecordStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
            classifier: DqClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: DqClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Bound a store call by the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }

    /// Search by phone number or free text.
    ///
    /// Returns [`SearchOutcome::NotFound`] when no tier yields a candidate.
    /// Errors only on an empty term or a failed transfer-view fallback.
    pub async fn search(
        &self,
        ctx: &SearchContext,
        term: &str,
    ) -> Result<SearchOutcome, AppError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::BadRequest(
                "Search term must not be empty".to_string(),
            ));
        }

        let span = tracing::info_span!(
            "search",
            request_id = %ctx.request_id,
            operator = ctx.operator.as_deref().unwrap_or("-"),
            term = %term_fingerprint(term),
        );

        self.run_tiers(term, normalize_phone(term))
            .instrument(span)
            .await
    }

    async fn run_tiers(
        &self,
        term: &str,
        phone: Option<CanonicalPhone>,
    ) -> Result<SearchOutcome, AppError> {
        let mut tier = Tier::start(phone.is_some());
        let mut candidates: Vec<Candidate> = Vec::new();

        loop {
            tracing::debug!("Entering tier {:?}", tier);

            tier = match (tier, phone.as_ref()) {
                (Tier::ExactProbe, Some(phone)) => {
                    let leads = self.probe_exact_variants(phone).await;
                    candidates = self.opportunities_for(&leads, MatchTier::ExactPhone).await;
                    tier.next(leads.len(), candidates.len())
                }
                (Tier::PatternFallback, Some(phone)) => {
                    let leads = self.pattern_fallback(phone).await;
                    candidates = self
                        .opportunities_for(&leads, MatchTier::PhonePattern)
                        .await;
                    tier.next(leads.len(), candidates.len())
                }
                (Tier::ExactProbe | Tier::PatternFallback, None) => Tier::TextFallback,
                (Tier::TextFallback, _) => {
                    let rows = self
                        .bounded(
                            self.store
                                .find_transfer_view_by_name_substring(term, TRANSFER_VIEW_LIMIT),
                        )
                        .await
                        .context("Transfer view fallback failed")?;
                    tracing::debug!("Transfer view fallback returned {} row(s)", rows.len());
                    candidates = rows.into_iter().map(Candidate::from_transfer_row).collect();
                    tier.next(0, candidates.len())
                }
                (Tier::Selected, _) => {
                    let outcome = match select_candidate(candidates, &self.classifier) {
                        Some(matched) => {
                            tracing::info!(
                                "Matched opportunity {} via {:?} ({} candidate(s), dq_prioritized: {})",
                                matched.record.opportunity_id,
                                matched.record.source,
                                matched.found_count,
                                matched.dq_prioritized
                            );
                            SearchOutcome::Found(matched)
                        }
                        None => SearchOutcome::NotFound,
                    };
                    return Ok(outcome);
                }
                (Tier::NotFound, _) => {
                    tracing::info!("No opportunity found in any tier");
                    return Ok(SearchOutcome::NotFound);
                }
            };
        }
    }

    /// Probe every format variant concurrently; the first variant in probe
    /// order with at least one lead wins. Hits from later variants are not merged.
    async fn probe_exact_variants(&self, phone: &CanonicalPhone) -> Vec<Lead> {
        let variants = phone.variants();
        let probes = variants.iter().map(|variant| {
            self.bounded(
                self.store
                    .find_leads_by_exact_phone(variant, EXACT_PHONE_LEAD_LIMIT),
            )
        });
        let results = join_all(probes).await;

        for (variant, result) in variants.iter().zip(results) {
            match result {
                Ok(leads) if !leads.is_empty() => {
                    tracing::debug!(
                        "Exact probe hit {} lead(s) with format {:?}",
                        leads.len(),
                        variant_shape(variant)
                    );
                    return leads;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Exact phone probe failed, treating as empty: {}", e),
            }
        }

        Vec::new()
    }

    /// Coarse LIKE prefilter, re-verified by normalizing each stored phone.
    async fn pattern_fallback(&self, phone: &CanonicalPhone) -> Vec<Lead> {
        let pattern = phone.digit_pattern();
        let leads = match self
            .bounded(
                self.store
                    .find_leads_by_phone_pattern(&pattern, PATTERN_LEAD_LIMIT),
            )
            .await
        {
            Ok(leads) => leads,
            Err(e) => {
                tracing::warn!("Phone pattern fallback failed, treating as empty: {}", e);
                return Vec::new();
            }
        };

        let prefiltered = leads.len();
        let verified: Vec<Lead> = leads
            .into_iter()
            .filter(|lead| {
                lead.phone
                    .as_deref()
                    .and_then(normalize_phone)
                    .is_some_and(|stored| &stored == phone)
            })
            .collect();

        tracing::debug!(
            "Pattern fallback kept {}/{} lead(s) after normalization",
            verified.len(),
            prefiltered
        );
        verified
    }

    /// Opportunities for `leads`, newest first, joined back to their lead.
    async fn opportunities_for(&self, leads: &[Lead], source: MatchTier) -> Vec<Candidate> {
        if leads.is_empty() {
            return Vec::new();
        }

        let mut lead_ids: Vec<String> = Vec::with_capacity(leads.len());
        for lead in leads {
            if !lead_ids.contains(&lead.id) {
                lead_ids.push(lead.id.clone());
            }
        }

        let opportunities = match self
            .bounded(
                self.store
                    .find_opportunities_by_lead_ids(&lead_ids, OPPORTUNITY_LIMIT, true),
            )
            .await
        {
            Ok(ops) => ops,
            Err(e) => {
                tracing::warn!("Opportunity fetch failed, treating as empty: {}", e);
                return Vec::new();
            }
        };

        opportunities
            .into_iter()
            .map(|op| {
                let lead = leads.iter().find(|l| l.id == op.lead_id);
                Candidate::from_opportunity(op, lead, source)
            })
            .collect()
    }

    /// Find the transfer-view row whose opportunity name ends in the given phone.
    ///
    /// The status reported is the view's computed transfer status. Returns
    /// `Ok(None)` when no row matches.
    pub async fn lookup_by_opportunity_name_phone(
        &self,
        ctx: &SearchContext,
        raw_phone: &str,
    ) -> Result<Option<Candidate>, AppError> {
        let phone = normalize_phone(raw_phone).ok_or_else(|| {
            AppError::BadRequest("Expected a 10-digit US/Canada phone number".to_string())
        })?;

        let span = tracing::info_span!(
            "name_phone_lookup",
            request_id = %ctx.request_id,
            term = %term_fingerprint(phone.as_str()),
        );

        async {
            let rows = self
                .bounded(self.store.list_transfer_view(NAME_PHONE_SCAN_LIMIT))
                .await
                .context("Transfer view scan failed")?;
            tracing::debug!("Scanning {} transfer view row(s)", rows.len());

            let found = rows.into_iter().find(|row| {
                row.opportunity_name
                    .as_deref()
                    .and_then(extract_phone_from_opportunity_name)
                    .and_then(|digits| normalize_phone(&digits))
                    .is_some_and(|candidate| candidate == phone)
            });

            Ok::<_, AppError>(found.map(|row| {
                let mut candidate = Candidate::from_transfer_row(row);
                if candidate.transfer_status.is_some() {
                    candidate.opportunity_status = candidate.transfer_status.clone();
                }
                candidate.lead = Some(LeadSummary {
                    phone: candidate.phone.clone(),
                    full_name: candidate.full_name.clone(),
                });
                candidate
            }))
        }
        .instrument(span)
        .await
    }

    /// Store reachability, bounded by the store timeout.
    pub async fn store_healthy(&self) -> bool {
        self.bounded(async { Ok(self.store.health_check().await) })
            .await
            .unwrap_or(false)
    }
}

/// Format of a variant with digits masked, safe to log.
fn variant_shape(variant: &str) -> String {
    variant
        .chars()
        .map(|c| if c.is_ascii_digit() { '9' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(id: &str, stage: &str, created: Option<i64>) -> Candidate {
        Candidate {
            opportunity_id: id.to_string(),
            lead_id: None,
            opportunity_name: None,
            current_stage: Some(stage.to_string()),
            opportunity_status: None,
            transfer_status: None,
            phone: None,
            full_name: None,
            lead: None,
            status_updated_at: None,
            created_at: created.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
            source: MatchTier::TransferView,
        }
    }

    #[test]
    fn test_transitions() {
        assert_eq!(Tier::start(true), Tier::ExactProbe);
        assert_eq!(Tier::start(false), Tier::TextFallback);

        assert_eq!(Tier::ExactProbe.next(1, 2), Tier::Selected);
        assert_eq!(Tier::ExactProbe.next(1, 0), Tier::TextFallback);
        assert_eq!(Tier::ExactProbe.next(0, 0), Tier::PatternFallback);
        assert_eq!(Tier::PatternFallback.next(1, 1), Tier::Selected);
        assert_eq!(Tier::PatternFallback.next(1, 0), Tier::TextFallback);
        assert_eq!(Tier::PatternFallback.next(0, 0), Tier::TextFallback);
        assert_eq!(Tier::TextFallback.next(0, 3), Tier::Selected);
        assert_eq!(Tier::TextFallback.next(0, 0), Tier::NotFound);
        assert_eq!(Tier::Selected.next(0, 0), Tier::Selected);
        assert_eq!(Tier::NotFound.next(5, 5), Tier::NotFound);
    }

    #[test]
    fn test_first_dq_in_order_wins_over_recency() {
        let candidates = vec![
            candidate("newest", "Approved", Some(300)),
            candidate("old-dq", "DQ'd", Some(100)),
            candidate("newer-dq", "Disqualified", Some(200)),
        ];

        let matched = select_candidate(candidates, &DqClassifier::default()).unwrap();
        assert_eq!(matched.record.opportunity_id, "old-dq");
        assert!(matched.dq_prioritized);
        assert_eq!(matched.found_count, 3);
    }

    #[test]
    fn test_newest_wins_without_dq() {
        let candidates = vec![
            candidate("undated", "New", None),
            candidate("t1", "Approved", Some(100)),
            candidate("t2", "Transferred", Some(200)),
        ];

        let matched = select_candidate(candidates, &DqClassifier::default()).unwrap();
        assert_eq!(matched.record.opportunity_id, "t2");
        assert!(!matched.dq_prioritized);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let candidates = vec![
            candidate("first", "New", Some(100)),
            candidate("second", "New", Some(100)),
        ];

        let matched = select_candidate(candidates, &DqClassifier::default()).unwrap();
        assert_eq!(matched.record.opportunity_id, "first");
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert!(select_candidate(Vec::new(), &DqClassifier::default()).is_none());
    }

    #[test]
    fn test_variant_shape_masks_digits() {
        assert_eq!(variant_shape("(757) 627-1618"), "(999) 999-9999");
    }
}
