//! Disqualification ("DQ") detection over free-text stage and status fields.
//!
//! Stage names are typed by hand in the CRM, so detection is phrase matching,
//! not an enum. The phrase list lives here on its own so it can grow without
//! touching the selection policy in the engine.

use once_cell::sync::Lazy;
use regex::{RegexSet, RegexSetBuilder};

use crate::models::Candidate;

/// Phrases that mark a record as disqualified. Matched case-insensitively with
/// word boundaries, so `adquire` or `dqx` never count.
pub const DEFAULT_DQ_PATTERNS: &[&str] = &[
    r"\bdq\b",
    r"\bdq'd\b",
    r"\bdisqualif\w*",
    r"\bchargeback\s*dq\b",
    r"\breturned to center\s*-?\s*dq\b",
];

static DEFAULT_CLASSIFIER: Lazy<DqClassifier> = Lazy::new(|| {
    DqClassifier::new(DEFAULT_DQ_PATTERNS).expect("default DQ patterns are valid regexes")
});

/// Case-insensitive DQ phrase matcher.
#[derive(Debug, Clone)]
pub struct DqClassifier {
    patterns: RegexSet,
}

impl DqClassifier {
    /// Build a classifier from regex phrases.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { patterns })
    }

    /// Default phrases plus `extra` ones.
    pub fn with_extra_patterns(extra: &[&str]) -> Result<Self, regex::Error> {
        Self::new(DEFAULT_DQ_PATTERNS.iter().chain(extra.iter()))
    }

    pub fn is_dq(&self, text: &str) -> bool {
        !text.is_empty() && self.patterns.is_match(text)
    }

    /// A candidate is DQ when its stage, status or computed transfer status says so.
    pub fn is_dq_candidate(&self, candidate: &Candidate) -> bool {
        [
            candidate.current_stage.as_deref(),
            candidate.opportunity_status.as_deref(),
            candidate.transfer_status.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| self.is_dq(text))
    }
}

impl Default for DqClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

/// Whether `text` matches one of [`DEFAULT_DQ_PATTERNS`].
pub fn is_dq_text(text: &str) -> bool {
    DEFAULT_CLASSIFIER.is_dq(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchTier;

    #[test]
    fn test_dq_phrases() {
        assert!(is_dq_text("DQ"));
        assert!(is_dq_text("DQ'd"));
        assert!(is_dq_text("dq'd - no income"));
        assert!(is_dq_text("Disqualified"));
        assert!(is_dq_text("Disqualification pending"));
        assert!(is_dq_text("Chargeback DQ"));
        assert!(is_dq_text("chargebackdq"));
        assert!(is_dq_text("Returned to Center - DQ"));
        assert!(is_dq_text("returned to center dq"));
        assert!(is_dq_text("Customer has already been DQ from our agency"));
    }

    #[test]
    fn test_substring_false_positives() {
        assert!(!is_dq_text("adquire"));
        assert!(!is_dq_text("HQ"));
        assert!(!is_dq_text("dqx"));
        assert!(!is_dq_text("Approved"));
        assert!(!is_dq_text("Qualified"));
        assert!(!is_dq_text(""));
    }

    #[test]
    fn test_extra_patterns() {
        let classifier = DqClassifier::with_extra_patterns(&[r"\bdo not transfer\b"]).unwrap();
        assert!(classifier.is_dq("DO NOT TRANSFER"));
        assert!(classifier.is_dq("dq"));
        assert!(!is_dq_text("do not transfer"));
    }

    #[test]
    fn test_candidate_fields_checked() {
        let mut candidate = Candidate {
            opportunity_id: "op-1".to_string(),
            lead_id: None,
            opportunity_name: Some("DQ Smith-7576271618".to_string()),
            current_stage: Some("New".to_string()),
            opportunity_status: None,
            transfer_status: None,
            phone: None,
            full_name: None,
            lead: None,
            status_updated_at: None,
            created_at: None,
            source: MatchTier::TransferView,
        };
        let classifier = DqClassifier::default();

        // The opportunity name is not a status field.
        assert!(!classifier.is_dq_candidate(&candidate));

        candidate.transfer_status = Some("Returned to center - DQ".to_string());
        assert!(classifier.is_dq_candidate(&candidate));
    }
}
