//! Phone normalization and legacy format expansion.
//!
//! Leads were captured over years by different tools, so the same US/Canada
//! number shows up as `7576271618`, `(757) 627-1618`, `+1-757-627-1618` and so
//! on. Everything here reduces those to one canonical 10-digit form, or expands
//! the canonical form back into the formats likely to be stored verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Fewer stripped digits than this is too short to be a subscriber number.
const MIN_DIGITS: usize = 10;
/// More stripped digits than this is rejected outright.
const MAX_DIGITS: usize = 15;

/// Exactly 10 ASCII digits: a US/Canada subscriber number with no country code.
///
/// Only [`normalize_phone`] constructs one, so holding a `CanonicalPhone` is
/// proof the digits passed the reduction rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn area(&self) -> &str {
        &self.0[0..3]
    }

    pub fn exchange(&self) -> &str {
        &self.0[3..6]
    }

    pub fn number(&self) -> &str {
        &self.0[6..10]
    }

    /// Textual formats to probe with exact-equality lookups, in probe order.
    ///
    /// The order only matters to the "first variant with a hit wins" policy of
    /// the exact-phone tier.
    pub fn variants(&self) -> Vec<String> {
        let digits = self.as_str();
        let (area, exchange, number) = (self.area(), self.exchange(), self.number());

        vec![
            digits.to_string(),
            format!("1{}", digits),
            format!("({}) {}-{}", area, exchange, number),
            format!("{}-{}-{}", area, exchange, number),
            format!("+1{}", digits),
            format!("{}.{}.{}", area, exchange, number),
            format!("1 ({}) {}-{}", area, exchange, number),
            format!("{} {} {}", area, exchange, number),
            format!("{}/{}/{}", area, exchange, number),
            format!("001-{}-{}-{}", area, exchange, number),
            format!("+1-{}-{}-{}", area, exchange, number),
        ]
    }

    /// LIKE pattern with the three digit groups separated by wildcards.
    ///
    /// Coarse prefilter only: it also matches numbers that merely contain the
    /// groups, so hits must be re-verified with [`normalize_phone`].
    pub fn digit_pattern(&self) -> String {
        format!("%{}%{}%{}%", self.area(), self.exchange(), self.number())
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a phone-like string to its canonical 10-digit form.
///
/// This is a lossy heuristic, not E.164 parsing:
/// - non-digits are stripped; fewer than 10 or more than 15 digits is rejected
/// - 11 digits with a leading `1` drops the US country code
/// - 12 digits with a leading `01` drops the international trunk prefix
/// - 13 digits with a leading `001` drops the international dialing prefix and
///   country code, so the `001-` format this module generates round-trips
/// - otherwise, more than 11 digits keeps the 10 after a leading `1`, or the
///   first 10 (a trailing extension is discarded, and an embedded extension can
///   be mis-trimmed)
///
/// Returns `None` when the result is not exactly 10 digits. Never guesses.
pub fn normalize_phone(raw: &str) -> Option<CanonicalPhone> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return None;
    }

    let reduced = if digits.len() == 11 && digits.starts_with('1') {
        &digits[1..]
    } else if digits.len() == 12 && digits.starts_with("01") {
        &digits[2..]
    } else if digits.len() == 13 && digits.starts_with("001") {
        &digits[3..]
    } else if digits.len() > 11 {
        if digits.starts_with('1') {
            &digits[1..11]
        } else {
            &digits[..10]
        }
    } else {
        &digits[..]
    };

    if reduced.len() == MIN_DIGITS {
        Some(CanonicalPhone(reduced.to_string()))
    } else {
        None
    }
}

/// `Name-(757) 627-1618`, `Name-757.627.1618`, `Name-7576271618` at the end of the name.
static NAME_SUFFIX_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-\(?(\d{3})\)?[\s.-]?(\d{3})[\s.-]?(\d{4})$").expect("valid phone suffix regex")
});

/// Any trailing run of exactly 10 digits.
static TRAILING_TEN_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{10})\D*$").expect("valid trailing digits regex"));

/// Pull the phone suffix out of an opportunity name as 10 raw digits.
///
/// Opportunity names are conventionally `"<name>-<phone>"`. The result is not
/// normalized; feed it through [`normalize_phone`] before comparing.
pub fn extract_phone_from_opportunity_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    if let Some(caps) = NAME_SUFFIX_PHONE.captures(name) {
        return Some(format!("{}{}{}", &caps[1], &caps[2], &caps[3]));
    }

    TRAILING_TEN_DIGITS
        .captures(name)
        .map(|caps| caps[1].to_string())
}
