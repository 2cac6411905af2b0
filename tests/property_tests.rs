/// Property-based tests using proptest
/// Tests invariants of phone normalization and DQ classification for all inputs
use proptest::prelude::*;
use transfer_check_api::dq::is_dq_text;
use transfer_check_api::phone::{extract_phone_from_opportunity_name, normalize_phone};

// Property: normalization never panics and always yields 10 digits
proptest! {
    #[test]
    fn normalize_never_panics(raw in "\\PC*") {
        if let Some(phone) = normalize_phone(&raw) {
            prop_assert_eq!(phone.as_str().len(), 10);
            prop_assert!(phone.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn normalize_is_idempotent(raw in "[0-9()+. -]{0,24}") {
        if let Some(phone) = normalize_phone(&raw) {
            prop_assert_eq!(normalize_phone(phone.as_str()), Some(phone));
        }
    }
}

// Property: every generated format variant normalizes back to its source
proptest! {
    #[test]
    fn variants_round_trip(digits in "[0-9]{10}") {
        let phone = normalize_phone(&digits).expect("10 digits always normalize");
        for variant in phone.variants() {
            let normalized = normalize_phone(&variant);
            prop_assert_eq!(normalized.as_ref(), Some(&phone), "variant {}", variant);
        }
    }

    #[test]
    fn digit_pattern_contains_all_groups(digits in "[0-9]{10}") {
        let phone = normalize_phone(&digits).expect("10 digits always normalize");
        let pattern = phone.digit_pattern();
        prop_assert!(pattern.contains(phone.area()));
        prop_assert!(pattern.contains(phone.exchange()));
        prop_assert!(pattern.contains(phone.number()));
    }

    #[test]
    fn name_suffix_phone_is_recovered(name in "[A-Za-z ]{1,20}", digits in "[2-9][0-9]{9}") {
        let formatted = format!("{}-({}) {}-{}", name, &digits[..3], &digits[3..6], &digits[6..]);
        prop_assert_eq!(extract_phone_from_opportunity_name(&formatted), Some(digits));
    }
}

// Property: DQ classification never panics and is case-insensitive
proptest! {
    #[test]
    fn dq_classification_never_panics(text in "\\PC*") {
        let _ = is_dq_text(&text);
    }

    #[test]
    fn dq_ignores_case(prefix in "[a-z ]{0,10}") {
        let lower = format!("{} dq", prefix);
        prop_assert_eq!(is_dq_text(&lower), is_dq_text(&lower.to_uppercase()));
        prop_assert!(is_dq_text(&lower));
    }
}
