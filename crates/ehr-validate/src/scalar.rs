//! Single-field validators.
//!
//! All of these are pure: malformed input returns `false` (or
//! `Gender::Invalid`), never an error or a panic, because they run once
//! per line over arbitrarily dirty extracts.

use std::sync::LazyLock;

use regex::Regex;

use ehr_model::Gender;

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("numeric pattern"));

/// Normalize a raw gender code. Never fails.
pub fn check_gender(value: &str) -> Gender {
    Gender::from_code(value)
}

/// Signed decimal check used by the type-specific numeric requirements.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value.trim())
}

/// A duration is valid when absent or a non-negative parseable number.
pub fn is_valid_duration(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    trimmed
        .parse::<f64>()
        .map(|days| days.is_finite() && days >= 0.0)
        .unwrap_or(false)
}

/// Shape check for ATC drug codes: one letter, two digits, two letters,
/// two digits, accepted at the legal prefix lengths 1, 3, 4, 5 and 7.
pub fn is_valid_atc(value: &str) -> bool {
    let code = value.trim();
    if !matches!(code.len(), 1 | 3 | 4 | 5 | 7) {
        return false;
    }
    code.bytes().enumerate().all(|(position, byte)| match position {
        0 | 3 | 4 => byte.is_ascii_alphabetic(),
        _ => byte.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_mapping() {
        assert_eq!(check_gender(""), Gender::Unknown);
        assert_eq!(check_gender("U"), Gender::Unknown);
        assert_eq!(check_gender("unknown"), Gender::Unknown);
        assert_eq!(check_gender("f"), Gender::Female);
        assert_eq!(check_gender("Female"), Gender::Female);
        assert_eq!(check_gender("m"), Gender::Male);
        assert_eq!(check_gender("MALE"), Gender::Male);
        assert_eq!(check_gender("x"), Gender::Invalid);
    }

    #[test]
    fn numeric_accepts_signed_decimals() {
        assert!(is_numeric("42"));
        assert!(is_numeric("-3.5"));
        assert!(is_numeric("+0.25"));
        assert!(is_numeric(".5"));
        assert!(is_numeric(" 7 "));
        assert!(!is_numeric(""));
        assert!(!is_numeric("1,5"));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric("--1"));
    }

    #[test]
    fn duration_allows_absent_and_fractional() {
        assert!(is_valid_duration(""));
        assert!(is_valid_duration("  "));
        assert!(is_valid_duration("30"));
        assert!(is_valid_duration("14.5"));
        assert!(is_valid_duration("0"));
        assert!(!is_valid_duration("-1"));
        assert!(!is_valid_duration("month"));
    }

    #[test]
    fn atc_shape() {
        assert!(is_valid_atc("B01AC06"));
        assert!(is_valid_atc("b01ac06"));
        assert!(is_valid_atc("N"));
        assert!(is_valid_atc("N02"));
        assert!(is_valid_atc("N02B"));
        assert!(is_valid_atc("N02BA"));
        assert!(!is_valid_atc("N0"));
        assert!(!is_valid_atc("N02BA0"));
        assert!(!is_valid_atc("102AC06"));
        assert!(!is_valid_atc("B01AC0X"));
        assert!(!is_valid_atc(""));
        assert!(!is_valid_atc("B01AC065"));
    }
}
