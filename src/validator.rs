//! Identity-number plausibility checks
//!
//! A decoded identity is only trusted when it is 15 digits, starts with one of
//! the known allocation prefixes, and passes the Luhn checksum.

use crate::constants::{IDENTITY_DIGITS, IDENTITY_PREFIXES};
use crate::identity;

/// Check format, allocation prefix and Luhn checksum
pub fn is_plausible(id: &str) -> bool {
    identity::is_valid_format(id) && has_known_prefix(id) && luhn_check(id)
}

/// Check whether the first two digits are a known allocation prefix
pub fn has_known_prefix(id: &str) -> bool {
    id.get(..2)
        .is_some_and(|prefix| IDENTITY_PREFIXES.contains(&prefix))
}

/// Luhn checksum over all digits, rightmost digit undoubled
///
/// Returns false for empty input or any non-digit character.
pub fn luhn_check(id: &str) -> bool {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = id
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| luhn_term(b - b'0', i % 2 == 1))
        .sum();

    sum % 10 == 0
}

/// Compute the 15th digit that makes a 14-digit body pass the Luhn check
pub fn luhn_check_digit(body: &str) -> Option<u8> {
    if body.len() != IDENTITY_DIGITS - 1 || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // The check digit will occupy the undoubled rightmost position
    let sum: u32 = body
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| luhn_term(b - b'0', i % 2 == 0))
        .sum();

    Some(((10 - sum % 10) % 10) as u8)
}

fn luhn_term(digit: u8, doubled: bool) -> u32 {
    let digit = u32::from(digit);
    if !doubled {
        return digit;
    }
    let doubled = digit * 2;
    if doubled > 9 {
        doubled - 9
    } else {
        doubled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luhn_known_valid() {
        assert!(luhn_check("490154203237518"));
        assert!(luhn_check("356789012345672"));
        assert!(luhn_check("0"));
    }

    #[test]
    fn test_luhn_altered_digit() {
        assert!(!luhn_check("490154203237519"));
        assert!(!luhn_check("490154203237517"));
        assert!(!luhn_check("356789012345678"));
    }

    #[test]
    fn test_luhn_rejects_non_digits() {
        assert!(!luhn_check(""));
        assert!(!luhn_check("49015420323751x"));
    }

    #[test]
    fn test_known_prefix() {
        assert!(has_known_prefix("35"));
        assert!(has_known_prefix("861234567890127"));
        assert!(!has_known_prefix("12"));
        assert!(!has_known_prefix("3"));
        assert!(!has_known_prefix(""));
    }

    #[test]
    fn test_is_plausible() {
        assert!(is_plausible("490154203237518"));
        assert!(is_plausible("356789012345672"));
        assert!(is_plausible("861234567890127"));
        // Luhn-valid but unknown prefix
        assert!(!is_plausible("123456789012347"));
        // Known prefix, bad checksum
        assert!(!is_plausible("356789012345678"));
        // Wrong length
        assert!(!is_plausible("49015420323751"));
        assert!(!is_plausible("000000000000000"));
    }

    #[test]
    fn test_luhn_check_digit() {
        assert_eq!(luhn_check_digit("49015420323751"), Some(8));
        assert_eq!(luhn_check_digit("35678901234567"), Some(2));
        assert_eq!(luhn_check_digit("86123456789012"), Some(7));
        assert_eq!(luhn_check_digit("3567890123456"), None);
        assert_eq!(luhn_check_digit("3567890123456x"), None);
    }
}
