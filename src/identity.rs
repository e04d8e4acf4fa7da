//! Packed identity-number codec
//!
//! NV items store a 15-digit identity number in 9 bytes:
//!
//! ```text
//! byte 0     : 0x08 length/tag
//! bytes 1..8 : digits 0..13, two per byte, earlier digit in the low nibble
//! byte 8     : 0xF0 | digit 14
//! ```
//!
//! Decoding is lenient: nibbles above 9 are skipped and short input is padded
//! with zeros, so partially written items still produce a 15-digit string.
//! Run [`crate::validator::is_plausible`] before trusting the result.

use crate::constants::{IDENTITY_DIGITS, IDENTITY_FILLER, IDENTITY_PACKED_LEN, IDENTITY_TAG};
use crate::error::ValidationError;

/// Maximum packed bytes examined after the tag
const PACKED_DIGIT_BYTES: usize = IDENTITY_PACKED_LEN - 1;

/// Check that `id` is exactly 15 decimal digits
pub fn validate_format(id: &str) -> Result<(), ValidationError> {
    let len = id.chars().count();
    if len != IDENTITY_DIGITS {
        return Err(ValidationError::WrongLength { len });
    }

    match id.chars().position(|c| !c.is_ascii_digit()) {
        Some(position) => Err(ValidationError::NonDigit { position }),
        None => Ok(()),
    }
}

/// Check that `id` is exactly 15 decimal digits
pub fn is_valid_format(id: &str) -> bool {
    validate_format(id).is_ok()
}

/// Walk the packed nibbles and collect up to 15 digits without padding
pub fn unpack_digits(raw: &[u8]) -> String {
    let start = usize::from(raw.len() >= IDENTITY_PACKED_LEN && raw[0] == IDENTITY_TAG);
    let mut digits = String::with_capacity(IDENTITY_DIGITS);

    for &byte in raw.iter().skip(start).take(PACKED_DIGIT_BYTES) {
        for nibble in [byte & 0x0F, byte >> 4] {
            if nibble <= 9 && digits.len() < IDENTITY_DIGITS {
                digits.push(char::from(b'0' + nibble));
            }
        }

        if digits.len() >= IDENTITY_DIGITS {
            break;
        }
    }

    digits
}

/// Decode a packed identity into its 15-digit string form
///
/// Never fails; missing digits are filled with `'0'`.
pub fn decode(raw: &[u8]) -> String {
    let mut digits = unpack_digits(raw);
    while digits.len() < IDENTITY_DIGITS {
        digits.push('0');
    }
    digits
}

/// Pack a 15-digit identity number
pub fn encode(id: &str) -> Result<[u8; IDENTITY_PACKED_LEN], ValidationError> {
    validate_format(id)?;

    let digits: Vec<u8> = id.bytes().map(|b| b - b'0').collect();
    let mut packed = [0u8; IDENTITY_PACKED_LEN];
    packed[0] = IDENTITY_TAG;
    for (slot, pair) in packed[1..PACKED_DIGIT_BYTES].iter_mut().zip(digits.chunks_exact(2)) {
        *slot = (pair[1] << 4) | pair[0];
    }
    packed[PACKED_DIGIT_BYTES] = IDENTITY_FILLER | digits[IDENTITY_DIGITS - 1];

    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let packed = encode("356789012345672").unwrap();
        assert_eq!(
            packed,
            [0x08, 0x53, 0x76, 0x98, 0x10, 0x32, 0x54, 0x76, 0xF2]
        );
    }

    #[test]
    fn test_decode_packed() {
        let packed = [0x08, 0x53, 0x76, 0x98, 0x10, 0x32, 0x54, 0x76, 0xF2];
        assert_eq!(decode(&packed), "356789012345672");
    }

    #[test]
    fn test_round_trip() {
        for id in [
            "000000000000000",
            "123456789012345",
            "987654321098765",
            "490154203237518",
            "999999999999999",
        ] {
            assert_eq!(decode(&encode(id).unwrap()), id);
        }
    }

    #[test]
    fn test_decode_without_tag() {
        // Eight bytes: too short for the tag to be recognised
        let packed = [0x53, 0x76, 0x98, 0x10, 0x32, 0x54, 0x76, 0xF2];
        assert_eq!(decode(&packed), "356789012345672");
    }

    #[test]
    fn test_decode_short_input_is_padded() {
        assert_eq!(decode(&[]), "000000000000000");
        assert_eq!(decode(&[0x21]), "120000000000000");
        assert_eq!(decode(&[0x08, 0x21, 0x43]), "801234000000000");
    }

    #[test]
    fn test_decode_skips_non_decimal_nibbles() {
        let packed = [0x08, 0xA1, 0x32, 0xFF, 0x54, 0x76, 0x98, 0x10, 0xF2];
        let decoded = decode(&packed);
        assert_eq!(decoded.len(), 15);
        assert_eq!(decoded, "123456789012000");
        assert_eq!(unpack_digits(&packed), "123456789012");
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut raw = encode("490154203237518").unwrap().to_vec();
        raw.extend_from_slice(&[0x12, 0x34, 0x56]);
        assert_eq!(decode(&raw), "490154203237518");
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        assert_eq!(
            encode("12345"),
            Err(ValidationError::WrongLength { len: 5 })
        );
        assert_eq!(
            encode("12345678901234a"),
            Err(ValidationError::NonDigit { position: 14 })
        );
        assert_eq!(
            encode("1234567890123456"),
            Err(ValidationError::WrongLength { len: 16 })
        );
    }

    #[test]
    fn test_is_valid_format() {
        assert!(is_valid_format("490154203237518"));
        assert!(!is_valid_format(""));
        assert!(!is_valid_format("49015420323751 "));
        assert!(!is_valid_format("٤٩٠١٥٤٢٠٣٢٣٧٥١٨"));
    }

    proptest! {
        #[test]
        fn test_round_trip_any_identity(id in "[0-9]{15}") {
            prop_assert_eq!(decode(&encode(&id).unwrap()), id);
        }

        #[test]
        fn test_decode_arbitrary_bytes(raw in vec(any::<u8>(), 0..32)) {
            let decoded = decode(&raw);
            prop_assert_eq!(decoded.len(), IDENTITY_DIGITS);
            prop_assert!(decoded.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
