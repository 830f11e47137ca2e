//! Tolerant parser turning a free-form delimited string into a byte sequence.

use serde::{Deserialize, Serialize};

/// Numeric base used when parsing a textual byte sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NumericStyle {
    /// Decimal only (`"65"` = 0x41)
    Decimal,
    /// Hexadecimal only (`"41"` = 0x41)
    Hex,
    /// Decimal first, hexadecimal as fallback
    Any,
}

const DELIMITERS: [char; 6] = [' ', ',', ';', '-', '\r', '\n'];

/// Splits `text` on spaces, commas, semicolons, hyphens and line breaks and
/// parses every token as a single byte under `style`. Tokens that do not
/// parse as a value in 0..=255 are dropped; an all-failing input yields an
/// empty sequence, never an error.
pub fn parse_byte_sequence(text: &str, style: NumericStyle) -> Vec<u8> {
    text.split(DELIMITERS)
        .filter(|token| !token.is_empty())
        .filter_map(|token| parse_byte(token, style))
        .collect()
}

fn parse_byte(token: &str, style: NumericStyle) -> Option<u8> {
    match style {
        NumericStyle::Decimal => token.parse().ok(),
        NumericStyle::Hex => u8::from_str_radix(token, 16).ok(),
        NumericStyle::Any => token
            .parse()
            .ok()
            .or_else(|| u8::from_str_radix(token, 16).ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_sequence() {
        assert_eq!(
            parse_byte_sequence("1A,2B;3C", NumericStyle::Hex),
            vec![0x1A, 0x2B, 0x3C]
        );
    }

    #[test]
    fn test_decimal_drops_invalid_token() {
        assert_eq!(parse_byte_sequence("zz 5", NumericStyle::Decimal), vec![5]);
    }

    #[test]
    fn test_all_delimiters() {
        assert_eq!(
            parse_byte_sequence("1 2,3;4-5\r6\n7", NumericStyle::Decimal),
            vec![1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_empty_tokens_discarded() {
        assert_eq!(
            parse_byte_sequence(",, 10 ;; 20 --", NumericStyle::Decimal),
            vec![10, 20]
        );
    }

    #[test]
    fn test_out_of_range_dropped() {
        assert_eq!(
            parse_byte_sequence("255 256 1000", NumericStyle::Decimal),
            vec![255]
        );
        // FF fits, 1FF does not
        assert_eq!(parse_byte_sequence("FF 1FF", NumericStyle::Hex), vec![0xFF]);
    }

    #[test]
    fn test_any_prefers_decimal() {
        // "10" is ten in decimal, not sixteen
        assert_eq!(parse_byte_sequence("10", NumericStyle::Any), vec![10]);
        // "1A" only parses as hex
        assert_eq!(parse_byte_sequence("1A", NumericStyle::Any), vec![0x1A]);
    }

    #[test]
    fn test_decimal_rejects_hex_digits() {
        assert!(parse_byte_sequence("1A 2B", NumericStyle::Decimal).is_empty());
    }

    #[test]
    fn test_empty_and_all_failing_input() {
        assert!(parse_byte_sequence("", NumericStyle::Any).is_empty());
        assert!(parse_byte_sequence("   ", NumericStyle::Any).is_empty());
        assert!(parse_byte_sequence("xx yy zz", NumericStyle::Any).is_empty());
    }

    #[test]
    fn test_token_order_preserved() {
        assert_eq!(
            parse_byte_sequence("3;1,2", NumericStyle::Decimal),
            vec![3, 1, 2]
        );
    }

    proptest! {
        #[test]
        fn prop_decimal_rendering_parses_back(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let text = bytes
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            prop_assert_eq!(parse_byte_sequence(&text, NumericStyle::Decimal), bytes);
        }

        #[test]
        fn prop_never_panics_on_arbitrary_input(text in ".*", style in prop_oneof![
            Just(NumericStyle::Decimal),
            Just(NumericStyle::Hex),
            Just(NumericStyle::Any),
        ]) {
            let _ = parse_byte_sequence(&text, style);
        }
    }
}
