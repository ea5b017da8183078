//! Explicit-point decimal (R) elements

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

static REAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([Ee][+-]?\d+)?$").ok());

pub(super) fn validate(text: &str) -> Option<String> {
    let matches = REAL.as_ref().is_some_and(|re| re.is_match(text));
    if matches {
        None
    } else {
        Some(format!("'{text}' is not a decimal number"))
    }
}

/// Digits after the point, exponent excluded
pub(super) fn fraction_digits(text: &str) -> u32 {
    let mantissa = text.split(['E', 'e']).next().unwrap_or(text);
    mantissa
        .split_once('.')
        .map_or(0, |(_, fraction)| {
            u32::try_from(fraction.chars().take_while(char::is_ascii_digit).count())
                .unwrap_or(u32::MAX)
        })
}

pub(super) fn digit_count(text: &str) -> usize {
    let mantissa = text.split(['E', 'e']).next().unwrap_or(text);
    mantissa.chars().filter(char::is_ascii_digit).count()
}

pub(super) fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let text = text.strip_prefix('+').unwrap_or(text);
    if text.contains(['E', 'e']) {
        Decimal::from_scientific(text).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}

pub(super) fn format(value: Decimal, previous_fraction: Option<u32>, preserve: bool) -> String {
    let normalized = value.normalize();
    match previous_fraction {
        Some(digits) if preserve && digits > normalized.scale() => {
            let mut widened = normalized;
            widened.rescale(digits);
            widened.to_string()
        }
        _ => normalized.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DataElement, ElementKind, ElementSpec};
    use std::sync::Arc;

    fn real(preserve: bool) -> DataElement {
        DataElement::new(Arc::new(
            ElementSpec::new("MEA03", ElementKind::Real)
                .length(1, 20)
                .preserve_precision(preserve),
        ))
    }

    #[test]
    fn test_validate_forms() {
        assert!(validate("12.50").is_none());
        assert!(validate("-.5").is_none());
        assert!(validate("1E3").is_none());
        assert!(validate("12,5").is_some());
        assert!(validate("").is_some());
    }

    #[test]
    fn test_fraction_digits() {
        assert_eq!(fraction_digits("12.500"), 3);
        assert_eq!(fraction_digits("12"), 0);
        assert_eq!(fraction_digits("1.25E2"), 2);
    }

    #[test]
    fn test_length_counts_digits_only() {
        assert_eq!(digit_count("-12.50"), 4);
    }

    #[test]
    fn test_reformat_drops_trailing_zeros() {
        let mut el = real(false);
        el.set("12.500").unwrap();
        assert_eq!(el.get().as_deref(), Some("12.500"));
        assert_eq!(el.get_formatted().as_deref(), Some("12.5"));
    }

    #[test]
    fn test_reformat_preserves_precision() {
        let mut el = real(true);
        el.set("12.500").unwrap();
        assert_eq!(el.get_formatted().as_deref(), Some("12.500"));
        el.set_decimal(Decimal::new(75, 1)).unwrap();
        assert_eq!(el.get().as_deref(), Some("7.500"));
    }
}
