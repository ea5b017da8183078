//! Implied-decimal numeric (Nn) elements
//!
//! The stored text is an optional minus sign followed by digits. The
//! decimal point is implied by the type's fraction digit count.

use super::ElementSpec;
use crate::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};

pub(super) fn store(spec: &ElementSpec, text: &str) -> Result<String> {
    if text.contains('.') {
        return Err(Error::ExplicitDecimalPoint {
            id: spec.id.clone(),
            value: text.to_string(),
        });
    }
    Ok(text.strip_prefix('+').unwrap_or(text).to_string())
}

/// Stored form of a value written through `set`: right-aligned and zero
/// filled to the maximum length, sign excluded from the digit count
pub(super) fn normalize(spec: &ElementSpec, text: &str) -> Result<String> {
    let stored = store(spec, text)?;
    if split_sign(&stored).1.is_empty() {
        return Ok(stored);
    }
    Ok(right_align(&stored, spec.max_length))
}

fn split_sign(text: &str) -> (&str, &str) {
    match text.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", text),
    }
}

pub(super) fn pad(spec: &ElementSpec, text: &str) -> String {
    let (sign, digits) = split_sign(text);
    let width = spec.min_length;
    if digits.len() >= width {
        text.to_string()
    } else {
        format!("{sign}{digits:0>width$}")
    }
}

pub(super) fn right_align(text: &str, width: usize) -> String {
    let (sign, digits) = split_sign(text);
    let width = width.saturating_sub(sign.len());
    format!("{sign}{digits:0>width$}")
}

pub(super) fn digit_count(text: &str) -> usize {
    split_sign(text).1.len()
}

pub(super) fn validate(text: &str) -> Option<String> {
    let (_, digits) = split_sign(text);
    if digits.is_empty() {
        return Some("numeric value has no digits".to_string());
    }
    digits
        .chars()
        .find(|c| !c.is_ascii_digit())
        .map(|c| format!("invalid character '{c}' in numeric value"))
}

pub(super) fn to_decimal(text: &str, decimals: u8) -> Option<Decimal> {
    let mantissa: i128 = text.parse().ok()?;
    Decimal::try_from_i128_with_scale(mantissa, u32::from(decimals)).ok()
}

pub(super) fn from_decimal(spec: &ElementSpec, value: Decimal, decimals: u8) -> Result<String> {
    let mut scaled =
        value.round_dp_with_strategy(u32::from(decimals), RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(u32::from(decimals));
    if scaled.scale() != u32::from(decimals) {
        return Err(Error::invalid_value(
            &spec.id,
            format!("{value} cannot be held with {decimals} implied decimals"),
        ));
    }
    Ok(scaled.mantissa().to_string())
}
