//! Char (AN) and Id (ID) elements

use super::ElementSpec;

pub(super) fn pad(spec: &ElementSpec, value: &str) -> String {
    let width = spec.min_length;
    if value.chars().count() >= width {
        value.to_string()
    } else {
        format!("{value:<width$}")
    }
}

pub(super) fn validate_char(text: &str) -> Option<String> {
    text.chars()
        .find(|c| c.is_control())
        .map(|c| format!("invalid character U+{:04X}", u32::from(c)))
}

pub(super) fn validate_id(spec: &ElementSpec, text: &str) -> Option<String> {
    if let Some(message) = validate_char(text) {
        return Some(message);
    }
    let list = spec.code_list.as_ref()?;
    let code = text.trim_end();
    if list.is_valid(code) {
        None
    } else {
        Some(format!("'{code}' is not in code list {}", list.name()))
    }
}
