//! Time (TM) elements: HHMM, HHMMSS, HHMMSSd or HHMMSSdd

use super::ElementSpec;
use chrono::{NaiveTime, Timelike};

pub(super) fn parse(text: &str) -> Option<NaiveTime> {
    if !matches!(text.len(), 4 | 6 | 7 | 8) || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hour = text[..2].parse().ok()?;
    let minute = text[2..4].parse().ok()?;
    let second = if text.len() >= 6 { text[4..6].parse().ok()? } else { 0 };
    let millis = match text.len() {
        7 => text[6..7].parse::<u32>().ok()? * 100,
        8 => text[6..8].parse::<u32>().ok()? * 10,
        _ => 0,
    };
    NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
}

pub(super) fn validate(text: &str) -> Option<String> {
    if !matches!(text.len(), 4 | 6 | 7 | 8) {
        return Some(format!("time '{text}' must have 4, 6, 7 or 8 digits"));
    }
    match parse(text) {
        Some(_) => None,
        None => Some(format!("'{text}' is not a time of day")),
    }
}

pub(super) fn pad(spec: &ElementSpec, text: &str) -> String {
    let width = spec.min_length;
    if text.len() >= width || !text.chars().all(|c| c.is_ascii_digit()) {
        text.to_string()
    } else {
        format!("{text:0<width$}")
    }
}

pub(super) fn format(spec: &ElementSpec, time: NaiveTime) -> String {
    match spec.max_length {
        0..=5 => time.format("%H%M").to_string(),
        6 | 7 => time.format("%H%M%S").to_string(),
        _ => format!(
            "{}{:02}",
            time.format("%H%M%S"),
            time.nanosecond() / 10_000_000
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DataElement, ElementKind};
    use std::sync::Arc;

    #[test]
    fn test_forms() {
        assert_eq!(parse("1230"), NaiveTime::from_hms_opt(12, 30, 0));
        assert_eq!(parse("123045"), NaiveTime::from_hms_opt(12, 30, 45));
        assert_eq!(parse("1230455"), NaiveTime::from_hms_milli_opt(12, 30, 45, 500));
        assert_eq!(parse("12304512"), NaiveTime::from_hms_milli_opt(12, 30, 45, 120));
    }

    #[test]
    fn test_invalid_times() {
        assert!(validate("2400").is_some());
        assert!(validate("1260").is_some());
        assert!(validate("123").is_some());
        assert!(validate("123060").is_some());
        assert!(validate("0959").is_none());
    }

    #[test]
    fn test_get_zero_pads_to_min() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("DTM03", ElementKind::Time).length(6, 8),
        ));
        el.set("0930").unwrap();
        assert_eq!(el.get().as_deref(), Some("093000"));
    }

    #[test]
    fn test_set_time_follows_max_length() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("GS05", ElementKind::Time).length(4, 8),
        ));
        el.set_time(NaiveTime::from_hms_milli_opt(8, 5, 9, 250).unwrap())
            .unwrap();
        assert_eq!(el.get().as_deref(), Some("08050925"));
        assert_eq!(el.time(), NaiveTime::from_hms_milli_opt(8, 5, 9, 250));
    }
}
