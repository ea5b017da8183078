//! Date (DT) elements, YYMMDD or CCYYMMDD

use super::ElementSpec;
use chrono::{Datelike, NaiveDate};

/// Two-digit years at or above this are 19xx, below are 20xx
const CENTURY_WINDOW: i32 = 50;

fn expand_year(yy: i32) -> i32 {
    if yy >= CENTURY_WINDOW { 1900 + yy } else { 2000 + yy }
}

pub(super) fn parse(text: &str) -> Option<NaiveDate> {
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (year, rest) = match text.len() {
        6 => (expand_year(text[..2].parse().ok()?), &text[2..]),
        8 => (text[..4].parse().ok()?, &text[4..]),
        _ => return None,
    };
    let month = rest[..2].parse().ok()?;
    let day = rest[2..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub(super) fn validate(text: &str) -> Option<String> {
    if text.len() != 6 && text.len() != 8 {
        return Some(format!("date '{text}' must have 6 or 8 digits"));
    }
    match parse(text) {
        Some(_) => None,
        None => Some(format!("'{text}' is not a calendar date")),
    }
}

pub(super) fn pad(spec: &ElementSpec, text: &str) -> String {
    if spec.min_length >= 8 && text.len() == 6 {
        if let Some(date) = parse(text) {
            return format!("{:04}{}", date.year(), &text[2..]);
        }
    }
    text.to_string()
}

pub(super) fn format(spec: &ElementSpec, date: NaiveDate) -> String {
    if spec.max_length >= 8 {
        date.format("%Y%m%d").to_string()
    } else {
        date.format("%y%m%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DataElement, ElementKind};
    use crate::{DocumentErrors, ElementContext, ErrorCode};
    use std::sync::Arc;

    #[test]
    fn test_century_window() {
        assert_eq!(parse("490101"), NaiveDate::from_ymd_opt(2049, 1, 1));
        assert_eq!(parse("500101"), NaiveDate::from_ymd_opt(1950, 1, 1));
        assert_eq!(parse("20240229"), NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn test_impossible_dates() {
        assert!(validate("20240230").is_some());
        assert!(validate("230229").is_some());
        assert!(validate("2024013").is_some());
        assert!(validate("2024AB01").is_some());
    }

    #[test]
    fn test_feb_30_reported() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("DTM02", ElementKind::Date).length(8, 8),
        ));
        el.set("20230230").unwrap();
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::InvalidDate);
    }

    #[test]
    fn test_short_form_expands_for_long_min() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("BEG05", ElementKind::Date).length(8, 8),
        ));
        el.set("991231").unwrap();
        assert_eq!(el.get().as_deref(), Some("19991231"));
        assert_eq!(el.date(), NaiveDate::from_ymd_opt(1999, 12, 31));
    }

    #[test]
    fn test_set_date_uses_max_length() {
        let mut short = DataElement::new(Arc::new(
            ElementSpec::new("ISA09", ElementKind::Date).length(6, 6),
        ));
        short
            .set_date(NaiveDate::from_ymd_opt(2003, 7, 4).unwrap())
            .unwrap();
        assert_eq!(short.get().as_deref(), Some("030704"));
    }
}
