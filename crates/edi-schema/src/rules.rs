//! Cross-field rules over the positions of a segment or composite
//!
//! Rules are stored on Segment and CompositeElement template nodes and
//! evaluated by the validation engine against the runtime fields.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six rule kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// 1: at least one of the positions must be present
    OneOrMore,
    /// 2: if the first is present, all others must be
    IfFirstThenAll,
    /// 3: no more than one may be present
    OnlyOne,
    /// 4: if the first is present, at least one other must be
    IfFirstThenOneMore,
    /// 5: all present or none
    AllOrNone,
    /// 6: if the first is present, none of the others may be
    IfFirstThenNone,
}

impl RuleKind {
    /// Rule number, 1 to 6
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            RuleKind::OneOrMore => 1,
            RuleKind::IfFirstThenAll => 2,
            RuleKind::OnlyOne => 3,
            RuleKind::IfFirstThenOneMore => 4,
            RuleKind::AllOrNone => 5,
            RuleKind::IfFirstThenNone => 6,
        }
    }

    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(RuleKind::OneOrMore),
            2 => Some(RuleKind::IfFirstThenAll),
            3 => Some(RuleKind::OnlyOne),
            4 => Some(RuleKind::IfFirstThenOneMore),
            5 => Some(RuleKind::AllOrNone),
            6 => Some(RuleKind::IfFirstThenNone),
            _ => None,
        }
    }

    /// X12 syntax note letter (kind 6 has none)
    #[must_use]
    pub fn syntax_letter(self) -> Option<char> {
        match self {
            RuleKind::OneOrMore => Some('R'),
            RuleKind::IfFirstThenAll => Some('C'),
            RuleKind::OnlyOne => Some('E'),
            RuleKind::IfFirstThenOneMore => Some('L'),
            RuleKind::AllOrNone => Some('P'),
            RuleKind::IfFirstThenNone => None,
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'R' => Some(RuleKind::OneOrMore),
            'C' => Some(RuleKind::IfFirstThenAll),
            'E' => Some(RuleKind::OnlyOne),
            'L' => Some(RuleKind::IfFirstThenOneMore),
            'P' => Some(RuleKind::AllOrNone),
            _ => None,
        }
    }
}

/// What a rule needs to know about the fields it checks
pub trait FieldPresence {
    /// Whether the field at 1-based `position` has content
    fn has_content(&self, position: usize) -> bool;

    /// Display name of the field at `position`
    fn field_name(&self, position: usize) -> String;
}

/// One rule: a kind plus an ordered position list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRule {
    pub kind: RuleKind,
    pub positions: Vec<usize>,
}

impl ElementRule {
    /// Create a rule over 1-based field positions
    ///
    /// # Errors
    ///
    /// Positions must be non-zero and there must be at least two.
    pub fn new(kind: RuleKind, positions: Vec<usize>) -> Result<Self> {
        let rule = Self { kind, positions };
        if rule.positions.len() < 2 {
            return Err(Error::invalid_rule(
                rule.to_string(),
                "a rule needs at least two positions",
            ));
        }
        if rule.positions.contains(&0) {
            return Err(Error::invalid_rule(rule.to_string(), "positions are 1-based"));
        }
        Ok(rule)
    }

    /// Parse X12 syntax-note notation such as `P0102` or `L010203`
    ///
    /// # Errors
    ///
    /// Fails for an unknown letter or positions that are not two-digit pairs.
    pub fn from_syntax_note(note: &str) -> Result<Self> {
        let note = note.trim();
        let mut chars = note.chars();
        let letter = chars
            .next()
            .ok_or_else(|| Error::invalid_rule(note, "empty syntax note"))?;
        let kind = RuleKind::from_letter(letter)
            .ok_or_else(|| Error::invalid_rule(note, format!("unknown rule letter '{letter}'")))?;
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_rule(
                note,
                "positions must be two-digit pairs",
            ));
        }
        let positions = digits
            .as_bytes()
            .chunks(2)
            .map(|pair| usize::from(pair[0] - b'0') * 10 + usize::from(pair[1] - b'0'))
            .collect();
        Self::new(kind, positions)
    }

    /// Check the rule; `None` means satisfied
    #[must_use]
    pub fn evaluate(&self, fields: &dyn FieldPresence) -> Option<String> {
        let Some((&first, rest)) = self.positions.split_first() else {
            return None;
        };
        let present: Vec<usize> = self
            .positions
            .iter()
            .copied()
            .filter(|p| fields.has_content(*p))
            .collect();
        let names = |positions: &[usize]| {
            positions
                .iter()
                .map(|p| fields.field_name(*p))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let first_present = fields.has_content(first);

        match self.kind {
            RuleKind::OneOrMore if present.is_empty() => Some(format!(
                "At least one of {} is required",
                names(&self.positions)
            )),
            RuleKind::IfFirstThenAll if first_present => {
                let missing: Vec<usize> = rest
                    .iter()
                    .copied()
                    .filter(|p| !fields.has_content(*p))
                    .collect();
                (!missing.is_empty()).then(|| {
                    format!(
                        "{} is present, so {} must also be present",
                        fields.field_name(first),
                        names(&missing)
                    )
                })
            }
            RuleKind::OnlyOne if present.len() > 1 => Some(format!(
                "Only one of {} may be present, found {}",
                names(&self.positions),
                names(&present)
            )),
            RuleKind::IfFirstThenOneMore if first_present && present.len() < 2 => Some(format!(
                "{} is present, so at least one of {} must be present",
                fields.field_name(first),
                names(rest)
            )),
            RuleKind::AllOrNone if !present.is_empty() && present.len() < self.positions.len() => {
                Some(format!(
                    "{} must be present together or not at all, found only {}",
                    names(&self.positions),
                    names(&present)
                ))
            }
            RuleKind::IfFirstThenNone if first_present && present.len() > 1 => Some(format!(
                "{} is present, so {} may not be",
                fields.field_name(first),
                names(&present[1..])
            )),
            _ => None,
        }
    }
}

impl fmt::Display for ElementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.syntax_letter() {
            Some(letter) => {
                write!(f, "{letter}")?;
                for p in &self.positions {
                    write!(f, "{p:02}")?;
                }
                Ok(())
            }
            None => {
                let list: Vec<String> = self.positions.iter().map(ToString::to_string).collect();
                write!(f, "{}:{}", self.kind.number(), list.join(","))
            }
        }
    }
}

impl FromStr for ElementRule {
    type Err = Error;

    /// Accepts a syntax note (`E0102`) or `kind:positions` (`6:1,2,3`)
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((kind, positions)) => {
                let kind = kind
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .and_then(RuleKind::from_number)
                    .ok_or_else(|| Error::invalid_rule(s, "rule kind must be 1 to 6"))?;
                let positions = positions
                    .split(',')
                    .map(|p| {
                        p.trim()
                            .parse::<usize>()
                            .map_err(|_| Error::invalid_rule(s, format!("bad position '{p}'")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Self::new(kind, positions)
            }
            None => Self::from_syntax_note(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fields(Vec<&'static str>);

    impl FieldPresence for Fields {
        fn has_content(&self, position: usize) -> bool {
            self.0.get(position - 1).is_some_and(|v| !v.is_empty())
        }

        fn field_name(&self, position: usize) -> String {
            format!("N1{position:02}")
        }
    }

    #[test]
    fn test_syntax_note_parsing() {
        let rule = ElementRule::from_syntax_note("P0304").unwrap();
        assert_eq!(rule.kind, RuleKind::AllOrNone);
        assert_eq!(rule.positions, vec![3, 4]);
        assert_eq!(rule.to_string(), "P0304");
        assert!(ElementRule::from_syntax_note("Q0102").is_err());
        assert!(ElementRule::from_syntax_note("P012").is_err());
        assert!(ElementRule::from_syntax_note("P01").is_err());
    }

    #[test]
    fn test_kind_six_notation() {
        let rule: ElementRule = "6:1,2,3".parse().unwrap();
        assert_eq!(rule.kind, RuleKind::IfFirstThenNone);
        assert_eq!(rule.to_string(), "6:1,2,3");
        let note: ElementRule = "L010203".parse().unwrap();
        assert_eq!(note.kind, RuleKind::IfFirstThenOneMore);
    }

    #[test]
    fn test_one_or_more() {
        let rule = ElementRule::new(RuleKind::OneOrMore, vec![2, 3]).unwrap();
        assert!(rule.evaluate(&Fields(vec!["A", "", ""])).is_some());
        assert!(rule.evaluate(&Fields(vec!["A", "", "C"])).is_none());
    }

    #[test]
    fn test_if_first_then_all() {
        let rule = ElementRule::new(RuleKind::IfFirstThenAll, vec![1, 2, 3]).unwrap();
        assert!(rule.evaluate(&Fields(vec!["", "B", ""])).is_none());
        let message = rule.evaluate(&Fields(vec!["A", "B", ""])).unwrap();
        assert!(message.contains("N103"));
        assert!(!message.contains("N102,"));
    }

    #[test]
    fn test_only_one_names_populated_fields() {
        let rule = ElementRule::new(RuleKind::OnlyOne, vec![1, 2, 3]).unwrap();
        let message = rule.evaluate(&Fields(vec!["A", "", "C"])).unwrap();
        assert!(message.ends_with("found N101, N103"));
        assert!(rule.evaluate(&Fields(vec!["", "", "C"])).is_none());
        assert!(rule.evaluate(&Fields(vec!["", "", ""])).is_none());
    }

    #[test]
    fn test_if_first_then_one_more() {
        let rule = ElementRule::new(RuleKind::IfFirstThenOneMore, vec![1, 2, 3]).unwrap();
        assert!(rule.evaluate(&Fields(vec!["A", "", ""])).is_some());
        assert!(rule.evaluate(&Fields(vec!["A", "", "C"])).is_none());
        assert!(rule.evaluate(&Fields(vec!["", "", ""])).is_none());
    }

    #[test]
    fn test_all_or_none() {
        let rule = ElementRule::new(RuleKind::AllOrNone, vec![3, 4]).unwrap();
        assert!(rule.evaluate(&Fields(vec!["A", "B", "C", "D"])).is_none());
        assert!(rule.evaluate(&Fields(vec!["A", "B", "", ""])).is_none());
        assert!(rule.evaluate(&Fields(vec!["A", "B", "C", ""])).is_some());
    }

    #[test]
    fn test_if_first_then_none() {
        let rule = ElementRule::new(RuleKind::IfFirstThenNone, vec![1, 2, 3]).unwrap();
        assert!(rule.evaluate(&Fields(vec!["A", "", ""])).is_none());
        assert!(rule.evaluate(&Fields(vec!["", "B", "C"])).is_none());
        let message = rule.evaluate(&Fields(vec!["A", "B", ""])).unwrap();
        assert!(message.contains("N102"));
    }

    #[test]
    fn test_rule_needs_two_positions() {
        assert!(ElementRule::new(RuleKind::OnlyOne, vec![1]).is_err());
        assert!(ElementRule::new(RuleKind::OnlyOne, vec![0, 1]).is_err());
    }
}
