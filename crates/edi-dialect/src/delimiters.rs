//! Delimiter sets
//!
//! The same struct describes delimiters discovered on input and the set a
//! writer renders with.

use serde::{Deserialize, Serialize};

/// Default EDIFACT service characters (when no UNA is present)
pub const EDIFACT_COMPONENT: char = ':';
pub const EDIFACT_FIELD: char = '+';
pub const EDIFACT_DECIMAL: char = '.';
pub const EDIFACT_RELEASE: char = '?';
pub const EDIFACT_SEGMENT: char = '\'';

/// Delimiter characters of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Segment terminator
    pub segment: char,
    /// Field (data element) separator
    pub field: char,
    /// Component (group) separator
    pub component: char,
    /// Repetition separator
    #[serde(default)]
    pub repeat: Option<char>,
    /// Release (escape) character
    #[serde(default)]
    pub release: Option<char>,
    /// Separator between segment tag and first field (TRADACOMS `=`)
    #[serde(default)]
    pub tag: Option<char>,
    /// Decimal mark
    #[serde(default = "default_decimal")]
    pub decimal: char,
}

fn default_decimal() -> char {
    EDIFACT_DECIMAL
}

impl Delimiters {
    /// Common X12 choice: `~` `*` `:` `^`, no release character
    #[must_use]
    pub fn x12() -> Self {
        Self {
            segment: '~',
            field: '*',
            component: ':',
            repeat: Some('^'),
            release: None,
            tag: None,
            decimal: '.',
        }
    }

    /// EDIFACT defaults; no repetition separator without a UNA
    #[must_use]
    pub fn edifact() -> Self {
        Self {
            segment: EDIFACT_SEGMENT,
            field: EDIFACT_FIELD,
            component: EDIFACT_COMPONENT,
            repeat: None,
            release: Some(EDIFACT_RELEASE),
            tag: None,
            decimal: EDIFACT_DECIMAL,
        }
    }

    /// TRADACOMS: EDIFACT service characters plus `=` after the tag
    #[must_use]
    pub fn tradacoms() -> Self {
        Self {
            tag: Some('='),
            ..Self::edifact()
        }
    }

    /// Parse a 9-character UNA service string advice
    ///
    /// Positions: 3 component, 4 field, 5 decimal, 6 release, 7 repetition
    /// (space when unused), 8 segment terminator.
    #[must_use]
    pub fn from_una(una: &str) -> Option<Self> {
        let chars: Vec<char> = una.chars().take(9).collect();
        if chars.len() < 9 || !una.starts_with("UNA") {
            return None;
        }
        let optional = |c: char| (c != ' ').then_some(c);
        Some(Self {
            component: chars[3],
            field: chars[4],
            decimal: chars[5],
            release: optional(chars[6]),
            repeat: optional(chars[7]),
            segment: chars[8],
            tag: None,
        })
    }

    /// Render as a UNA service string advice
    #[must_use]
    pub fn to_una(&self) -> String {
        let mut una = String::with_capacity(9);
        una.push_str("UNA");
        una.push(self.component);
        una.push(self.field);
        una.push(self.decimal);
        una.push(self.release.unwrap_or(' '));
        una.push(self.repeat.unwrap_or(' '));
        una.push(self.segment);
        una
    }

    /// Whether `c` is one of the structural delimiters
    #[must_use]
    pub fn is_special(&self, c: char) -> bool {
        c == self.segment
            || c == self.field
            || c == self.component
            || Some(c) == self.repeat
            || Some(c) == self.release
            || Some(c) == self.tag
    }

    /// Characters that data must not contain unescaped
    #[must_use]
    pub fn specials(&self) -> Vec<char> {
        let mut out = vec![self.segment, self.field, self.component];
        out.extend(self.repeat);
        out.extend(self.release);
        out.extend(self.tag);
        out
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::edifact()
    }
}
