//! Writer configuration

use edi_dialect::{Delimiters, Dialect};
use serde::{Deserialize, Serialize};

/// How delimited output is laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Target syntax
    pub dialect: Dialect,

    /// Delimiters to write with instead of the dialect's defaults
    pub delimiters: Option<Delimiters>,

    /// Newline after every segment terminator
    pub line_breaks: bool,

    /// Prefix EDIFACT output with a UNA service string advice
    pub emit_una: bool,

    /// Capacity of the substitution pipe's channel, in segments
    pub pipe_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::X12,
            delimiters: None,
            line_breaks: false,
            emit_una: false,
            pipe_capacity: 64,
        }
    }
}

impl WriterConfig {
    /// Defaults for `dialect`
    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = Some(delimiters);
        self
    }

    #[must_use]
    pub fn with_line_breaks(mut self, line_breaks: bool) -> Self {
        self.line_breaks = line_breaks;
        self
    }

    #[must_use]
    pub fn with_una(mut self, emit_una: bool) -> Self {
        self.emit_una = emit_una;
        self
    }

    /// Delimiters the output will use
    ///
    /// An override keeps the dialect's tag separator rule: TRADACOMS always
    /// separates the tag with `=`, the others never do.
    #[must_use]
    pub fn resolved_delimiters(&self) -> Delimiters {
        let base = match self.dialect {
            Dialect::Edifact => Delimiters::edifact(),
            Dialect::Tradacoms => Delimiters::tradacoms(),
            Dialect::X12 | Dialect::Ach => Delimiters::x12(),
        };
        match self.delimiters {
            Some(mut custom) => {
                custom.tag = base.tag.and(custom.tag.or(base.tag));
                custom
            }
            None => base,
        }
    }
}
