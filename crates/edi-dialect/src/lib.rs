#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-dialect
//!
//! Lexical layer of the EDI engine.
//!
//! Each supported syntax declares its delimiters in its first segment. The
//! tokenizers here discover them, then hand the parser one segment at a
//! time as an id plus a list of [`FieldToken`]s. ACH has no delimiters; its
//! tokenizer probes the record type through a push-back reader and cuts
//! fields by width.

pub mod ach;
pub mod decode;
pub mod delimiters;
pub mod edifact;
pub mod pushback;
pub mod scanner;
pub mod token;
pub mod tokenizer;
pub mod tradacoms;
pub mod x12;

pub use ach::AchTokenizer;
pub use delimiters::Delimiters;
pub use edifact::EdifactTokenizer;
pub use token::FieldToken;
pub use tokenizer::Tokenizer;
pub use tradacoms::TradacomsTokenizer;
pub use x12::X12Tokenizer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while discovering delimiters
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed {dialect} header at byte {offset}: {message}")]
    MalformedHeader {
        dialect: Dialect,
        offset: usize,
        message: String,
    },

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn malformed(dialect: Dialect, offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            dialect,
            offset,
            message: message.into(),
        }
    }

    /// Move a header offset `by` bytes further into the input
    #[must_use]
    pub fn shifted(self, by: usize) -> Self {
        match self {
            Self::MalformedHeader {
                dialect,
                offset,
                message,
            } => Self::MalformedHeader {
                dialect,
                offset: offset + by,
                message,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Supported wire syntaxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    X12,
    Edifact,
    Tradacoms,
    Ach,
}

impl Dialect {
    /// Guess the dialect from the first bytes of a document
    #[must_use]
    pub fn detect(input: &[u8]) -> Option<Self> {
        let start = input.iter().position(|b| !b.is_ascii_whitespace())?;
        let head = &input[start..];
        if head.starts_with(b"ISA") {
            Some(Dialect::X12)
        } else if head.starts_with(b"STX=") {
            Some(Dialect::Tradacoms)
        } else if head.starts_with(b"UNA") || head.starts_with(b"UNB") {
            Some(Dialect::Edifact)
        } else if head.first() == Some(&b'1') && head.len() >= ach::RECORD_LENGTH {
            Some(Dialect::Ach)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::X12 => "x12",
            Dialect::Edifact => "edifact",
            Dialect::Tradacoms => "tradacoms",
            Dialect::Ach => "ach",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x12" | "ansi" => Ok(Dialect::X12),
            "edifact" | "un/edifact" => Ok(Dialect::Edifact),
            "tradacoms" => Ok(Dialect::Tradacoms),
            "ach" | "nacha" => Ok(Dialect::Ach),
            other => Err(Error::UnknownDialect(other.to_string())),
        }
    }
}

/// Open a tokenizer for `dialect` over `input`
///
/// # Errors
///
/// Fails when the leading control segment is malformed.
pub fn tokenizer_for(dialect: Dialect, input: &[u8]) -> Result<Box<dyn Tokenizer>> {
    let tokenizer: Box<dyn Tokenizer> = match dialect {
        Dialect::X12 => Box::new(X12Tokenizer::new(input)?),
        Dialect::Edifact => Box::new(EdifactTokenizer::new(input)?),
        Dialect::Tradacoms => Box::new(TradacomsTokenizer::new(input)?),
        Dialect::Ach => Box::new(AchTokenizer::from_bytes(input.to_vec())),
    };
    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Dialect::detect(b"ISA*00*"), Some(Dialect::X12));
        assert_eq!(Dialect::detect(b"\r\nUNA:+.? 'UNB"), Some(Dialect::Edifact));
        assert_eq!(Dialect::detect(b"UNB+UNOC:3"), Some(Dialect::Edifact));
        assert_eq!(Dialect::detect(b"STX=ANA:1"), Some(Dialect::Tradacoms));
        assert_eq!(Dialect::detect(b"hello"), None);
        assert_eq!(Dialect::detect(b""), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("X12".parse::<Dialect>().unwrap(), Dialect::X12);
        assert_eq!("nacha".parse::<Dialect>().unwrap(), Dialect::Ach);
        assert!("hl7".parse::<Dialect>().is_err());
    }
}
