#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-parser
//!
//! Builds runtime document trees by matching a tokenizer's segments
//! against a shared, immutable template tree.
//!
//! Parsing never stops at an unknown segment: the problem is recorded,
//! the segment skipped, and matching resumes from the last container that
//! consumed input. [`ErrorPolicy`] decides whether the recorded errors come
//! back as `Err` or stay in the [`ParseOutcome`] for inspection.

pub mod config;
pub mod document;
mod fields;
pub mod parser;

pub use config::{ErrorPolicy, ParserConfig};
pub use document::{Container, Document};
pub use parser::{ParseOutcome, ParseState, Parser};

use edi_ir::DocumentErrors;
use thiserror::Error;

/// Errors raised while parsing or building documents
#[derive(Error, Debug)]
pub enum Error {
    #[error("Dialect error: {0}")]
    Dialect(#[from] edi_dialect::Error),

    #[error("Value error: {0}")]
    Ir(#[from] edi_ir::Error),

    #[error("Could not detect the dialect of the input")]
    UndetectedDialect,

    #[error("No template slot under {parent} holds {id}")]
    NoSlot { parent: String, id: String },

    #[error("Segment {segment} declares no field {position}")]
    NoSuchField { segment: String, position: usize },

    #[error("{count} error(s) recorded while parsing; first: {first}")]
    Rejected {
        count: usize,
        first: String,
        errors: Box<DocumentErrors>,
    },
}

impl Error {
    /// Records carried by a rejected parse
    #[must_use]
    pub fn errors(&self) -> Option<&DocumentErrors> {
        match self {
            Error::Rejected { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Crate-local result type
pub type Result<T> = std::result::Result<T, Error>;
