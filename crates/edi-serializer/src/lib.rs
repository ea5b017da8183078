#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-serializer
//!
//! Writers that turn a runtime [`Document`] back into text.
//!
//! Delimited output is produced in two passes. The [`PrebuildWriter`]
//! renders every segment with private-use placeholder delimiters, so data
//! never has to be inspected while the tree is walked. The
//! [`Substitution`] pass then swaps placeholders for the real delimiters
//! and escapes data characters that collide with them. The pass can run
//! inline or as a [`SubstitutionPipe`]: a bounded channel drained by one
//! worker task.
//!
//! Presentation outputs (XML, validating XML and CSV) and the fixed-width
//! ACH writer walk the tree directly.

pub mod config;
pub mod edi;
pub mod fixed;
pub mod pipe;
pub mod prebuild;
pub mod substitute;
pub mod table;
pub mod xml;

pub use config::WriterConfig;
pub use edi::EdiWriter;
pub use fixed::FixedWidthWriter;
pub use pipe::SubstitutionPipe;
pub use prebuild::PrebuildWriter;
pub use substitute::Substitution;
pub use table::CsvWriter;
pub use xml::{ValidatingXmlWriter, XmlWriter};

use edi_dialect::Dialect;
use edi_ir::DocumentErrors;
use edi_parser::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while writing documents
#[derive(Error, Debug)]
pub enum Error {
    #[error("Segment {segment} (#{ordinal}) carries '{character}', a delimiter that cannot be escaped")]
    Collision {
        segment: String,
        ordinal: usize,
        character: char,
    },

    #[error("Segment {segment} (#{ordinal}) repeats a field but the delimiter set has no repetition separator")]
    NoRepeatSeparator { segment: String, ordinal: usize },

    #[error("Element {id} contains reserved character {character:?}")]
    PlaceholderInData { id: String, character: char },

    #[error("{0} output is not delimited")]
    NotDelimited(Dialect),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Substitution worker stopped: {0}")]
    Pipe(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Every output a document can be written as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    X12,
    Edifact,
    Tradacoms,
    Ach,
    Prebuild,
    Xml,
    ValidatingXml,
    Csv,
}

impl OutputFormat {
    /// Wire dialect of a delimited or fixed-width format
    #[must_use]
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            OutputFormat::X12 => Some(Dialect::X12),
            OutputFormat::Edifact => Some(Dialect::Edifact),
            OutputFormat::Tradacoms => Some(Dialect::Tradacoms),
            OutputFormat::Ach => Some(Dialect::Ach),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::X12 => "x12",
            OutputFormat::Edifact => "edifact",
            OutputFormat::Tradacoms => "tradacoms",
            OutputFormat::Ach => "ach",
            OutputFormat::Prebuild => "prebuild",
            OutputFormat::Xml => "xml",
            OutputFormat::ValidatingXml => "validating-xml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl From<Dialect> for OutputFormat {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::X12 => OutputFormat::X12,
            Dialect::Edifact => OutputFormat::Edifact,
            Dialect::Tradacoms => OutputFormat::Tradacoms,
            Dialect::Ach => OutputFormat::Ach,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x12" => Ok(OutputFormat::X12),
            "edifact" => Ok(OutputFormat::Edifact),
            "tradacoms" => Ok(OutputFormat::Tradacoms),
            "ach" | "nacha" => Ok(OutputFormat::Ach),
            "prebuild" => Ok(OutputFormat::Prebuild),
            "xml" => Ok(OutputFormat::Xml),
            "validating-xml" | "validating_xml" => Ok(OutputFormat::ValidatingXml),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

/// Write `doc` in `format`
///
/// `config` supplies delimiters and layout for the wire formats; its
/// dialect is replaced by the one `format` names. `errors` is only used
/// by validating XML.
///
/// # Errors
///
/// Fails when data collides with a delimiter that cannot be escaped, or
/// the underlying XML/CSV writers fail.
pub fn serialize(
    doc: &Document,
    format: OutputFormat,
    config: &WriterConfig,
    errors: &DocumentErrors,
) -> Result<String> {
    match format {
        OutputFormat::X12 | OutputFormat::Edifact | OutputFormat::Tradacoms => {
            let mut config = config.clone();
            if let Some(dialect) = format.dialect() {
                config.dialect = dialect;
            }
            EdiWriter::new(config).write(doc)
        }
        OutputFormat::Ach => FixedWidthWriter::new()
            .line_breaks(config.line_breaks)
            .write(doc),
        OutputFormat::Prebuild => {
            PrebuildWriter::new(config.dialect == Dialect::Tradacoms).write(doc)
        }
        OutputFormat::Xml => XmlWriter::new().write(doc),
        OutputFormat::ValidatingXml => ValidatingXmlWriter::new().write(doc, errors),
        OutputFormat::Csv => CsvWriter::new().write(doc),
    }
}
