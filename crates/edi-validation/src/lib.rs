#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-validation
//!
//! Semantic validation of parsed documents against their template.
//!
//! The engine walks a [`Document`](edi_parser::Document) and checks, per
//! container level, that required children are present, that every stored
//! element is valid for its type, that the cross-field rules of segments
//! and composites hold, and that control levels agree with their
//! header/trailer linkage (control numbers and counts).
//!
//! Every check comes in a collecting form that appends to a
//! [`DocumentErrors`] list and a throwing form that returns
//! [`Error::Invalid`].
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_validation::{ValidationEngine, ValidationReporter};
//! use edi_ir::{ContainerType, ElementKind, ElementSpec};
//! use edi_parser::Document;
//! use edi_schema::NodeSpec;
//! use std::sync::Arc;
//!
//! let tree = NodeSpec::envelope("DEMO")
//!     .child(NodeSpec::segment("HDR").required().field(ElementSpec::new("HDR01", ElementKind::Char)))
//!     .build("demo")
//!     .unwrap();
//! let mut doc = Document::new(Arc::new(tree));
//! let root = doc.root();
//! let hdr = doc.append(root, ContainerType::Segment, "HDR").unwrap();
//! doc.set_value(hdr, 1, "X").unwrap();
//!
//! let result = ValidationEngine::new().check(&doc);
//! assert!(result.is_valid);
//! println!("{}", ValidationReporter::new().text(&result.errors));
//! ```

pub mod engine;
pub mod reporter;
pub mod rules;

pub use engine::{StrictnessLevel, ValidationConfig, ValidationEngine, ValidationResult};
pub use reporter::{ReportFormat, Summary, ValidationReporter};
pub use rules::{CompositeFields, RuleSite, SegmentFields, test_rules};

use edi_ir::DocumentErrors;
use edi_parser::Document;
use thiserror::Error;

/// Errors raised by the throwing validation forms
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed with {count} error(s), first: {first}")]
    Invalid {
        count: usize,
        first: String,
        errors: Box<DocumentErrors>,
    },

    #[error("Rule {rule} failed on {id}: {message}")]
    Rule {
        rule: String,
        id: String,
        message: String,
    },

    #[error("Unknown report format '{0}', expected text or json")]
    UnknownFormat(String),

    #[error("Report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a non-empty error list
    pub(crate) fn invalid(errors: DocumentErrors) -> Self {
        let first = errors
            .iter()
            .next()
            .map(ToString::to_string)
            .unwrap_or_default();
        Self::Invalid {
            count: errors.len(),
            first,
            errors: Box::new(errors),
        }
    }

    /// The collected records behind an [`Error::Invalid`]
    #[must_use]
    pub fn errors(&self) -> Option<&DocumentErrors> {
        match self {
            Error::Invalid { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Validate a whole document with default settings
///
/// # Errors
///
/// Returns [`Error::Invalid`] when any check fails.
pub fn validate(doc: &Document) -> Result<()> {
    ValidationEngine::new().validate(doc)
}

/// Append every problem found in `doc` to `errors`
pub fn validate_into(doc: &Document, errors: &mut DocumentErrors) {
    ValidationEngine::new().validate_into(doc, errors);
}
