#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-ir
//!
//! Shared vocabulary for template-driven EDI processing.
//!
//! This crate holds the pieces every other crate agrees on: the closed
//! container ontology and its containment table, ordering keys, arena
//! handles, positioned error records, code lists and the typed data element
//! value model (character, coded, implied-decimal numeric, date, time, real
//! and binary fields, plus composites).

/// Code list abstraction used by coded (ID) elements.
pub mod codelist;
/// Container kinds, ranks and the containment table.
pub mod container;
/// Typed element values and composites.
pub mod element;
/// Positioned error records shared by the parser and validator.
pub mod errors;
/// Arena handles for template and runtime trees.
pub mod handle;
/// Ordering key over (kind, id).
pub mod key;
/// Source positions.
pub mod metadata;
/// Repeat limits.
pub mod occurs;

pub use codelist::{CodeList, FileCodeList, FnCodeList, InMemoryCodeList};
pub use container::{ContainerType, containment_allowed, rank};
pub use element::{
    CompositeElement, CompositeSpec, DataElement, ElementCheck, ElementContext, ElementKind,
    ElementSpec, Field,
};
pub use errors::{DocumentError, DocumentErrors, ErrorCode, Offender, Severity};
pub use handle::{ContainerId, TemplateId};
pub use key::ContainerKey;
pub use metadata::Position;
pub use occurs::Occurs;

use thiserror::Error;

/// Errors raised by the value model and ontology checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{parent} may not contain {child}")]
    IllegalContainment {
        parent: ContainerType,
        child: ContainerType,
    },

    #[error("'{id}' already holds {limit} instance(s), the maximum allowed")]
    OccursExceeded { id: String, limit: usize },

    #[error("Invalid value for '{id}': {message}")]
    InvalidValue { id: String, message: String },

    #[error("Numeric '{id}' uses an implied decimal; call set_formatted for '{value}'")]
    ExplicitDecimalPoint { id: String, value: String },

    #[error("'{id}' has no component at position {position}")]
    NoSuchComponent { id: String, position: usize },

    #[error("Code list error in {source_name}: {message}")]
    CodeList {
        source_name: String,
        message: String,
    },
}

impl Error {
    /// Build an invalid-value error for the named element.
    pub fn invalid_value(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Build an occurs-exceeded error for the named slot.
    pub fn occurs_exceeded(id: impl Into<String>, limit: usize) -> Self {
        Self::OccursExceeded {
            id: id.into(),
            limit,
        }
    }

    /// Build a code list loading error.
    pub fn code_list(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CodeList {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
