#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-schema
//!
//! Immutable message templates for the EDI engine.
//!
//! A [`TemplateTree`] is an arena of [`TemplateNode`]s built once (from the
//! [`NodeSpec`] builder or a YAML/JSON template file) and then shared
//! read-only between parses through `Arc`. The tree is checked against the
//! container ontology while it is built, and schema callbacks named in
//! the template are resolved from a [`CallbackRegistry`] at that point.

pub mod builder;
pub mod callbacks;
pub mod control;
pub mod loader;
pub mod registry;
pub mod rules;
pub mod template;

pub use builder::NodeSpec;
pub use callbacks::CallbackRegistry;
pub use control::{ControlLink, CountKind};
pub use loader::TemplateLoader;
pub use registry::TemplateRegistry;
pub use rules::{ElementRule, RuleKind};
pub use template::{ElementOptions, FieldSlot, FieldSpec, Prevalidation, TemplateNode, TemplateTree};

use edi_ir::ContainerType;
use thiserror::Error;

/// Errors that can occur when building or loading templates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template format: {0}")]
    InvalidFormat(String),

    #[error("'{id}': {parent} may not contain {child}")]
    IllegalContainment {
        id: String,
        parent: ContainerType,
        child: ContainerType,
    },

    #[error("Template root must be an envelope, found {0}")]
    InvalidRoot(ContainerType),

    #[error("Unknown validation callback '{0}'")]
    UnknownCallback(String),

    #[error("Invalid rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Invalid control link on '{id}': {message}")]
    InvalidControl { id: String, message: String },

    #[error(transparent)]
    Ir(#[from] edi_ir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn invalid_control(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidControl {
            id: id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
