//! Positioned error records
//!
//! Parsing and validation never stop at the first problem. Every discrepancy
//! becomes a [`DocumentError`] appended to a shared [`DocumentErrors`] list
//! which the caller inspects (or turns into a failure) afterwards.

use crate::handle::ContainerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Illegal containment, occurs exceeded, unknown token, bad dialect header
    Structural,
    /// Missing required content, bad length, header/trailer mismatch
    Integrity,
    /// Content present but semantically invalid
    Requirement,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Structural => "structural",
            Severity::Integrity => "integrity",
            Severity::Requirement => "requirement",
        })
    }
}

/// Short numeric category code
///
/// Segment codes (1-8) and element codes (101-113, i.e. 100 + code) follow
/// the X12 997/999 syntax error code sets; 2xx codes cover envelope checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    UnrecognizedSegment = 1,
    UnexpectedSegment = 2,
    MandatorySegmentMissing = 3,
    LoopOverMaximum = 4,
    SegmentOverMaximum = 5,
    SegmentNotInTransaction = 6,
    SegmentOutOfSequence = 7,
    SegmentHasElementErrors = 8,

    MandatoryElementMissing = 101,
    ConditionalElementMissing = 102,
    TooManyElements = 103,
    ElementTooShort = 104,
    ElementTooLong = 105,
    InvalidCharacter = 106,
    InvalidCodeValue = 107,
    InvalidDate = 108,
    InvalidTime = 109,
    ExclusionViolated = 110,
    UnusedElementPresent = 111,
    TooManyRepetitions = 112,
    TooManyComponents = 113,
    CustomCheckFailed = 120,

    ControlNumberMismatch = 201,
    CountMismatch = 202,
    MissingHeader = 203,
    MissingTrailer = 204,
    IllegalContainment = 205,
    MalformedHeader = 206,
    TrailingData = 207,
}

impl ErrorCode {
    /// Numeric value
    #[must_use]
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Code as it would appear in an AK304/AK403 acknowledgment element
    #[must_use]
    pub const fn acknowledgment_code(self) -> u16 {
        let value = self as u16;
        if value > 100 && value < 200 {
            value - 100
        } else {
            value
        }
    }
}

/// What a record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Offender {
    /// A runtime container (segment, loop, ...)
    Container(ContainerId),
    /// A field of a segment; `field` is 1-based, `component` 1-based when set
    Element {
        segment: ContainerId,
        field: usize,
        component: Option<usize>,
        occurrence: usize,
    },
    /// A raw input token that never made it into the tree
    Token { offset: usize },
}

/// One positioned error record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentError {
    /// Sequence position (segment ordinal, or field position for elements)
    pub position: usize,

    /// Segment or element id
    pub id: String,

    /// Human-readable message
    pub message: String,

    /// Container that owns the offending object
    pub container: Option<ContainerId>,

    /// Category code
    pub code: ErrorCode,

    /// Offending object
    pub offender: Option<Offender>,

    /// Second object involved, e.g. the header paired with a trailer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Offender>,

    /// Severity class
    pub severity: Severity,
}

impl DocumentError {
    /// Create a record with no position or container attached yet
    pub fn new(
        severity: Severity,
        code: ErrorCode,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            position: 0,
            id: id.into(),
            message: message.into(),
            container: None,
            code,
            offender: None,
            related: None,
            severity,
        }
    }

    /// Set the sequence position
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Set the owning container
    #[must_use]
    pub fn in_container(mut self, container: ContainerId) -> Self {
        self.container = Some(container);
        self
    }

    /// Set the offending object
    #[must_use]
    pub fn offender(mut self, offender: Offender) -> Self {
        self.offender = Some(offender);
        self
    }

    /// Set the second object involved
    #[must_use]
    pub fn related(mut self, related: Offender) -> Self {
        self.related = Some(related);
        self
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} at {}: {}",
            self.severity,
            self.code.value(),
            self.id,
            self.position,
            self.message
        )
    }
}

/// Accumulated error records for one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentErrors {
    errors: Vec<DocumentError>,
    /// Maximum number of records kept (0 = unlimited)
    limit: usize,
    /// Number of records dropped because the limit was reached
    dropped: usize,
}

impl DocumentErrors {
    /// Create an empty, unlimited list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list that keeps at most `limit` records (0 = unlimited)
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            errors: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    /// Append a record
    pub fn push(&mut self, error: DocumentError) {
        if self.limit > 0 && self.errors.len() >= self.limit {
            self.dropped += 1;
            return;
        }
        self.errors.push(error);
    }

    /// Append a record built from its parts
    pub fn add(
        &mut self,
        severity: Severity,
        code: ErrorCode,
        position: usize,
        id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(DocumentError::new(severity, code, id, message).at(position));
    }

    /// Move every record of `other` into `self`
    pub fn append(&mut self, other: &mut DocumentErrors) {
        for error in other.errors.drain(..) {
            self.push(error);
        }
        self.dropped += other.dropped;
        other.dropped = 0;
    }

    /// Whether no record was kept
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of kept records
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Number of records dropped by the limit
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Records of one severity
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.errors.iter().filter(|e| e.severity == severity).count()
    }

    /// Records carrying `code`
    pub fn with_code(&self, code: ErrorCode) -> impl Iterator<Item = &DocumentError> {
        self.errors.iter().filter(move |e| e.code == code)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, DocumentError> {
        self.errors.iter()
    }

    /// Borrow as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[DocumentError] {
        &self.errors
    }

    /// Take ownership of the records
    #[must_use]
    pub fn into_vec(self) -> Vec<DocumentError> {
        self.errors
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.errors.clear();
        self.dropped = 0;
    }
}

impl<'a> IntoIterator for &'a DocumentErrors {
    type Item = &'a DocumentError;
    type IntoIter = std::slice::Iter<'a, DocumentError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl Extend<DocumentError> for DocumentErrors {
    fn extend<T: IntoIterator<Item = DocumentError>>(&mut self, iter: T) {
        for error in iter {
            self.push(error);
        }
    }
}
