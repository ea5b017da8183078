//! Validation engine

use crate::rules::{CompositeFields, RuleSite, SegmentFields, test_rules};
use crate::{Error, Result};
use edi_ir::{
    ContainerId, ContainerType, DocumentError, DocumentErrors, ElementContext, ErrorCode, Field,
    Offender, Severity,
};
use edi_parser::{Document, ParseOutcome};
use edi_schema::{ControlLink, CountKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Which severities make a document invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictnessLevel {
    /// Every record fails the document
    #[default]
    Strict,
    /// Requirement records are reported as warnings
    Moderate,
    /// Only structural records fail the document
    Lenient,
}

impl StrictnessLevel {
    /// Whether a record of `severity` fails the document at this level
    #[must_use]
    pub fn fails(self, severity: Severity) -> bool {
        match self {
            StrictnessLevel::Strict => true,
            StrictnessLevel::Moderate => severity != Severity::Requirement,
            StrictnessLevel::Lenient => severity == Severity::Structural,
        }
    }
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Strictness level
    pub strictness: StrictnessLevel,

    /// Keep walking after the first container that reports a problem
    pub continue_on_error: bool,

    /// Maximum number of records kept (0 = unlimited)
    pub max_errors: usize,

    /// Cross-check header/trailer control numbers and counts
    pub check_controls: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strictness: StrictnessLevel::Strict,
            continue_on_error: true,
            max_errors: 0,
            check_controls: true,
        }
    }
}

/// Records split by whether they fail the document
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Whether no failing record was found
    pub is_valid: bool,

    /// Records that fail the document
    pub errors: DocumentErrors,

    /// Records below the strictness level
    pub warnings: DocumentErrors,
}

impl ValidationResult {
    /// Create a valid result
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: DocumentErrors::new(),
            warnings: DocumentErrors::new(),
        }
    }

    /// Split `records` by `strictness`
    #[must_use]
    pub fn from_errors(records: DocumentErrors, strictness: StrictnessLevel) -> Self {
        let mut result = Self::valid();
        for record in records.into_vec() {
            if strictness.fails(record.severity) {
                result.add_error(record);
            } else {
                result.add_warning(record);
            }
        }
        result
    }

    /// Add an error
    pub fn add_error(&mut self, error: DocumentError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: DocumentError) {
        self.warnings.push(warning);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validation engine
///
/// Each check has a collecting `*_into` form and a throwing form. The
/// `validate_container` pair covers a container and everything below it,
/// `validate_level` only the container itself.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: ValidationConfig,
}

impl ValidationEngine {
    /// Create with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Create with specific configuration
    #[must_use]
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a complete document, stopping at the first failing container
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] with the failing records of that container.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        self.validate_container(doc, doc.root())
    }

    /// Append every problem in `doc` to `errors`
    pub fn validate_into(&self, doc: &Document, errors: &mut DocumentErrors) {
        self.validate_container_into(doc, doc.root(), errors);
    }

    /// Validate `id` and everything below it, parents first
    ///
    /// Unlike the collecting form this ignores `continue_on_error`: the walk
    /// ends at the first container with a record the strictness level fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] with the failing records of that container.
    pub fn validate_container(&self, doc: &Document, id: ContainerId) -> Result<()> {
        let mut errors = self.error_list();
        for container in doc.walk(id) {
            self.validate_level_into(doc, container, &mut errors);
            if self.has_failing(&errors) {
                debug!(container = %container, "Throwing form stops at first failing container");
                break;
            }
        }
        self.fail_on(errors)
    }

    /// Collecting form of [`ValidationEngine::validate_container`]
    pub fn validate_container_into(
        &self,
        doc: &Document,
        id: ContainerId,
        errors: &mut DocumentErrors,
    ) {
        for container in doc.walk(id) {
            let before = errors.len() + errors.dropped();
            self.validate_level_into(doc, container, errors);
            if !self.config.continue_on_error && errors.len() + errors.dropped() > before {
                debug!(container = %container, "Stopping at first failing container");
                break;
            }
        }
    }

    /// Validate `id` alone, without its children
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] with every failing record.
    pub fn validate_level(&self, doc: &Document, id: ContainerId) -> Result<()> {
        let mut errors = self.error_list();
        self.validate_level_into(doc, id, &mut errors);
        self.fail_on(errors)
    }

    /// Collecting form of [`ValidationEngine::validate_level`]
    pub fn validate_level_into(&self, doc: &Document, id: ContainerId, errors: &mut DocumentErrors) {
        let container = doc.container(id);
        trace!(kind = %container.kind, id = container.id(), "Validating container");
        self.used_into(doc, id, errors);
        match container.kind {
            ContainerType::Segment => self.segment_into(doc, id, errors),
            ContainerType::Envelope
            | ContainerType::FunctionalGroup
            | ContainerType::TransactionSet => {
                self.required_into(doc, id, errors);
                if self.config.check_controls {
                    self.control_into(doc, id, errors);
                }
            }
            ContainerType::Table | ContainerType::Loop => self.required_into(doc, id, errors),
            ContainerType::CompositeElement | ContainerType::DataElement => {}
        }
    }

    /// Collect every record and split it by strictness
    #[must_use]
    pub fn check(&self, doc: &Document) -> ValidationResult {
        let mut errors = self.error_list();
        self.validate_into(doc, &mut errors);
        ValidationResult::from_errors(errors, self.config.strictness)
    }

    /// Like [`ValidationEngine::check`], with the parse errors included first
    #[must_use]
    pub fn check_parsed(&self, outcome: &ParseOutcome) -> ValidationResult {
        let mut errors = self.error_list();
        errors.extend(outcome.errors.iter().cloned());
        self.validate_into(&outcome.document, &mut errors);
        ValidationResult::from_errors(errors, self.config.strictness)
    }

    /// Required children missing from `id`
    ///
    /// The runtime key set of the container is subtracted from the keys of
    /// its template's required children. Header and trailer segments of a
    /// control level are left to [`ValidationEngine::control_into`].
    pub fn required_into(&self, doc: &Document, id: ContainerId, errors: &mut DocumentErrors) {
        let container = doc.container(id);
        let tree = doc.template();
        let present = doc.keys(id);
        let link = control_link_for(doc, id);
        let mut reported = BTreeSet::new();

        for child in tree.children(container.template) {
            let node = tree.node(*child);
            if !node.required || node.kind.is_element() {
                continue;
            }
            let key = node.key();
            if present.contains(&key) || !reported.insert(key.clone()) {
                continue;
            }
            if node.kind == ContainerType::Segment
                && link.is_some_and(|l| l.header == key.id || l.trailer == key.id)
            {
                continue;
            }
            errors.push(
                DocumentError::new(
                    Severity::Integrity,
                    ErrorCode::MandatorySegmentMissing,
                    &key.id,
                    format!(
                        "Required {} {} is missing from {} {}",
                        node.kind,
                        key.id,
                        container.kind,
                        container.id()
                    ),
                )
                .at(container.position.segment)
                .in_container(id)
                .offender(Offender::Container(id)),
            );
        }
    }

    /// Stored fields, required fields and cross-field rules of a segment
    pub fn segment_into(&self, doc: &Document, id: ContainerId, errors: &mut DocumentErrors) {
        let segment = doc.container(id);
        let tree = doc.template();
        let node = tree.node(segment.template);
        let ordinal = segment.position.segment;

        for slot in node.fields() {
            let position = slot.spec.sequence();
            let ctx = ElementContext::field(id, ordinal, position);
            match segment.field(position) {
                Some(field) => {
                    field.validate_into(&ctx, errors);
                    if let Field::Composite(composite) = field {
                        let rules = &tree.node(slot.node).rules;
                        if rules.is_empty() || !composite.has_content() {
                            continue;
                        }
                        for occurrence in 0..composite.occurrence_count() {
                            let site = RuleSite::segment(id, segment.id(), ordinal)
                                .in_composite(position, occurrence);
                            let fields = CompositeFields::new(composite, occurrence);
                            // Collecting form never raises
                            let _ = test_rules(rules, &fields, &site, errors, false);
                        }
                    }
                }
                None if slot.spec.required() => slot.spec.instantiate().validate_into(&ctx, errors),
                None => {}
            }
        }

        if !node.rules.is_empty() {
            let site = RuleSite::segment(id, segment.id(), ordinal);
            let _ = test_rules(&node.rules, &SegmentFields::new(segment), &site, errors, false);
        }
    }

    /// Header/trailer linkage of a control level
    ///
    /// A control-number mismatch yields one record citing both segments and
    /// a count mismatch one record citing the trailer.
    pub fn control_into(&self, doc: &Document, id: ContainerId, errors: &mut DocumentErrors) {
        let container = doc.container(id);
        let Some(link) = doc.template().node(container.template).control.as_ref() else {
            return;
        };
        let header = control_segment(doc, id, &link.header);
        let trailer = control_segment(doc, id, &link.trailer);
        let at = container.position.segment;

        if header.is_none() {
            errors.push(
                DocumentError::new(
                    Severity::Integrity,
                    ErrorCode::MissingHeader,
                    &link.header,
                    format!("{} {} has no {} header", container.kind, container.id(), link.header),
                )
                .at(at)
                .in_container(id)
                .offender(Offender::Container(id)),
            );
        }
        if trailer.is_none() {
            errors.push(
                DocumentError::new(
                    Severity::Integrity,
                    ErrorCode::MissingTrailer,
                    &link.trailer,
                    format!("{} {} has no {} trailer", container.kind, container.id(), link.trailer),
                )
                .at(at)
                .in_container(id)
                .offender(Offender::Container(id)),
            );
        }
        let (Some(header), Some(trailer)) = (header, trailer) else {
            return;
        };

        if let Some(error) = control_number_mismatch(doc, id, link, header, trailer) {
            errors.push(error);
        }
        if let Some(error) = count_mismatch(doc, id, link, trailer) {
            errors.push(error);
        }
    }

    fn used_into(&self, doc: &Document, id: ContainerId, errors: &mut DocumentErrors) {
        let container = doc.container(id);
        if container.parent.is_none() || doc.template().node(container.template).used {
            return;
        }
        errors.push(
            DocumentError::new(
                Severity::Requirement,
                ErrorCode::UnexpectedSegment,
                container.id(),
                format!("{} {} is marked not used", container.kind, container.id()),
            )
            .at(container.position.segment)
            .in_container(id)
            .offender(Offender::Container(id)),
        );
    }

    fn error_list(&self) -> DocumentErrors {
        DocumentErrors::with_limit(self.config.max_errors)
    }

    fn has_failing(&self, errors: &DocumentErrors) -> bool {
        errors
            .as_slice()
            .iter()
            .any(|e| self.config.strictness.fails(e.severity))
    }

    fn fail_on(&self, errors: DocumentErrors) -> Result<()> {
        let mut failing = DocumentErrors::new();
        failing.extend(
            errors
                .into_vec()
                .into_iter()
                .filter(|e| self.config.strictness.fails(e.severity)),
        );
        if failing.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid(failing))
        }
    }
}

/// Control linkage governing the direct children of `id`
fn control_link_for(doc: &Document, id: ContainerId) -> Option<&ControlLink> {
    let container = doc.container(id);
    let level = match container.kind {
        ContainerType::Table => container.parent?,
        kind if kind.is_control_level() => id,
        _ => return None,
    };
    doc.template()
        .node(doc.container(level).template)
        .control
        .as_ref()
}

/// Header or trailer segment of a control level, looking through Tables
fn control_segment(doc: &Document, level: ContainerId, id: &str) -> Option<ContainerId> {
    for child in doc.children(level) {
        let node = doc.container(child);
        match node.kind {
            ContainerType::Segment if node.id() == id => return Some(child),
            ContainerType::Table => {
                let found = doc.children(child).into_iter().find(|c| {
                    let segment = doc.container(*c);
                    segment.kind == ContainerType::Segment && segment.id() == id
                });
                if found.is_some() {
                    return found;
                }
            }
            _ => {}
        }
    }
    None
}

fn trimmed(doc: &Document, segment: ContainerId, position: usize) -> Option<String> {
    doc.value(segment, position)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn control_number_mismatch(
    doc: &Document,
    level: ContainerId,
    link: &ControlLink,
    header: ContainerId,
    trailer: ContainerId,
) -> Option<DocumentError> {
    let (header_field, trailer_field) = (link.header_number?, link.trailer_number?);
    let expected = trimmed(doc, header, header_field)?;
    let actual = trimmed(doc, trailer, trailer_field)?;
    if same_control_number(&expected, &actual) {
        return None;
    }
    Some(
        DocumentError::new(
            Severity::Integrity,
            ErrorCode::ControlNumberMismatch,
            &link.trailer,
            format!(
                "{}{trailer_field:02} control number '{actual}' does not match {}{header_field:02} '{expected}'",
                link.trailer, link.header
            ),
        )
        .at(doc.container(trailer).position.segment)
        .in_container(level)
        .offender(Offender::Element {
            segment: trailer,
            field: trailer_field,
            component: None,
            occurrence: 0,
        })
        .related(Offender::Element {
            segment: header,
            field: header_field,
            component: None,
            occurrence: 0,
        }),
    )
}

/// Numeric control numbers match regardless of zero padding
fn same_control_number(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }
    let numeric = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    numeric(expected)
        && numeric(actual)
        && expected.trim_start_matches('0') == actual.trim_start_matches('0')
}

fn count_mismatch(
    doc: &Document,
    level: ContainerId,
    link: &ControlLink,
    trailer: ContainerId,
) -> Option<DocumentError> {
    let field = link.count_field?;
    let text = trimmed(doc, trailer, field)?;
    let (found, what) = match link.count {
        CountKind::Segments => (doc.segments(level).len(), "segments".to_string()),
        CountKind::Containers(kind) => (doc.count(level, kind), kind.to_string()),
    };
    let message = match text.parse::<usize>() {
        Ok(stated) if stated == found => return None,
        Ok(stated) => format!(
            "{}{field:02} states {stated}, counted {found} {what}",
            link.trailer
        ),
        Err(_) => format!("{}{field:02} '{text}' is not a count", link.trailer),
    };
    Some(
        DocumentError::new(
            Severity::Integrity,
            ErrorCode::CountMismatch,
            &link.trailer,
            message,
        )
        .at(doc.container(trailer).position.segment)
        .in_container(level)
        .offender(Offender::Element {
            segment: trailer,
            field,
            component: None,
            occurrence: 0,
        }),
    )
}
