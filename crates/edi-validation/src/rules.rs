//! Applying cross-field rules to runtime segments and composites

use crate::{Error, Result};
use edi_ir::{
    CompositeElement, ContainerId, DataElement, DocumentError, DocumentErrors, ErrorCode, Field,
    Offender, Severity,
};
use edi_parser::Container;
use edi_schema::rules::FieldPresence;
use edi_schema::{ElementRule, RuleKind};

/// Field presence of one runtime segment, named like `REF02`
#[derive(Debug, Clone, Copy)]
pub struct SegmentFields<'a> {
    segment: &'a Container,
}

impl<'a> SegmentFields<'a> {
    #[must_use]
    pub fn new(segment: &'a Container) -> Self {
        Self { segment }
    }
}

impl FieldPresence for SegmentFields<'_> {
    fn has_content(&self, position: usize) -> bool {
        self.segment.field(position).is_some_and(Field::has_content)
    }

    fn field_name(&self, position: usize) -> String {
        format!("{}{position:02}", self.segment.id())
    }
}

/// Component presence of one occurrence of a composite
#[derive(Debug, Clone, Copy)]
pub struct CompositeFields<'a> {
    composite: &'a CompositeElement,
    occurrence: usize,
}

impl<'a> CompositeFields<'a> {
    #[must_use]
    pub fn new(composite: &'a CompositeElement, occurrence: usize) -> Self {
        Self {
            composite,
            occurrence,
        }
    }
}

impl FieldPresence for CompositeFields<'_> {
    fn has_content(&self, position: usize) -> bool {
        self.composite
            .component_at(self.occurrence, position)
            .is_ok_and(DataElement::has_content)
    }

    fn field_name(&self, position: usize) -> String {
        format!("{}-{position:02}", self.composite.id())
    }
}

/// Where a rule violation is recorded
#[derive(Debug, Clone)]
pub struct RuleSite {
    /// Segment the rule is checked on
    pub segment: ContainerId,
    /// Segment id, used as the record id
    pub id: String,
    /// Segment ordinal in the input
    pub position: usize,
    /// Field position of the composite when the rule is a composite's
    pub composite: Option<usize>,
    /// Composite occurrence
    pub occurrence: usize,
}

impl RuleSite {
    #[must_use]
    pub fn segment(segment: ContainerId, id: impl Into<String>, position: usize) -> Self {
        Self {
            segment,
            id: id.into(),
            position,
            composite: None,
            occurrence: 0,
        }
    }

    /// Same site, narrowed to occurrence `occurrence` of the composite at `field`
    #[must_use]
    pub fn in_composite(mut self, field: usize, occurrence: usize) -> Self {
        self.composite = Some(field);
        self.occurrence = occurrence;
        self
    }

    fn record(&self, rule: &ElementRule, message: String) -> DocumentError {
        let first = rule.positions.first().copied().unwrap_or_default();
        let offender = match self.composite {
            Some(field) => Offender::Element {
                segment: self.segment,
                field,
                component: Some(first),
                occurrence: self.occurrence,
            },
            None => Offender::Element {
                segment: self.segment,
                field: first,
                component: None,
                occurrence: 0,
            },
        };
        DocumentError::new(Severity::Requirement, rule_code(rule.kind), &self.id, message)
            .at(self.position)
            .in_container(self.segment)
            .offender(offender)
    }
}

/// Category code for a violated rule
#[must_use]
pub fn rule_code(kind: RuleKind) -> ErrorCode {
    match kind {
        RuleKind::OnlyOne | RuleKind::IfFirstThenNone => ErrorCode::ExclusionViolated,
        RuleKind::OneOrMore
        | RuleKind::IfFirstThenAll
        | RuleKind::IfFirstThenOneMore
        | RuleKind::AllOrNone => ErrorCode::ConditionalElementMissing,
    }
}

/// Check `rules` against `fields`
///
/// Violations are appended to `errors` and counted. With `throw_error` the
/// first violation is returned as [`Error::Rule`] instead and nothing is
/// appended.
///
/// # Errors
///
/// Only when `throw_error` is set and a rule fails.
pub fn test_rules(
    rules: &[ElementRule],
    fields: &dyn FieldPresence,
    site: &RuleSite,
    errors: &mut DocumentErrors,
    throw_error: bool,
) -> Result<usize> {
    let mut failed = 0;
    for rule in rules {
        let Some(message) = rule.evaluate(fields) else {
            continue;
        };
        if throw_error {
            return Err(Error::Rule {
                rule: rule.to_string(),
                id: site.id.clone(),
                message,
            });
        }
        failed += 1;
        errors.push(site.record(rule, message));
    }
    Ok(failed)
}
