//! Composite elements: an ordered group of component data elements

use super::{DataElement, ElementContext, ElementSpec};
use crate::errors::{DocumentError, DocumentErrors, ErrorCode, Offender, Severity};
use crate::occurs::Occurs;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Template metadata of a composite slot
#[derive(Debug, Clone)]
pub struct CompositeSpec {
    /// Reference designator, e.g. `SV101`
    pub id: String,
    /// Descriptive name
    pub name: String,
    /// Mandatory
    pub required: bool,
    /// False when marked "not used"
    pub used: bool,
    /// 1-based position within the owning segment
    pub sequence: usize,
    /// Repeat limit within one field
    pub occurs: Occurs,
    /// Component specs in order
    pub components: Vec<Arc<ElementSpec>>,
}

impl CompositeSpec {
    /// Create an optional composite with no components
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            required: false,
            used: true,
            sequence: 0,
            occurs: Occurs::ONCE,
            components: Vec::new(),
        }
    }

    /// Append a component; its sequence becomes its 1-based position
    #[must_use]
    pub fn component(mut self, spec: ElementSpec) -> Self {
        let sequence = self.components.len() + 1;
        self.components.push(Arc::new(spec.sequence(sequence)));
        self
    }

    /// Mark mandatory
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the descriptive name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the repeat limit
    #[must_use]
    pub fn occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }
}

/// Runtime value of a composite field
///
/// Holds at least one occurrence; further occurrences come from the repeat
/// separator and are bounded by `CompositeSpec::occurs`.
#[derive(Clone)]
pub struct CompositeElement {
    spec: Arc<CompositeSpec>,
    occurrences: Vec<Vec<DataElement>>,
}

impl CompositeElement {
    /// Create an empty composite with one element per component spec
    #[must_use]
    pub fn new(spec: Arc<CompositeSpec>) -> Self {
        let first = Self::blank(&spec);
        Self {
            spec,
            occurrences: vec![first],
        }
    }

    fn blank(spec: &CompositeSpec) -> Vec<DataElement> {
        spec.components
            .iter()
            .map(|c| DataElement::new(Arc::clone(c)))
            .collect()
    }

    /// Template metadata
    #[must_use]
    pub fn spec(&self) -> &Arc<CompositeSpec> {
        &self.spec
    }

    /// Reference designator
    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Number of component slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.spec.components.len()
    }

    /// Whether the composite has no component slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spec.components.is_empty()
    }

    /// Number of occurrences held
    #[must_use]
    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }

    /// Append an empty occurrence and return its index
    ///
    /// # Errors
    ///
    /// Fails when the composite already holds `occurs` occurrences.
    pub fn push_occurrence(&mut self) -> Result<usize> {
        if !self.spec.occurs.can_add(self.occurrences.len()) {
            return Err(Error::occurs_exceeded(
                &self.spec.id,
                self.spec.occurs.limit().unwrap_or_default(),
            ));
        }
        self.occurrences.push(Self::blank(&self.spec));
        Ok(self.occurrences.len() - 1)
    }

    /// Component at 1-based `position` of occurrence 0
    ///
    /// # Errors
    ///
    /// Fails when `position` is outside the composite.
    pub fn component(&self, position: usize) -> Result<&DataElement> {
        self.component_at(0, position)
    }

    /// Component at 1-based `position` of `occurrence`
    ///
    /// # Errors
    ///
    /// Fails when either index is outside the composite.
    pub fn component_at(&self, occurrence: usize, position: usize) -> Result<&DataElement> {
        position
            .checked_sub(1)
            .and_then(|i| self.occurrences.get(occurrence)?.get(i))
            .ok_or_else(|| self.no_such(position))
    }

    /// Mutable component at 1-based `position` of `occurrence`
    ///
    /// # Errors
    ///
    /// Fails when either index is outside the composite.
    pub fn component_mut(
        &mut self,
        occurrence: usize,
        position: usize,
    ) -> Result<&mut DataElement> {
        let err = self.no_such(position);
        position
            .checked_sub(1)
            .and_then(|i| self.occurrences.get_mut(occurrence)?.get_mut(i))
            .ok_or(err)
    }

    fn no_such(&self, position: usize) -> Error {
        Error::NoSuchComponent {
            id: self.spec.id.clone(),
            position,
        }
    }

    /// Set the component at 1-based `position` of occurrence 0
    ///
    /// # Errors
    ///
    /// Fails for an unknown position or a value the component rejects.
    pub fn set(&mut self, position: usize, text: &str) -> Result<()> {
        self.component_mut(0, position)?.set(text)
    }

    /// Transmitted-text form of [`CompositeElement::set`]
    ///
    /// # Errors
    ///
    /// Same conditions as [`CompositeElement::set`].
    pub fn load(&mut self, position: usize, text: &str) -> Result<()> {
        self.component_mut(0, position)?.load(text)
    }

    /// Text of the component at 1-based `position` of occurrence 0
    #[must_use]
    pub fn get(&self, position: usize) -> Option<String> {
        self.component(position).ok().and_then(DataElement::get)
    }

    /// Iterate the components of occurrence 0
    pub fn components(&self) -> impl Iterator<Item = &DataElement> {
        self.occurrences.iter().take(1).flatten()
    }

    /// Component texts of occurrence 0 up to the last non-empty one
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.values_at(0)
    }

    /// Component texts of `occurrence` up to the last non-empty one
    #[must_use]
    pub fn values_at(&self, occurrence: usize) -> Vec<String> {
        let Some(components) = self.occurrences.get(occurrence) else {
            return Vec::new();
        };
        let mut values: Vec<String> = components
            .iter()
            .map(|c| c.get().unwrap_or_default())
            .collect();
        while values.last().is_some_and(String::is_empty) {
            values.pop();
        }
        values
    }

    /// Whether any component of any occurrence carries data
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.occurrences.iter().flatten().any(DataElement::has_content)
    }

    /// Semantic check of the composite and each component
    pub fn validate_into(&self, ctx: &ElementContext, errors: &mut DocumentErrors) {
        if !self.has_content() {
            if self.spec.required {
                errors.push(self.record(
                    ctx,
                    Severity::Integrity,
                    ErrorCode::MandatoryElementMissing,
                    format!(
                        "Required composite {} ({}) is missing",
                        self.spec.id, self.spec.name
                    ),
                ));
            }
            return;
        }
        if !self.spec.used {
            errors.push(self.record(
                ctx,
                Severity::Requirement,
                ErrorCode::UnusedElementPresent,
                format!("{} is marked not used but carries data", self.spec.id),
            ));
        }
        for components in &self.occurrences {
            for (index, component) in components.iter().enumerate() {
                component.validate_into(&ctx.component(index + 1), errors);
            }
        }
    }

    fn record(
        &self,
        ctx: &ElementContext,
        severity: Severity,
        code: ErrorCode,
        message: String,
    ) -> DocumentError {
        let mut error =
            DocumentError::new(severity, code, &self.spec.id, message).at(ctx.segment_position);
        if let Some(segment) = ctx.segment {
            error = error.in_container(segment).offender(Offender::Element {
                segment,
                field: ctx.field,
                component: None,
                occurrence: 0,
            });
        }
        error
    }
}

impl PartialEq for CompositeElement {
    fn eq(&self, other: &Self) -> bool {
        self.spec.id == other.spec.id && self.occurrences == other.occurrences
    }
}

impl fmt::Debug for CompositeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeElement")
            .field("id", &self.spec.id)
            .field("occurrences", &self.occurrences)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    fn sv1() -> CompositeElement {
        let spec = CompositeSpec::new("SV101")
            .required()
            .component(ElementSpec::new("SV101-01", ElementKind::Id).length(2, 2).required())
            .component(ElementSpec::new("SV101-02", ElementKind::Char).length(1, 48).required())
            .component(ElementSpec::new("SV101-03", ElementKind::Char).length(2, 2));
        CompositeElement::new(Arc::new(spec))
    }

    #[test]
    fn test_component_positions_are_one_based() {
        let mut c = sv1();
        c.set(1, "HC").unwrap();
        c.set(2, "99213").unwrap();
        assert_eq!(c.get(1).as_deref(), Some("HC"));
        assert_eq!(c.component(2).unwrap().spec().sequence, 2);
        assert!(c.component(0).is_err());
        assert!(c.set(4, "X").is_err());
    }

    #[test]
    fn test_occurrences_are_bounded() {
        let spec = CompositeSpec::new("C040")
            .occurs(Occurs::Bounded(2))
            .component(ElementSpec::new("C04001", ElementKind::Char));
        let mut c = CompositeElement::new(Arc::new(spec));
        assert_eq!(c.push_occurrence().unwrap(), 1);
        c.component_mut(1, 1).unwrap().set("B").unwrap();
        assert_eq!(c.values_at(1), vec!["B"]);
        assert!(c.push_occurrence().is_err());
        assert_eq!(c.occurrence_count(), 2);
    }

    #[test]
    fn test_values_drop_trailing_empties() {
        let mut c = sv1();
        c.set(1, "HC").unwrap();
        c.set(2, "99213").unwrap();
        assert_eq!(c.values(), vec!["HC", "99213"]);
    }

    #[test]
    fn test_missing_composite_reports_once() {
        let c = sv1();
        let mut errors = DocumentErrors::new();
        c.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].id, "SV101");
    }

    #[test]
    fn test_component_errors_carry_component_position() {
        let mut c = sv1();
        c.set(1, "HC").unwrap();
        let mut errors = DocumentErrors::new();
        let ctx = ElementContext::field(crate::ContainerId(2), 3, 1);
        c.validate_into(&ctx, &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.as_slice()[0].offender,
            Some(Offender::Element {
                segment: crate::ContainerId(2),
                field: 1,
                component: Some(2),
                occurrence: 0
            })
        );
    }
}
