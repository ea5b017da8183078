//! Typed data element values
//!
//! A [`DataElement`] is a scalar field whose behaviour depends on its
//! [`ElementKind`]. It keeps a bounded ring of `occurs` slots: [`set`]
//! writes occurrence 0 and resets the cursor, [`set_next`] advances the
//! cursor (wrapping modulo `occurs`) and writes there.
//!
//! [`set`]: DataElement::set
//! [`set_next`]: DataElement::set_next

mod binary;
mod composite;
mod date;
mod numeric;
mod real;
mod text;
mod time;

pub use composite::{CompositeElement, CompositeSpec};

use crate::codelist::CodeList;
use crate::errors::{DocumentError, DocumentErrors, ErrorCode, Offender, Severity};
use crate::handle::ContainerId;
use crate::occurs::Occurs;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Schema-supplied cross-check run after the built-in checks
pub type ElementCheck = Arc<dyn Fn(&DataElement) -> Option<String> + Send + Sync>;

/// Scalar data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Free text (AN)
    Char,
    /// Coded value checked against a code list (ID)
    Id,
    /// Integer with `decimals` implied fraction digits (N0..N9)
    Numeric { decimals: u8 },
    /// Date, YYMMDD or CCYYMMDD (DT)
    Date,
    /// Time, HHMM, HHMMSS or HHMMSSd[d] (TM)
    Time,
    /// Decimal number with explicit point (R)
    Real,
    /// Hex-encoded binary (B)
    Binary,
}

impl ElementKind {
    /// X12 type code
    #[must_use]
    pub fn code(self) -> String {
        match self {
            ElementKind::Char => "AN".to_string(),
            ElementKind::Id => "ID".to_string(),
            ElementKind::Numeric { decimals } => format!("N{decimals}"),
            ElementKind::Date => "DT".to_string(),
            ElementKind::Time => "TM".to_string(),
            ElementKind::Real => "R".to_string(),
            ElementKind::Binary => "B".to_string(),
        }
    }

    /// Whether the text form is padded to the minimum length on output
    #[must_use]
    pub fn pads_to_min(self) -> bool {
        !matches!(self, ElementKind::Real | ElementKind::Binary)
    }

    fn syntax_code(self) -> ErrorCode {
        match self {
            ElementKind::Id => ErrorCode::InvalidCodeValue,
            ElementKind::Date => ErrorCode::InvalidDate,
            ElementKind::Time => ErrorCode::InvalidTime,
            ElementKind::Char
            | ElementKind::Numeric { .. }
            | ElementKind::Real
            | ElementKind::Binary => ErrorCode::InvalidCharacter,
        }
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "AN" | "A" | "CHAR" => Ok(ElementKind::Char),
            "ID" => Ok(ElementKind::Id),
            "DT" | "DATE" => Ok(ElementKind::Date),
            "TM" | "TIME" => Ok(ElementKind::Time),
            "R" | "REAL" => Ok(ElementKind::Real),
            "B" | "BINARY" => Ok(ElementKind::Binary),
            "N" => Ok(ElementKind::Numeric { decimals: 0 }),
            other => other
                .strip_prefix('N')
                .and_then(|d| d.parse::<u8>().ok())
                .filter(|d| *d <= 9)
                .map(|decimals| ElementKind::Numeric { decimals })
                .ok_or_else(|| {
                    Error::invalid_value("type", format!("unknown element type '{s}'"))
                }),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Template metadata of one data element slot
#[derive(Clone)]
pub struct ElementSpec {
    /// Reference designator, e.g. `REF01`
    pub id: String,
    /// Descriptive name
    pub name: String,
    /// Data type
    pub kind: ElementKind,
    /// Minimum length
    pub min_length: usize,
    /// Maximum length
    pub max_length: usize,
    /// Repeat limit within one field
    pub occurs: Occurs,
    /// Mandatory
    pub required: bool,
    /// False when the implementation marks the element "not used"
    pub used: bool,
    /// 1-based position within the owning segment or composite
    pub sequence: usize,
    /// Allowed codes (ID elements)
    pub code_list: Option<Arc<dyn CodeList>>,
    /// Extra check resolved from the callback registry
    pub check: Option<ElementCheck>,
    /// Keep trailing fraction zeros when re-formatting a real
    pub preserve_precision: bool,
}

impl ElementSpec {
    /// Create an optional, used, single-occurrence spec with length 1..=35
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            min_length: 1,
            max_length: 35,
            occurs: Occurs::ONCE,
            required: false,
            used: true,
            sequence: 0,
            code_list: None,
            check: None,
            preserve_precision: false,
        }
    }

    /// Set the descriptive name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set min/max length
    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = min;
        self.max_length = max.max(min);
        self
    }

    /// Mark mandatory
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark "not used"
    #[must_use]
    pub fn unused(mut self) -> Self {
        self.used = false;
        self
    }

    /// Set the repeat limit
    #[must_use]
    pub fn occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Set the position in the owning segment/composite
    #[must_use]
    pub fn sequence(mut self, sequence: usize) -> Self {
        self.sequence = sequence;
        self
    }

    /// Attach a code list
    #[must_use]
    pub fn codes(mut self, list: Arc<dyn CodeList>) -> Self {
        self.code_list = Some(list);
        self
    }

    /// Attach a cross-check
    #[must_use]
    pub fn check(mut self, check: ElementCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Preserve trailing fraction zeros of reals
    #[must_use]
    pub fn preserve_precision(mut self, preserve: bool) -> Self {
        self.preserve_precision = preserve;
        self
    }
}

impl fmt::Debug for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementSpec")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("occurs", &self.occurs)
            .field("required", &self.required)
            .field("used", &self.used)
            .field("sequence", &self.sequence)
            .field("code_list", &self.code_list.as_ref().map(|c| c.name().to_string()))
            .field("check", &self.check.is_some())
            .finish_non_exhaustive()
    }
}

/// Where an element sits, for error records
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementContext {
    /// Owning segment
    pub segment: Option<ContainerId>,
    /// Segment ordinal in the input
    pub segment_position: usize,
    /// 1-based field position in the segment
    pub field: usize,
    /// 1-based component position inside a composite
    pub component: Option<usize>,
}

impl ElementContext {
    /// Context of a field of `segment`
    #[must_use]
    pub fn field(segment: ContainerId, segment_position: usize, field: usize) -> Self {
        Self {
            segment: Some(segment),
            segment_position,
            field,
            component: None,
        }
    }

    /// Same context, narrowed to a composite component
    #[must_use]
    pub fn component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    fn record(
        &self,
        severity: Severity,
        code: ErrorCode,
        id: &str,
        occurrence: usize,
        message: String,
    ) -> DocumentError {
        let mut error = DocumentError::new(severity, code, id, message).at(self.segment_position);
        if let Some(segment) = self.segment {
            error = error.in_container(segment).offender(Offender::Element {
                segment,
                field: self.field,
                component: self.component,
                occurrence,
            });
        }
        error
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stored {
    Text(String),
    Real { text: String, fraction_digits: u32 },
    Bytes(Vec<u8>),
}

/// A scalar, possibly repeating, field value
#[derive(Clone)]
pub struct DataElement {
    spec: Arc<ElementSpec>,
    slots: Vec<Option<Stored>>,
    cursor: Option<usize>,
}

impl DataElement {
    /// Create an empty element for `spec`
    #[must_use]
    pub fn new(spec: Arc<ElementSpec>) -> Self {
        Self {
            spec,
            slots: Vec::new(),
            cursor: None,
        }
    }

    /// Template metadata
    #[must_use]
    pub fn spec(&self) -> &Arc<ElementSpec> {
        &self.spec
    }

    /// Reference designator
    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Data type
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.spec.kind
    }

    /// Slot index of the last write
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Set occurrence 0 and reset the write cursor
    ///
    /// # Errors
    ///
    /// Numeric elements reject an explicit decimal point; binary elements
    /// reject text that is not hex.
    ///
    /// Numeric values are right-aligned and zero filled to the maximum
    /// length.
    pub fn set(&mut self, text: &str) -> Result<()> {
        let stored = self.store(text, true)?;
        self.replace(stored);
        Ok(())
    }

    /// Write the next occurrence, wrapping modulo `occurs`
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataElement::set`].
    pub fn set_next(&mut self, text: &str) -> Result<()> {
        let stored = self.store(text, true)?;
        let next = self.next_slot();
        self.write_slot(next, stored);
        Ok(())
    }

    /// Set occurrence 0 to text as it was transmitted
    ///
    /// Unlike [`DataElement::set`] the digits of a numeric are kept as
    /// received, so a parsed document serializes back byte for byte.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataElement::set`].
    pub fn load(&mut self, text: &str) -> Result<()> {
        let stored = self.store(text, false)?;
        self.replace(stored);
        Ok(())
    }

    /// Transmitted-text form of [`DataElement::set_next`]
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataElement::set`].
    pub fn load_next(&mut self, text: &str) -> Result<()> {
        let stored = self.store(text, false)?;
        let next = self.next_slot();
        self.write_slot(next, stored);
        Ok(())
    }

    fn replace(&mut self, stored: Stored) {
        self.slots.clear();
        self.slots.push(Some(stored));
        self.cursor = Some(0);
    }

    fn next_slot(&self) -> usize {
        match (self.cursor, self.spec.occurs.limit()) {
            (None, _) => 0,
            (Some(cursor), Some(limit)) => {
                let next = (cursor + 1) % limit.max(1);
                if next <= cursor {
                    warn!(
                        element = %self.spec.id,
                        limit,
                        "Repeat cursor wrapped; overwriting occurrence {next}"
                    );
                }
                next
            }
            (Some(cursor), None) => cursor + 1,
        }
    }

    fn write_slot(&mut self, index: usize, stored: Stored) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(stored);
        self.cursor = Some(index);
    }

    fn store(&self, text: &str, normalize: bool) -> Result<Stored> {
        match self.spec.kind {
            ElementKind::Char | ElementKind::Id | ElementKind::Date | ElementKind::Time => {
                Ok(Stored::Text(text.to_string()))
            }
            ElementKind::Numeric { .. } if normalize => {
                numeric::normalize(&self.spec, text).map(Stored::Text)
            }
            ElementKind::Numeric { .. } => numeric::store(&self.spec, text).map(Stored::Text),
            ElementKind::Real => Ok(Stored::Real {
                text: text.to_string(),
                fraction_digits: real::fraction_digits(text),
            }),
            ElementKind::Binary => binary::decode(&self.spec, text).map(Stored::Bytes),
        }
    }

    /// Occurrence 0 as text, padded per type
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.get_at(0)
    }

    /// Occurrence `index` as text, padded per type
    #[must_use]
    pub fn get_at(&self, index: usize) -> Option<String> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|stored| self.render(stored))
    }

    fn render(&self, stored: &Stored) -> String {
        match stored {
            Stored::Text(value) => match self.spec.kind {
                ElementKind::Char | ElementKind::Id => text::pad(&self.spec, value),
                ElementKind::Numeric { .. } => numeric::pad(&self.spec, value),
                ElementKind::Date => date::pad(&self.spec, value),
                ElementKind::Time => time::pad(&self.spec, value),
                ElementKind::Real | ElementKind::Binary => value.clone(),
            },
            Stored::Real { text, .. } => text.clone(),
            Stored::Bytes(bytes) => binary::encode(bytes),
        }
    }

    /// Occurrence `index` exactly as stored, without padding
    #[must_use]
    pub fn raw_at(&self, index: usize) -> Option<String> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|stored| match stored {
                Stored::Text(text) | Stored::Real { text, .. } => text.clone(),
                Stored::Bytes(bytes) => binary::encode(bytes),
            })
    }

    /// All occurrences in slot order, empty slots rendered as ""
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let last = self.slots.iter().rposition(Option::is_some);
        let Some(last) = last else {
            return Vec::new();
        };
        self.slots[..=last]
            .iter()
            .map(|slot| slot.as_ref().map(|s| self.render(s)).unwrap_or_default())
            .collect()
    }

    /// Number of filled occurrences
    #[must_use]
    pub fn occurrences(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether any occurrence has length > 0
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.slots.iter().flatten().any(|stored| match stored {
            Stored::Text(text) | Stored::Real { text, .. } => !text.is_empty(),
            Stored::Bytes(bytes) => !bytes.is_empty(),
        })
    }

    /// Drop every occurrence
    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = None;
    }

    /// Occurrence 0 padded to the maximum length, for fixed-width records
    #[must_use]
    pub fn fixed_width(&self) -> String {
        let value = self.get().unwrap_or_default();
        let width = self.spec.max_length;
        match self.spec.kind {
            ElementKind::Numeric { .. } => numeric::right_align(&value, width),
            _ => format!("{value:<width$}"),
        }
    }

    /// Syntax-level check of `text` for this element's type
    #[must_use]
    pub fn validate(&self, text: &str) -> Option<String> {
        match self.spec.kind {
            ElementKind::Char => text::validate_char(text),
            ElementKind::Id => text::validate_id(&self.spec, text),
            ElementKind::Numeric { .. } => numeric::validate(text),
            ElementKind::Real => real::validate(text),
            ElementKind::Date => date::validate(text),
            ElementKind::Time => time::validate(text),
            ElementKind::Binary => binary::validate(text),
        }
    }

    /// Semantic check against the template, appending every problem found
    pub fn validate_into(&self, ctx: &ElementContext, errors: &mut DocumentErrors) {
        let spec = &self.spec;
        if !self.has_content() {
            if spec.required {
                errors.push(Self::missing(spec, ctx));
            }
            return;
        }

        if !spec.used {
            errors.push(ctx.record(
                Severity::Requirement,
                ErrorCode::UnusedElementPresent,
                &spec.id,
                0,
                format!("{} is marked not used but carries data", spec.id),
            ));
        }

        for (occurrence, stored) in self.slots.iter().enumerate() {
            let Some(stored) = stored else { continue };
            let length = self.length_of(stored);
            if length < spec.min_length {
                errors.push(ctx.record(
                    Severity::Integrity,
                    ErrorCode::ElementTooShort,
                    &spec.id,
                    occurrence,
                    format!(
                        "{} has length {length}, minimum is {}",
                        spec.id, spec.min_length
                    ),
                ));
            } else if length > spec.max_length {
                errors.push(ctx.record(
                    Severity::Integrity,
                    ErrorCode::ElementTooLong,
                    &spec.id,
                    occurrence,
                    format!(
                        "{} has length {length}, maximum is {}",
                        spec.id, spec.max_length
                    ),
                ));
            }

            let text = match stored {
                Stored::Text(text) | Stored::Real { text, .. } => text.clone(),
                Stored::Bytes(bytes) => binary::encode(bytes),
            };
            if let Some(message) = self.validate(&text) {
                errors.push(ctx.record(
                    Severity::Requirement,
                    spec.kind.syntax_code(),
                    &spec.id,
                    occurrence,
                    format!("{}: {message}", spec.id),
                ));
            }
        }

        if let Some(check) = &spec.check {
            if let Some(message) = check(self) {
                errors.push(ctx.record(
                    Severity::Requirement,
                    ErrorCode::CustomCheckFailed,
                    &spec.id,
                    0,
                    message,
                ));
            }
        }
    }

    /// Record for a required element that has no value
    #[must_use]
    pub fn missing(spec: &ElementSpec, ctx: &ElementContext) -> DocumentError {
        ctx.record(
            Severity::Integrity,
            ErrorCode::MandatoryElementMissing,
            &spec.id,
            0,
            format!("Required element {} ({}) is missing", spec.id, spec.name),
        )
    }

    fn length_of(&self, stored: &Stored) -> usize {
        match stored {
            Stored::Text(text) => match self.spec.kind {
                ElementKind::Numeric { .. } => numeric::digit_count(text),
                _ => text.chars().count(),
            },
            Stored::Real { text, .. } => real::digit_count(text),
            Stored::Bytes(bytes) => bytes.len(),
        }
    }

    fn require_kind(&self, wanted: &str, ok: bool) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Error::invalid_value(
                &self.spec.id,
                format!("{} is {}, not {wanted}", self.spec.id, self.spec.kind),
            ))
        }
    }

    /// Set occurrence 0 of a numeric or real element from decimal text
    ///
    /// For numerics the value is scaled by the implied decimal count and
    /// rounded half away from zero.
    ///
    /// # Errors
    ///
    /// Fails for non-numeric kinds or text that is not a decimal number.
    pub fn set_formatted(&mut self, text: &str) -> Result<()> {
        let value = real::parse_decimal(text)
            .ok_or_else(|| Error::invalid_value(&self.spec.id, format!("'{text}' is not a number")))?;
        self.set_decimal(value)
    }

    /// Set occurrence 0 from a decimal value
    ///
    /// # Errors
    ///
    /// Fails for non-numeric kinds or values that do not fit.
    pub fn set_decimal(&mut self, value: Decimal) -> Result<()> {
        match self.spec.kind {
            ElementKind::Numeric { decimals } => {
                let text = numeric::from_decimal(&self.spec, value, decimals)?;
                self.set(&text)
            }
            ElementKind::Real => {
                let previous = match self.slots.first() {
                    Some(Some(Stored::Real {
                        fraction_digits, ..
                    })) => Some(*fraction_digits),
                    _ => None,
                };
                let text = real::format(value, previous, self.spec.preserve_precision);
                self.set(&text)
            }
            _ => self.require_kind("numeric or real", false),
        }
    }

    /// Occurrence 0 as a decimal value
    #[must_use]
    pub fn decimal(&self) -> Option<Decimal> {
        self.decimal_at(0)
    }

    /// Occurrence `index` as a decimal value
    #[must_use]
    pub fn decimal_at(&self, index: usize) -> Option<Decimal> {
        match (self.spec.kind, self.slots.get(index)?.as_ref()?) {
            (ElementKind::Numeric { decimals }, Stored::Text(text)) => {
                numeric::to_decimal(text, decimals)
            }
            (ElementKind::Real, Stored::Real { text, .. }) => real::parse_decimal(text),
            _ => None,
        }
    }

    /// Occurrence 0 rendered with an explicit decimal point
    #[must_use]
    pub fn get_formatted(&self) -> Option<String> {
        match (self.spec.kind, self.slots.first()?.as_ref()?) {
            (ElementKind::Real, Stored::Real {
                text,
                fraction_digits,
            }) => real::parse_decimal(text).map(|value| {
                real::format(value, Some(*fraction_digits), self.spec.preserve_precision)
            }),
            _ => self.decimal().map(|d| d.to_string()),
        }
    }

    /// Occurrence 0 as a calendar date (two-digit years windowed at 50)
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        match (self.spec.kind, self.slots.first()?.as_ref()?) {
            (ElementKind::Date, Stored::Text(text)) => date::parse(text),
            _ => None,
        }
    }

    /// Set occurrence 0 from a calendar date
    ///
    /// # Errors
    ///
    /// Fails for non-date kinds.
    pub fn set_date(&mut self, value: NaiveDate) -> Result<()> {
        self.require_kind("a date", self.spec.kind == ElementKind::Date)?;
        let text = date::format(&self.spec, value);
        self.set(&text)
    }

    /// Occurrence 0 as a time of day
    #[must_use]
    pub fn time(&self) -> Option<NaiveTime> {
        match (self.spec.kind, self.slots.first()?.as_ref()?) {
            (ElementKind::Time, Stored::Text(text)) => time::parse(text),
            _ => None,
        }
    }

    /// Set occurrence 0 from a time of day
    ///
    /// # Errors
    ///
    /// Fails for non-time kinds.
    pub fn set_time(&mut self, value: NaiveTime) -> Result<()> {
        self.require_kind("a time", self.spec.kind == ElementKind::Time)?;
        let text = time::format(&self.spec, value);
        self.set(&text)
    }

    /// Occurrence 0 as raw bytes
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match self.slots.first()?.as_ref()? {
            Stored::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Set occurrence 0 from raw bytes
    ///
    /// # Errors
    ///
    /// Fails for non-binary kinds.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.require_kind("binary", self.spec.kind == ElementKind::Binary)?;
        self.slots.clear();
        self.slots.push(Some(Stored::Bytes(bytes.to_vec())));
        self.cursor = Some(0);
        Ok(())
    }

    /// Description of occurrence 0 from the code list
    #[must_use]
    pub fn describe(&self) -> Option<String> {
        let list = self.spec.code_list.as_ref()?;
        let raw = self.raw_at(0)?;
        list.describe(raw.trim_end())
    }
}

impl PartialEq for DataElement {
    fn eq(&self, other: &Self) -> bool {
        self.spec.id == other.spec.id && self.values() == other.values()
    }
}

impl fmt::Debug for DataElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataElement")
            .field("id", &self.spec.id)
            .field("kind", &self.spec.kind)
            .field("values", &self.values())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// A field of a segment: scalar or composite
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Simple data element
    Data(DataElement),
    /// Composite element
    Composite(CompositeElement),
}

impl Field {
    /// Reference designator of the field
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Field::Data(element) => element.id(),
            Field::Composite(composite) => composite.id(),
        }
    }

    /// Whether the field carries any data
    #[must_use]
    pub fn has_content(&self) -> bool {
        match self {
            Field::Data(element) => element.has_content(),
            Field::Composite(composite) => composite.has_content(),
        }
    }

    /// Semantic check of the field
    pub fn validate_into(&self, ctx: &ElementContext, errors: &mut DocumentErrors) {
        match self {
            Field::Data(element) => element.validate_into(ctx, errors),
            Field::Composite(composite) => composite.validate_into(ctx, errors),
        }
    }

    /// Borrow as a scalar element
    #[must_use]
    pub fn as_data(&self) -> Option<&DataElement> {
        match self {
            Field::Data(element) => Some(element),
            Field::Composite(_) => None,
        }
    }

    /// Borrow as a composite
    #[must_use]
    pub fn as_composite(&self) -> Option<&CompositeElement> {
        match self {
            Field::Composite(composite) => Some(composite),
            Field::Data(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codelist::InMemoryCodeList;

    fn element(kind: ElementKind) -> DataElement {
        DataElement::new(Arc::new(ElementSpec::new("TST01", kind).length(1, 10)))
    }

    fn repeating(limit: usize) -> DataElement {
        DataElement::new(Arc::new(
            ElementSpec::new("TST02", ElementKind::Char)
                .length(1, 10)
                .occurs(Occurs::Bounded(limit)),
        ))
    }

    #[test]
    fn test_parse_kind_codes() {
        assert_eq!("AN".parse::<ElementKind>().unwrap(), ElementKind::Char);
        assert_eq!(
            "N2".parse::<ElementKind>().unwrap(),
            ElementKind::Numeric { decimals: 2 }
        );
        assert_eq!(
            "N".parse::<ElementKind>().unwrap(),
            ElementKind::Numeric { decimals: 0 }
        );
        assert!("N12".parse::<ElementKind>().is_err());
        assert!("XX".parse::<ElementKind>().is_err());
        assert_eq!(ElementKind::Numeric { decimals: 4 }.code(), "N4");
    }

    #[test]
    fn test_set_resets_cursor() {
        let mut el = repeating(3);
        el.set("A").unwrap();
        el.set_next("B").unwrap();
        assert_eq!(el.cursor(), Some(1));
        el.set("C").unwrap();
        assert_eq!(el.cursor(), Some(0));
        assert_eq!(el.values(), vec!["C".to_string()]);
    }

    #[test]
    fn test_set_next_fills_in_order() {
        let mut el = repeating(3);
        el.set_next("A").unwrap();
        el.set_next("B").unwrap();
        el.set_next("C").unwrap();
        assert_eq!(el.values(), vec!["A", "B", "C"]);
        assert_eq!(el.occurrences(), 3);
    }

    #[test]
    fn test_set_next_wraps_modulo_occurs() {
        let mut el = repeating(2);
        el.set("A").unwrap();
        el.set_next("B").unwrap();
        el.set_next("C").unwrap();
        assert_eq!(el.cursor(), Some(0));
        assert_eq!(el.values(), vec!["C", "B"]);
    }

    #[test]
    fn test_char_pads_to_min() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("ISA02", ElementKind::Char).length(10, 10),
        ));
        el.set("ABC").unwrap();
        assert_eq!(el.get().as_deref(), Some("ABC       "));
        assert_eq!(el.raw_at(0).as_deref(), Some("ABC"));
    }

    #[test]
    fn test_required_missing() {
        let el = DataElement::new(Arc::new(ElementSpec::new("BEG01", ElementKind::Id).required()));
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.as_slice()[0].code,
            ErrorCode::MandatoryElementMissing
        );
        assert_eq!(errors.as_slice()[0].severity, Severity::Integrity);
    }

    #[test]
    fn test_length_bounds() {
        let mut el = element(ElementKind::Char);
        el.set("ABCDEFGHIJKL").unwrap();
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::ElementTooLong);
    }

    #[test]
    fn test_unused_element_present() {
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("N104", ElementKind::Char).unused(),
        ));
        el.set("X").unwrap();
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::UnusedElementPresent);
        assert_eq!(errors.as_slice()[0].severity, Severity::Requirement);
    }

    #[test]
    fn test_id_against_code_list() {
        let list = Arc::new(InMemoryCodeList::with_codes("128", ["BT", "PO"]));
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("REF01", ElementKind::Id)
                .length(2, 3)
                .codes(list),
        ));
        el.set("BT").unwrap();
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert!(errors.is_empty());

        el.set("XX").unwrap();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::InvalidCodeValue);
    }

    #[test]
    fn test_custom_check_runs_after_builtin() {
        let check: ElementCheck = Arc::new(|el: &DataElement| {
            (el.raw_at(0).as_deref() == Some("BAD")).then(|| "BAD is reserved".to_string())
        });
        let mut el = DataElement::new(Arc::new(
            ElementSpec::new("TST01", ElementKind::Char).check(check),
        ));
        el.set("BAD").unwrap();
        let mut errors = DocumentErrors::new();
        el.validate_into(&ElementContext::default(), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::CustomCheckFailed);
        assert_eq!(errors.as_slice()[0].message, "BAD is reserved");
    }

    #[test]
    fn test_error_context_is_attached() {
        let el = DataElement::new(Arc::new(ElementSpec::new("N101", ElementKind::Id).required()));
        let mut errors = DocumentErrors::new();
        let ctx = ElementContext::field(ContainerId(7), 4, 1);
        el.validate_into(&ctx, &mut errors);
        let error = &errors.as_slice()[0];
        assert_eq!(error.position, 4);
        assert_eq!(error.container, Some(ContainerId(7)));
        assert_eq!(
            error.offender,
            Some(Offender::Element {
                segment: ContainerId(7),
                field: 1,
                component: None,
                occurrence: 0
            })
        );
    }

    #[test]
    fn test_fixed_width() {
        let mut amount = DataElement::new(Arc::new(
            ElementSpec::new("AMT", ElementKind::Numeric { decimals: 2 }).length(1, 10),
        ));
        amount.set("1234").unwrap();
        assert_eq!(amount.fixed_width(), "0000001234");

        let mut name = DataElement::new(Arc::new(
            ElementSpec::new("NAME", ElementKind::Char).length(1, 8),
        ));
        name.set("ACME").unwrap();
        assert_eq!(name.fixed_width(), "ACME    ");
    }

    #[test]
    fn test_kind_mismatch() {
        let mut el = element(ElementKind::Char);
        assert!(el.set_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_err());
        assert!(el.set_formatted("1.5").is_err());
        assert!(el.set_bytes(b"x").is_err());
    }
}
