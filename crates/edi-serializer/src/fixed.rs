//! Fixed-width ACH output
//!
//! Every record is the concatenation of its template fields, each padded
//! to the element's maximum length. Numeric fields are right-aligned and
//! zero-filled; everything else is left-aligned and space-filled.

use crate::Result;
use edi_dialect::ach::RECORD_LENGTH;
use edi_ir::{ContainerId, DataElement, Field};
use edi_parser::Document;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records per block in a blocked ACH file
pub const BLOCKING_FACTOR: usize = 10;

/// Writes documents as 94-character records
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthWriter {
    line_breaks: bool,
    blocked: bool,
}

impl Default for FixedWidthWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedWidthWriter {
    /// Newline after each record, no block filler
    #[must_use]
    pub fn new() -> Self {
        Self {
            line_breaks: true,
            blocked: false,
        }
    }

    #[must_use]
    pub fn line_breaks(mut self, line_breaks: bool) -> Self {
        self.line_breaks = line_breaks;
        self
    }

    /// Pad the file with all-`9` filler records to a multiple of ten
    #[must_use]
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    /// One record without line ending
    #[must_use]
    pub fn record(&self, doc: &Document, segment: ContainerId) -> String {
        let container = doc.container(segment);
        let mut record = String::with_capacity(RECORD_LENGTH);
        for slot in doc.template().node(container.template).fields() {
            match container.field(slot.spec.sequence()) {
                Some(field) => push_field(field, &mut record),
                None => push_field(&slot.spec.instantiate(), &mut record),
            }
        }

        let length = record.chars().count();
        if length < RECORD_LENGTH {
            record.extend(std::iter::repeat_n(' ', RECORD_LENGTH - length));
        } else if length > RECORD_LENGTH {
            warn!(
                record = %container.id(),
                length,
                "Template fields exceed the ACH record length"
            );
        }
        record
    }

    /// Write the whole document
    ///
    /// # Errors
    ///
    /// Infallible today; returns `Result` to match the other writers.
    pub fn write(&self, doc: &Document) -> Result<String> {
        let mut records: Vec<String> = doc
            .segments(doc.root())
            .into_iter()
            .map(|segment| self.record(doc, segment))
            .collect();

        if self.blocked {
            let filler = records.len().next_multiple_of(BLOCKING_FACTOR) - records.len();
            records.extend(std::iter::repeat_n("9".repeat(RECORD_LENGTH), filler));
        }
        debug!(records = records.len(), blocked = self.blocked, "Wrote fixed-width document");

        let mut out = String::with_capacity(records.len() * (RECORD_LENGTH + 1));
        for record in &records {
            out.push_str(record);
            if self.line_breaks {
                out.push('\n');
            }
        }
        Ok(out)
    }
}

fn push_field(field: &Field, record: &mut String) {
    match field {
        Field::Data(element) => record.push_str(&element.fixed_width()),
        Field::Composite(composite) => {
            for spec in &composite.spec().components {
                let text = composite
                    .component(spec.sequence)
                    .map_or_else(|_| DataElement::new(Arc::clone(spec)).fixed_width(), DataElement::fixed_width);
                record.push_str(&text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ContainerType, ElementKind, ElementSpec};
    use edi_schema::NodeSpec;

    fn template() -> NodeSpec {
        NodeSpec::envelope("ACH")
            .child(
                NodeSpec::segment("1")
                    .field(ElementSpec::new("RECORD_TYPE", ElementKind::Id).length(1, 1))
                    .field(ElementSpec::new("PRIORITY", ElementKind::Numeric { decimals: 0 }).length(2, 2))
                    .field(ElementSpec::new("DESTINATION", ElementKind::Char).length(1, 10))
                    .field(ElementSpec::new("REST", ElementKind::Char).length(1, 81)),
            )
            .child(
                NodeSpec::segment("9")
                    .field(ElementSpec::new("RECORD_TYPE", ElementKind::Id).length(1, 1))
                    .field(ElementSpec::new("BATCHES", ElementKind::Numeric { decimals: 0 }).length(6, 6)),
            )
    }

    fn document() -> Document {
        let mut doc = Document::new(Arc::new(template().build("ach").unwrap()));
        let root = doc.root();
        let header = doc.append(root, ContainerType::Segment, "1").unwrap();
        doc.set_value(header, 1, "1").unwrap();
        doc.set_value(header, 2, "1").unwrap();
        doc.set_value(header, 3, "091000019").unwrap();
        let control = doc.append(root, ContainerType::Segment, "9").unwrap();
        doc.set_value(control, 1, "9").unwrap();
        doc.set_value(control, 2, "1").unwrap();
        doc
    }

    #[test]
    fn test_records_are_padded() {
        let out = FixedWidthWriter::new().write(&document()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == RECORD_LENGTH));
        assert!(lines[0].starts_with("101091000019 "));
        assert!(lines[1].starts_with("9000001 "));
    }

    #[test]
    fn test_blocking_adds_filler() {
        let out = FixedWidthWriter::new().blocked(true).write(&document()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), BLOCKING_FACTOR);
        assert_eq!(lines[9], "9".repeat(RECORD_LENGTH));
    }

    #[test]
    fn test_without_line_breaks() {
        let out = FixedWidthWriter::new().line_breaks(false).write(&document()).unwrap();
        assert_eq!(out.len(), 2 * RECORD_LENGTH);
    }
}
