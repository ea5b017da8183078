//! CSV output: one row per value

use crate::{Error, Result};
use edi_ir::{ContainerId, Field};
use edi_parser::Document;
use tracing::{debug, trace};

const HEADER: [&str; 8] = [
    "path",
    "ordinal",
    "segment",
    "field",
    "component",
    "occurrence",
    "element",
    "value",
];

/// Flattens a document into rows of
/// `path, ordinal, segment, field, component, occurrence, element, value`
#[derive(Debug, Clone, Copy)]
pub struct CsvWriter {
    delimiter: u8,
    has_header: bool,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWriter {
    /// Comma separated, with a header row
    #[must_use]
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }

    /// Set delimiter character
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Configure header writing
    #[must_use]
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Rows without the header
    #[must_use]
    pub fn rows(&self, doc: &Document) -> Vec<[String; 8]> {
        let mut rows = Vec::new();
        for segment in doc.segments(doc.root()) {
            let path = path_of(doc, segment);
            let container = doc.container(segment);
            let ordinal = container.position.segment.to_string();
            for (position, field) in container.fields() {
                let mut row = |component: String, occurrence: usize, element: &str, value: String| {
                    rows.push([
                        path.clone(),
                        ordinal.clone(),
                        container.id().to_string(),
                        position.to_string(),
                        component,
                        occurrence.to_string(),
                        element.to_string(),
                        value,
                    ]);
                };
                match field {
                    Field::Data(element) => {
                        for (occurrence, value) in element.values().into_iter().enumerate() {
                            if !value.is_empty() {
                                row(String::new(), occurrence, element.id(), value);
                            }
                        }
                    }
                    Field::Composite(composite) => {
                        for occurrence in 0..composite.occurrence_count() {
                            for spec in &composite.spec().components {
                                let Ok(component) = composite.component_at(occurrence, spec.sequence) else {
                                    continue;
                                };
                                let value = component.get().unwrap_or_default();
                                if !value.is_empty() {
                                    row(spec.sequence.to_string(), occurrence, component.id(), value);
                                }
                            }
                        }
                    }
                }
            }
            trace!(segment = %container.id(), "Flattened segment");
        }
        rows
    }

    /// Render the document as CSV text
    ///
    /// # Errors
    ///
    /// Fails when the CSV writer fails.
    pub fn write(&self, doc: &Document) -> Result<String> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        if self.has_header {
            csv_writer.write_record(HEADER)?;
        }
        let rows = self.rows(doc);
        for row in &rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        debug!(record_count = rows.len(), "Finished writing CSV");

        let bytes = csv_writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Container ids from the root down to `id`, joined with `/`
fn path_of(doc: &Document, id: ContainerId) -> String {
    doc.path(id)
        .into_iter()
        .map(|c| doc.container(c).id().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ContainerType, ElementKind, ElementSpec, Occurs};
    use edi_schema::NodeSpec;
    use std::sync::Arc;

    fn document() -> Document {
        let tree = NodeSpec::envelope("INT")
            .child(
                NodeSpec::segment("N1")
                    .field(ElementSpec::new("N101", ElementKind::Id))
                    .field(ElementSpec::new("N102", ElementKind::Char).occurs(Occurs::Bounded(2)))
                    .child(
                        NodeSpec::composite("C001")
                            .field(ElementSpec::new("C00101", ElementKind::Char))
                            .field(ElementSpec::new("C00102", ElementKind::Char)),
                    ),
            )
            .build("csv")
            .unwrap();
        let mut doc = Document::new(Arc::new(tree));
        let root = doc.root();
        let n1 = doc.append(root, ContainerType::Segment, "N1").unwrap();
        doc.set_value(n1, 1, "ST").unwrap();
        if let Field::Data(element) = doc.field_mut(n1, 2).unwrap() {
            element.set_next("ACME, Inc.").unwrap();
            element.set_next("Dock 4").unwrap();
        }
        doc.set_component(n1, 3, 2, "B").unwrap();
        doc
    }

    #[test]
    fn test_rows() {
        let rows = CsvWriter::new().rows(&document());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], "INT/N1");
        assert_eq!(rows[0][6], "N101");
        assert_eq!(rows[2][5], "1");
        assert_eq!(rows[3][4], "2");
        assert_eq!(rows[3][7], "B");
    }

    #[test]
    fn test_csv_quotes_commas() {
        let csv = CsvWriter::new().write(&document()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "path,ordinal,segment,field,component,occurrence,element,value");
        assert!(lines[2].ends_with(",N102,\"ACME, Inc.\""));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_tab_delimited_without_header() {
        let csv = CsvWriter::new()
            .with_delimiter(b'\t')
            .has_header(false)
            .write(&document())
            .unwrap();
        assert!(csv.starts_with("INT/N1\t"));
    }
}
