//! Placeholder-delimited rendering
//!
//! Segments are rendered with characters from the Unicode private use area
//! in place of delimiters. The real delimiter set is applied afterwards by
//! [`Substitution`](crate::Substitution), which is the only place data is
//! inspected for collisions.

use crate::{Error, Result};
use edi_dialect::Delimiters;
use edi_ir::{ContainerId, Field};
use edi_parser::Document;
use tracing::{debug, trace};

/// Segment terminator placeholder
pub const SEGMENT: char = '\u{E000}';
/// Field separator placeholder
pub const FIELD: char = '\u{E001}';
/// Component separator placeholder
pub const COMPONENT: char = '\u{E002}';
/// Repetition separator placeholder
pub const REPEAT: char = '\u{E003}';
/// Tag separator placeholder (TRADACOMS)
pub const TAG: char = '\u{E004}';

/// Whether `c` is one of the placeholder delimiters
#[must_use]
pub fn is_placeholder(c: char) -> bool {
    (SEGMENT..=TAG).contains(&c)
}

/// The placeholder set as a [`Delimiters`] value
#[must_use]
pub fn placeholders(tagged: bool) -> Delimiters {
    Delimiters {
        segment: SEGMENT,
        field: FIELD,
        component: COMPONENT,
        repeat: Some(REPEAT),
        release: None,
        tag: tagged.then_some(TAG),
        decimal: '.',
    }
}

/// Renders segments with placeholder delimiters
#[derive(Debug, Clone, Copy, Default)]
pub struct PrebuildWriter {
    tagged: bool,
}

impl PrebuildWriter {
    /// `tagged` separates the segment tag with [`TAG`] instead of [`FIELD`]
    #[must_use]
    pub fn new(tagged: bool) -> Self {
        Self { tagged }
    }

    /// One segment, terminator included
    ///
    /// Fields after the last one holding data are left out, as are
    /// trailing empty repetitions.
    ///
    /// # Errors
    ///
    /// Fails when a value already contains a placeholder character.
    pub fn segment(&self, doc: &Document, segment: ContainerId) -> Result<String> {
        let container = doc.container(segment);
        let mut out = String::from(container.id());
        let last = container.last_field();
        if last > 0 {
            out.push(if self.tagged { TAG } else { FIELD });
        }
        for position in 1..=last {
            if position > 1 {
                out.push(FIELD);
            }
            if let Some(field) = container.field(position) {
                render_field(field, &mut out)?;
            }
        }
        out.push(SEGMENT);
        trace!(segment = %container.id(), fields = last, "Prebuilt segment");
        Ok(out)
    }

    /// Every segment of the document in order
    ///
    /// # Errors
    ///
    /// Fails when a value contains a placeholder character.
    pub fn segments(&self, doc: &Document) -> Result<Vec<String>> {
        doc.segments(doc.root())
            .into_iter()
            .map(|segment| self.segment(doc, segment))
            .collect()
    }

    /// The whole document as one placeholder-delimited string
    ///
    /// # Errors
    ///
    /// Fails when a value contains a placeholder character.
    pub fn write(&self, doc: &Document) -> Result<String> {
        let segments = self.segments(doc)?;
        debug!(segments = segments.len(), "Prebuilt document");
        Ok(segments.concat())
    }
}

fn render_field(field: &Field, out: &mut String) -> Result<()> {
    let repetitions = match field {
        Field::Data(element) => {
            let values = element.values();
            for value in &values {
                reject_placeholders(element.id(), value)?;
            }
            values
        }
        Field::Composite(composite) => {
            let mut repetitions = Vec::with_capacity(composite.occurrence_count());
            for occurrence in 0..composite.occurrence_count() {
                let components = composite.values_at(occurrence);
                for component in &components {
                    reject_placeholders(composite.id(), component)?;
                }
                repetitions.push(components.join(&COMPONENT.to_string()));
            }
            repetitions
        }
    };
    let used = repetitions
        .iter()
        .rposition(|r| !r.is_empty())
        .map_or(0, |last| last + 1);
    out.push_str(&repetitions[..used].join(&REPEAT.to_string()));
    Ok(())
}

fn reject_placeholders(id: &str, value: &str) -> Result<()> {
    match value.chars().find(|c| is_placeholder(*c)) {
        Some(character) => Err(Error::PlaceholderInData {
            id: id.to_string(),
            character,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ContainerType, ElementKind, ElementSpec, Occurs};
    use edi_schema::NodeSpec;
    use std::sync::Arc;

    fn document() -> (Document, ContainerId) {
        let tree = NodeSpec::envelope("DEMO")
            .child(
                NodeSpec::segment("REF")
                    .field(ElementSpec::new("REF01", ElementKind::Id).length(2, 3))
                    .field(
                        ElementSpec::new("REF02", ElementKind::Char)
                            .occurs(Occurs::Bounded(3)),
                    )
                    .child(
                        NodeSpec::composite("C040")
                            .occurs(Occurs::Bounded(2))
                            .field(ElementSpec::new("C04001", ElementKind::Id))
                            .field(ElementSpec::new("C04002", ElementKind::Char)),
                    )
                    .field(ElementSpec::new("REF04", ElementKind::Char)),
            )
            .build("demo")
            .unwrap();
        let mut doc = Document::new(Arc::new(tree));
        let root = doc.root();
        let segment = doc.append(root, ContainerType::Segment, "REF").unwrap();
        (doc, segment)
    }

    fn readable(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                SEGMENT => '~',
                FIELD => '*',
                COMPONENT => ':',
                REPEAT => '^',
                TAG => '=',
                other => other,
            })
            .collect()
    }

    #[test]
    fn test_trailing_fields_dropped() {
        let (mut doc, segment) = document();
        doc.set_value(segment, 1, "DP").unwrap();
        let text = PrebuildWriter::new(false).segment(&doc, segment).unwrap();
        assert_eq!(readable(&text), "REF*DP~");
    }

    #[test]
    fn test_empty_middle_fields_kept() {
        let (mut doc, segment) = document();
        doc.set_value(segment, 1, "DP").unwrap();
        doc.set_value(segment, 4, "X").unwrap();
        let text = PrebuildWriter::new(false).segment(&doc, segment).unwrap();
        assert_eq!(readable(&text), "REF*DP***X~");
    }

    #[test]
    fn test_repeats_and_components() {
        let (mut doc, segment) = document();
        doc.set_value(segment, 1, "DP").unwrap();
        if let Field::Data(element) = doc.field_mut(segment, 2).unwrap() {
            element.set_next("A").unwrap();
            element.set_next("B").unwrap();
        }
        doc.set_component(segment, 3, 1, "ZZ").unwrap();
        doc.set_component(segment, 3, 2, "V").unwrap();
        let text = PrebuildWriter::new(false).segment(&doc, segment).unwrap();
        assert_eq!(readable(&text), "REF*DP*A^B*ZZ:V~");
    }

    #[test]
    fn test_tagged_segment() {
        let (mut doc, segment) = document();
        doc.set_value(segment, 1, "DP").unwrap();
        let text = PrebuildWriter::new(true).segment(&doc, segment).unwrap();
        assert_eq!(readable(&text), "REF=DP~");
    }

    #[test]
    fn test_segment_without_data() {
        let (doc, segment) = document();
        let text = PrebuildWriter::new(false).segment(&doc, segment).unwrap();
        assert_eq!(readable(&text), "REF~");
    }

    #[test]
    fn test_placeholder_in_data_rejected() {
        let (mut doc, segment) = document();
        doc.set_value(segment, 4, "A\u{E001}B").unwrap();
        let err = PrebuildWriter::new(false).write(&doc).unwrap_err();
        assert!(matches!(err, Error::PlaceholderInData { ref id, .. } if id == "REF04"));
    }

    #[test]
    fn test_placeholder_set() {
        let set = placeholders(true);
        assert_eq!(set.tag, Some(TAG));
        assert!(set.specials().iter().all(|c| is_placeholder(*c)));
        assert!(!is_placeholder('~'));
    }
}
