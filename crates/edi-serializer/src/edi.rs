//! Delimited EDI output for X12, EDIFACT and TRADACOMS

use crate::config::WriterConfig;
use crate::pipe;
use crate::prebuild::{FIELD, PrebuildWriter, SEGMENT};
use crate::substitute::Substitution;
use crate::{Error, Result};
use edi_dialect::{Delimiters, Dialect};
use edi_parser::Document;
use tracing::{debug, info};

/// ISA11, the repetition separator from version 00402 on
const ISA_REPEAT: usize = 11;
/// ISA16, the component separator
const ISA_COMPONENT: usize = 16;

/// Writes a document in its delimited wire form
#[derive(Debug, Clone, Default)]
pub struct EdiWriter {
    config: WriterConfig,
}

impl EdiWriter {
    #[must_use]
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Delimiters the output is written with
    #[must_use]
    pub fn delimiters(&self) -> Delimiters {
        self.config.resolved_delimiters()
    }

    /// Write `doc` synchronously
    ///
    /// # Errors
    ///
    /// Fails for ACH, which is not delimited, and when data collides with a
    /// delimiter that cannot be escaped.
    pub fn write(&self, doc: &Document) -> Result<String> {
        let (preamble, segments) = self.prepare(doc)?;
        let mut substitution = Substitution::new(self.delimiters(), self.config.line_breaks);
        let mut out = preamble;
        for segment in &segments {
            substitution.push(segment, &mut out)?;
        }
        info!(
            dialect = %self.config.dialect,
            segments = substitution.segments(),
            bytes = out.len(),
            "Wrote document"
        );
        Ok(out)
    }

    /// Write `doc` with the substitution pass on a worker task
    ///
    /// # Errors
    ///
    /// Same conditions as [`EdiWriter::write`], plus a stopped worker.
    pub async fn write_piped(&self, doc: &Document) -> Result<String> {
        let (preamble, segments) = self.prepare(doc)?;
        let substitution = Substitution::new(self.delimiters(), self.config.line_breaks);
        let body = pipe::substitute_all(substitution, segments, self.config.pipe_capacity).await?;
        info!(dialect = %self.config.dialect, bytes = preamble.len() + body.len(), "Wrote document through pipe");
        Ok(preamble + &body)
    }

    /// Leading text plus prebuilt segments, ready for substitution
    fn prepare(&self, doc: &Document) -> Result<(String, Vec<String>)> {
        let dialect = self.config.dialect;
        if dialect == Dialect::Ach {
            return Err(Error::NotDelimited(dialect));
        }
        let delimiters = self.delimiters();
        let mut segments = PrebuildWriter::new(dialect == Dialect::Tradacoms).segments(doc)?;

        if dialect == Dialect::X12 {
            if let Some(isa) = segments.first_mut().filter(|s| s.starts_with("ISA")) {
                *isa = stamp_isa(isa, &delimiters);
            }
        }

        let preamble = match dialect {
            Dialect::Edifact | Dialect::Tradacoms
                if self.config.emit_una || !same_service_chars(&delimiters) =>
            {
                debug!(una = %delimiters.to_una(), "Emitting service string advice");
                let mut una = delimiters.to_una();
                if self.config.line_breaks && delimiters.segment != '\n' {
                    una.push('\n');
                }
                una
            }
            _ => String::new(),
        };
        Ok((preamble, segments))
    }
}

/// Whether `d` uses the EDIFACT default service characters
fn same_service_chars(d: &Delimiters) -> bool {
    let defaults = Delimiters::edifact();
    d.segment == defaults.segment
        && d.field == defaults.field
        && d.component == defaults.component
        && d.release == defaults.release
        && d.decimal == defaults.decimal
        && d.repeat.is_none()
}

/// Rewrite the ISA fields that declare delimiters to match `delimiters`
///
/// ISA11 is only touched when it already holds a separator rather than the
/// older `U` standards identifier.
fn stamp_isa(isa: &str, delimiters: &Delimiters) -> String {
    let body = isa.strip_suffix(SEGMENT).unwrap_or(isa);
    let mut fields: Vec<String> = body.split(FIELD).map(str::to_string).collect();

    if let Some(component) = fields.get_mut(ISA_COMPONENT) {
        *component = delimiters.component.to_string();
    }
    if let (Some(value), Some(repeat)) = (fields.get_mut(ISA_REPEAT), delimiters.repeat) {
        let mut chars = value.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_ascii_alphanumeric() {
                *value = repeat.to_string();
            }
        }
    }

    let mut out = fields.join(&FIELD.to_string());
    out.push(SEGMENT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ContainerType, ElementKind, ElementSpec};
    use edi_schema::NodeSpec;
    use std::sync::Arc;

    fn isa_document(isa11: &str) -> Document {
        let isa = (1..=16).fold(NodeSpec::segment("ISA"), |node, n| {
            node.field(ElementSpec::new(format!("ISA{n:02}"), ElementKind::Char).length(1, 15))
        });
        let tree = NodeSpec::envelope("INT")
            .child(isa)
            .child(NodeSpec::segment("NTE").field(ElementSpec::new("NTE01", ElementKind::Char)))
            .build("isa")
            .unwrap();
        let mut doc = Document::new(Arc::new(tree));
        let root = doc.root();
        let isa = doc.append(root, ContainerType::Segment, "ISA").unwrap();
        for n in 1..=16 {
            let value = match n {
                11 => isa11,
                16 => ":",
                _ => "00",
            };
            doc.set_value(isa, n, value).unwrap();
        }
        let nte = doc.append(root, ContainerType::Segment, "NTE").unwrap();
        doc.set_value(nte, 1, "A:B").unwrap();
        doc
    }

    #[test]
    fn test_x12_defaults() {
        let doc = isa_document("^");
        let err = EdiWriter::new(WriterConfig::for_dialect(Dialect::X12))
            .write(&doc)
            .unwrap_err();
        // NTE01 carries the component separator, which X12 cannot escape
        assert!(matches!(err, Error::Collision { ref segment, .. } if segment == "NTE"));
    }

    #[test]
    fn test_custom_delimiters_restamp_isa() {
        let doc = isa_document("^");
        let custom = Delimiters {
            segment: '\n',
            field: '|',
            component: '>',
            repeat: Some('!'),
            ..Delimiters::x12()
        };
        let config = WriterConfig::for_dialect(Dialect::X12).with_delimiters(custom);
        let out = EdiWriter::new(config).write(&doc).unwrap();
        let isa = out.lines().next().unwrap();
        assert_eq!(isa.split('|').nth(11), Some("!"));
        assert!(isa.ends_with("|>"));
        assert_eq!(out.lines().nth(1), Some("NTE|A:B"));
    }

    #[test]
    fn test_isa11_letter_is_kept() {
        let doc = isa_document("U");
        let custom = Delimiters {
            component: '>',
            ..Delimiters::x12()
        };
        let config = WriterConfig::for_dialect(Dialect::X12).with_delimiters(custom);
        let out = EdiWriter::new(config).write(&doc).unwrap();
        assert_eq!(out.split('*').nth(11), Some("U"));
    }

    #[test]
    fn test_ach_is_not_delimited() {
        let doc = isa_document("^");
        let err = EdiWriter::new(WriterConfig::for_dialect(Dialect::Ach))
            .write(&doc)
            .unwrap_err();
        assert!(matches!(err, Error::NotDelimited(Dialect::Ach)));
    }

    #[test]
    fn test_una_preamble() {
        let doc = isa_document("^");
        let config = WriterConfig::for_dialect(Dialect::Edifact).with_una(true);
        let out = EdiWriter::new(config).write(&doc).unwrap();
        assert!(out.starts_with("UNA:+.? 'ISA+"));
        assert!(out.ends_with("NTE+A?:B'"));
    }

    #[tokio::test]
    async fn test_piped_write_matches() {
        let doc = isa_document("^");
        let writer = EdiWriter::new(WriterConfig::for_dialect(Dialect::Edifact).with_line_breaks(true));
        let piped = writer.write_piped(&doc).await.unwrap();
        assert_eq!(piped, writer.write(&doc).unwrap());
    }
}
