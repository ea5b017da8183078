//! XML presentation outputs
//!
//! [`XmlWriter`] mirrors the runtime tree: one element per container and
//! one per field occurrence. [`ValidatingXmlWriter`] adds template
//! metadata and input positions to every node, attaches error records to
//! the node they point at and closes with an `<errors>` summary. Neither
//! output is read back by the parser.

use crate::Result;
use edi_ir::{
    CompositeElement, ContainerId, ContainerType, DataElement, DocumentError, DocumentErrors,
    ElementSpec, Field, Offender,
};
use edi_parser::Document;
use edi_schema::FieldSpec;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use tracing::debug;

const INDENT: usize = 2;

/// Plain XML rendering of a document
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlWriter;

impl XmlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    ///
    /// Fails when the XML writer fails.
    pub fn write(&self, doc: &Document) -> Result<String> {
        Render::plain(doc).run()
    }
}

/// XML annotated with template metadata, positions and error records
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatingXmlWriter;

impl ValidatingXmlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    ///
    /// Fails when the XML writer fails.
    pub fn write(&self, doc: &Document, errors: &DocumentErrors) -> Result<String> {
        Render::annotated(doc, errors).run()
    }
}

fn tag(kind: ContainerType) -> &'static str {
    match kind {
        ContainerType::Envelope => "envelope",
        ContainerType::FunctionalGroup => "group",
        ContainerType::TransactionSet => "transaction",
        ContainerType::Table => "table",
        ContainerType::Loop => "loop",
        ContainerType::Segment => "segment",
        ContainerType::CompositeElement => "composite",
        ContainerType::DataElement => "element",
    }
}

struct Render<'a> {
    doc: &'a Document,
    errors: Option<&'a DocumentErrors>,
    by_container: HashMap<ContainerId, Vec<&'a DocumentError>>,
    by_field: HashMap<(ContainerId, usize), Vec<&'a DocumentError>>,
}

impl<'a> Render<'a> {
    fn plain(doc: &'a Document) -> Self {
        Self {
            doc,
            errors: None,
            by_container: HashMap::new(),
            by_field: HashMap::new(),
        }
    }

    fn annotated(doc: &'a Document, errors: &'a DocumentErrors) -> Self {
        let mut by_container: HashMap<ContainerId, Vec<&DocumentError>> = HashMap::new();
        let mut by_field: HashMap<(ContainerId, usize), Vec<&DocumentError>> = HashMap::new();
        for error in errors.iter() {
            match (error.offender, error.container) {
                (Some(Offender::Element { segment, field, .. }), _) => {
                    by_field.entry((segment, field)).or_default().push(error);
                }
                (Some(Offender::Container(id)), _) | (Some(Offender::Token { .. }) | None, Some(id)) => {
                    by_container.entry(id).or_default().push(error);
                }
                (Some(Offender::Token { .. }) | None, None) => {}
            }
        }
        Self {
            doc,
            errors: Some(errors),
            by_container,
            by_field,
        }
    }

    fn annotate(&self) -> bool {
        self.errors.is_some()
    }

    fn run(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', INDENT);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut document = BytesStart::new("document");
        document.push_attribute(("template", self.doc.template().name()));
        writer.write_event(Event::Start(document.borrow()))?;
        self.container(&mut writer, self.doc.root())?;
        if let Some(errors) = self.errors {
            summary(&mut writer, errors)?;
        }
        writer.write_event(Event::End(document.to_end()))?;

        let xml = String::from_utf8(writer.into_inner().into_inner())?;
        debug!(bytes = xml.len(), annotated = self.annotate(), "Wrote XML");
        Ok(xml)
    }

    fn container<W: Write>(&self, w: &mut Writer<W>, id: ContainerId) -> Result<()> {
        let container = self.doc.container(id);
        let node = self.doc.template().node(container.template);
        let mut start = BytesStart::new(tag(container.kind));
        start.push_attribute(("id", container.id()));

        if self.annotate() {
            if !node.name.is_empty() {
                start.push_attribute(("name", node.name.as_str()));
            }
            start.push_attribute(("required", bool_attr(node.required)));
            if container.position.segment > 0 {
                start.push_attribute(("ordinal", container.position.segment.to_string().as_str()));
                start.push_attribute(("offset", container.position.offset.to_string().as_str()));
            }
            if container.kind == ContainerType::Segment {
                start.push_attribute(("length", container.position.length.to_string().as_str()));
            }
        }

        w.write_event(Event::Start(start.borrow()))?;
        for error in self.by_container.get(&id).into_iter().flatten() {
            error_element(w, error)?;
        }

        if container.kind == ContainerType::Segment {
            self.fields(w, id)?;
        } else {
            for child in container.children() {
                self.container(w, child)?;
            }
        }
        w.write_event(Event::End(start.to_end()))?;
        Ok(())
    }

    fn fields<W: Write>(&self, w: &mut Writer<W>, segment: ContainerId) -> Result<()> {
        let container = self.doc.container(segment);
        if !self.annotate() {
            for (position, field) in container.fields() {
                if field.has_content() {
                    self.field(w, segment, position, field)?;
                }
            }
            return Ok(());
        }

        // Annotated output lists every present field plus absent ones that carry errors
        for slot in self.doc.template().node(container.template).fields() {
            let position = slot.spec.sequence();
            let errors = self.by_field.get(&(segment, position));
            match container.field(position) {
                Some(field) if field.has_content() => self.field(w, segment, position, field)?,
                _ if errors.is_some() => missing_field(w, &slot.spec, position, errors)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn field<W: Write>(
        &self,
        w: &mut Writer<W>,
        segment: ContainerId,
        position: usize,
        field: &Field,
    ) -> Result<()> {
        let errors = self.by_field.get(&(segment, position));
        match field {
            Field::Data(element) => self.data(w, element, position, errors),
            Field::Composite(composite) => self.composite(w, composite, position, errors),
        }
    }

    fn data<W: Write>(
        &self,
        w: &mut Writer<W>,
        element: &DataElement,
        position: usize,
        errors: Option<&Vec<&DocumentError>>,
    ) -> Result<()> {
        for (occurrence, value) in element.values().iter().enumerate() {
            let mut start = BytesStart::new("element");
            start.push_attribute(("id", element.id()));
            start.push_attribute(("field", position.to_string().as_str()));
            if occurrence > 0 {
                start.push_attribute(("occurrence", occurrence.to_string().as_str()));
            }
            if self.annotate() {
                spec_attributes(&mut start, element.spec());
            }
            let errors = matching(errors, None, occurrence);
            if errors.is_empty() {
                text_element(w, &start, value)?;
            } else {
                w.write_event(Event::Start(start.borrow()))?;
                for error in errors {
                    error_element(w, error)?;
                }
                w.write_event(Event::Start(BytesStart::new("value")))?;
                w.write_event(Event::Text(BytesText::new(value)))?;
                w.write_event(Event::End(BytesStart::new("value").to_end()))?;
                w.write_event(Event::End(start.to_end()))?;
            }
        }
        Ok(())
    }

    fn composite<W: Write>(
        &self,
        w: &mut Writer<W>,
        composite: &CompositeElement,
        position: usize,
        errors: Option<&Vec<&DocumentError>>,
    ) -> Result<()> {
        for occurrence in 0..composite.occurrence_count() {
            let mut start = BytesStart::new("composite");
            start.push_attribute(("id", composite.id()));
            start.push_attribute(("field", position.to_string().as_str()));
            if occurrence > 0 {
                start.push_attribute(("occurrence", occurrence.to_string().as_str()));
            }
            if self.annotate() {
                start.push_attribute(("required", bool_attr(composite.spec().required)));
            }
            w.write_event(Event::Start(start.borrow()))?;
            for error in matching(errors, None, occurrence) {
                error_element(w, error)?;
            }

            for spec in &composite.spec().components {
                let Ok(component) = composite.component_at(occurrence, spec.sequence) else {
                    continue;
                };
                let component_errors = matching(errors, Some(spec.sequence), occurrence);
                if !component.has_content() && component_errors.is_empty() {
                    continue;
                }
                let mut inner = BytesStart::new("component");
                inner.push_attribute(("id", component.id()));
                inner.push_attribute(("position", spec.sequence.to_string().as_str()));
                if self.annotate() {
                    spec_attributes(&mut inner, spec);
                }
                w.write_event(Event::Start(inner.borrow()))?;
                for error in component_errors {
                    error_element(w, error)?;
                }
                w.write_event(Event::Text(BytesText::new(&component.get().unwrap_or_default())))?;
                w.write_event(Event::End(inner.to_end()))?;
            }
            w.write_event(Event::End(start.to_end()))?;
        }
        Ok(())
    }
}

/// Records for one field narrowed to a component and occurrence
fn matching<'e>(
    errors: Option<&Vec<&'e DocumentError>>,
    component: Option<usize>,
    occurrence: usize,
) -> Vec<&'e DocumentError> {
    errors
        .into_iter()
        .flatten()
        .filter(|e| match e.offender {
            Some(Offender::Element {
                component: c,
                occurrence: o,
                ..
            }) => c == component && o == occurrence,
            _ => false,
        })
        .copied()
        .collect()
}

fn bool_attr(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn spec_attributes(start: &mut BytesStart<'_>, spec: &ElementSpec) {
    start.push_attribute(("type", spec.kind.code().as_str()));
    start.push_attribute(("min", spec.min_length.to_string().as_str()));
    start.push_attribute(("max", spec.max_length.to_string().as_str()));
    start.push_attribute(("required", bool_attr(spec.required)));
}

fn text_element<W: Write>(w: &mut Writer<W>, start: &BytesStart<'_>, text: &str) -> Result<()> {
    w.write_event(Event::Start(start.borrow()))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(start.to_end()))?;
    Ok(())
}

fn missing_field<W: Write>(
    w: &mut Writer<W>,
    spec: &FieldSpec,
    position: usize,
    errors: Option<&Vec<&DocumentError>>,
) -> Result<()> {
    let name = match spec {
        FieldSpec::Data(_) => "element",
        FieldSpec::Composite(_) => "composite",
    };
    let mut start = BytesStart::new(name);
    start.push_attribute(("id", spec.id()));
    start.push_attribute(("field", position.to_string().as_str()));
    start.push_attribute(("missing", "true"));
    if let FieldSpec::Data(element) = spec {
        spec_attributes(&mut start, element);
    }
    w.write_event(Event::Start(start.borrow()))?;
    for error in errors.into_iter().flatten() {
        error_element(w, error)?;
    }
    w.write_event(Event::End(start.to_end()))?;
    Ok(())
}

fn error_element<W: Write>(w: &mut Writer<W>, error: &DocumentError) -> Result<()> {
    let mut start = BytesStart::new("error");
    start.push_attribute(("code", error.code.value().to_string().as_str()));
    start.push_attribute(("severity", error.severity.to_string().as_str()));
    start.push_attribute(("ordinal", error.position.to_string().as_str()));
    text_element(w, &start, &error.message)
}

fn summary<W: Write>(w: &mut Writer<W>, errors: &DocumentErrors) -> Result<()> {
    let mut start = BytesStart::new("errors");
    start.push_attribute(("count", errors.len().to_string().as_str()));
    if errors.dropped() > 0 {
        start.push_attribute(("dropped", errors.dropped().to_string().as_str()));
    }
    if errors.is_empty() {
        w.write_event(Event::Empty(start))?;
        return Ok(());
    }
    w.write_event(Event::Start(start.borrow()))?;
    for error in errors.iter() {
        let mut record = BytesStart::new("error");
        record.push_attribute(("code", error.code.value().to_string().as_str()));
        record.push_attribute(("severity", error.severity.to_string().as_str()));
        record.push_attribute(("id", error.id.as_str()));
        record.push_attribute(("ordinal", error.position.to_string().as_str()));
        if let Some(Offender::Token { offset }) = error.offender {
            record.push_attribute(("offset", offset.to_string().as_str()));
        }
        text_element(w, &record, &error.message)?;
    }
    w.write_event(Event::End(start.to_end()))?;
    Ok(())
}
