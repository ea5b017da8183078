//! Field-level parsing of one segment
//!
//! Delimited input arrives as [`FieldToken`]s and is matched to the
//! template's fields by position. Fixed-width input is cut field by field
//! using each element's maximum length.

use crate::config::ParserConfig;
use crate::document::Document;
use edi_dialect::{FieldToken, Tokenizer};
use edi_ir::{ContainerId, DocumentError, DocumentErrors, ErrorCode, Field, Offender, Severity};
use edi_schema::{FieldSlot, FieldSpec};
use std::sync::Arc;
use tracing::trace;

/// Characters a fixed-width field occupies
pub(crate) fn field_width(slot: &FieldSlot) -> usize {
    match &slot.spec {
        FieldSpec::Data(spec) => spec.max_length,
        FieldSpec::Composite(spec) => spec.components.iter().map(|c| c.max_length).sum(),
    }
}

/// Where in the input a field sits, for error records
struct Site {
    segment: ContainerId,
    ordinal: usize,
    field: usize,
}

impl Site {
    fn error(
        &self,
        severity: Severity,
        code: ErrorCode,
        id: &str,
        message: String,
        component: Option<usize>,
        occurrence: usize,
    ) -> DocumentError {
        DocumentError::new(severity, code, id, message)
            .at(self.ordinal)
            .in_container(self.segment)
            .offender(Offender::Element {
                segment: self.segment,
                field: self.field,
                component,
                occurrence,
            })
    }
}

fn clean<'t>(text: &'t str, config: &ParserConfig) -> &'t str {
    if config.trim_whitespace {
        text.trim_matches(' ')
    } else {
        text
    }
}

/// Store the current segment's fields into `segment`
pub(crate) fn parse_fields(
    tokenizer: &mut dyn Tokenizer,
    doc: &mut Document,
    segment: ContainerId,
    config: &ParserConfig,
    errors: &mut DocumentErrors,
) {
    if tokenizer.is_fixed_width() {
        parse_fixed(tokenizer, doc, segment, config, errors);
    } else {
        parse_delimited(tokenizer, doc, segment, config, errors);
    }
}

fn parse_delimited(
    tokenizer: &mut dyn Tokenizer,
    doc: &mut Document,
    segment: ContainerId,
    config: &ParserConfig,
    errors: &mut DocumentErrors,
) {
    let tree = Arc::clone(doc.template());
    let template = doc.container(segment).template;
    let segment_id = doc.container(segment).key.id.clone();
    let ordinal = tokenizer.segment_ordinal();
    tokenizer.reset_segment();

    let mut position = 0;
    while let Some(token) = tokenizer.next_data_element() {
        position += 1;
        if token.is_empty() {
            continue;
        }
        let site = Site {
            segment,
            ordinal,
            field: position,
        };
        let Some(slot) = tree.field_at(template, position) else {
            errors.push(site.error(
                Severity::Structural,
                ErrorCode::TooManyElements,
                &segment_id,
                format!(
                    "{segment_id} has {} fields, template declares {}",
                    tokenizer.field_count(),
                    tree.max_field(template)
                ),
                None,
                0,
            ));
            continue;
        };
        let Ok(field) = doc.field_mut(segment, position) else {
            continue;
        };
        match field {
            Field::Data(element) => store_data(element, &token, &site, config, errors),
            Field::Composite(composite) => {
                store_composite(composite, &token, &site, config, errors);
            }
        }
        trace!(segment = %segment_id, field = position, id = slot.spec.id(), "Stored field");
    }
}

fn store_data(
    element: &mut edi_ir::DataElement,
    token: &FieldToken,
    site: &Site,
    config: &ParserConfig,
    errors: &mut DocumentErrors,
) {
    let id = element.id().to_string();
    let limit = element.spec().occurs.limit();
    let kept = limit.map_or(token.repeats.len(), |l| token.repeats.len().min(l.max(1)));
    if kept < token.repeats.len() {
        errors.push(site.error(
            Severity::Structural,
            ErrorCode::TooManyRepetitions,
            &id,
            format!(
                "{id} repeats {} times, at most {kept} allowed",
                token.repeats.len()
            ),
            None,
            kept,
        ));
    }

    for (occurrence, repeat) in token.repeats[..kept].iter().enumerate() {
        if repeat.iter().skip(1).any(|c| !c.is_empty()) {
            errors.push(site.error(
                Severity::Structural,
                ErrorCode::TooManyComponents,
                &id,
                format!("{id} is a simple element but carries {} components", repeat.len()),
                Some(2),
                occurrence,
            ));
        }
        let text = clean(repeat.first().map_or("", String::as_str), config);
        let stored = if occurrence == 0 {
            element.load(text)
        } else {
            element.load_next(text)
        };
        if let Err(e) = stored {
            errors.push(site.error(
                Severity::Requirement,
                ErrorCode::InvalidCharacter,
                &id,
                e.to_string(),
                None,
                occurrence,
            ));
        }
    }
}

fn store_composite(
    composite: &mut edi_ir::CompositeElement,
    token: &FieldToken,
    site: &Site,
    config: &ParserConfig,
    errors: &mut DocumentErrors,
) {
    let id = composite.id().to_string();
    for (index, repeat) in token.repeats.iter().enumerate() {
        let occurrence = if index == 0 {
            0
        } else {
            match composite.push_occurrence() {
                Ok(occurrence) => occurrence,
                Err(e) => {
                    errors.push(site.error(
                        Severity::Structural,
                        ErrorCode::TooManyRepetitions,
                        &id,
                        e.to_string(),
                        None,
                        index,
                    ));
                    break;
                }
            }
        };

        for (c, text) in repeat.iter().enumerate() {
            let position = c + 1;
            if position > composite.len() {
                if repeat[c..].iter().any(|t| !t.is_empty()) {
                    errors.push(site.error(
                        Severity::Structural,
                        ErrorCode::TooManyComponents,
                        &id,
                        format!(
                            "{id} has {} components, template declares {}",
                            repeat.len(),
                            composite.len()
                        ),
                        Some(position),
                        occurrence,
                    ));
                }
                break;
            }
            if text.is_empty() {
                continue;
            }
            let Ok(component) = composite.component_mut(occurrence, position) else {
                continue;
            };
            if let Err(e) = component.load(clean(text, config)) {
                errors.push(site.error(
                    Severity::Requirement,
                    ErrorCode::InvalidCharacter,
                    component.id(),
                    e.to_string(),
                    Some(position),
                    occurrence,
                ));
            }
        }
    }
}

fn parse_fixed(
    tokenizer: &mut dyn Tokenizer,
    doc: &mut Document,
    segment: ContainerId,
    config: &ParserConfig,
    errors: &mut DocumentErrors,
) {
    let tree = Arc::clone(doc.template());
    let template = doc.container(segment).template;
    let segment_id = doc.container(segment).key.id.clone();
    let ordinal = tokenizer.segment_ordinal();
    tokenizer.reset_segment();

    for slot in tree.node(template).fields() {
        let position = slot.spec.sequence();
        let site = Site {
            segment,
            ordinal,
            field: position,
        };
        let pieces: Vec<(usize, String)> = match &slot.spec {
            FieldSpec::Data(spec) => match tokenizer.next_fixed_field(spec.max_length) {
                Some(text) => vec![(1, text)],
                None => break,
            },
            FieldSpec::Composite(spec) => spec
                .components
                .iter()
                .enumerate()
                .map_while(|(c, component)| {
                    tokenizer
                        .next_fixed_field(component.max_length)
                        .map(|text| (c + 1, text))
                })
                .collect(),
        };
        if pieces.iter().all(|(_, text)| text.trim().is_empty()) {
            continue;
        }
        let Ok(field) = doc.field_mut(segment, position) else {
            continue;
        };
        for (component, text) in &pieces {
            let text = clean(text, config);
            let stored = match field {
                Field::Data(element) => element.load(text),
                Field::Composite(composite) => composite.load(*component, text),
            };
            if let Err(e) = stored {
                errors.push(site.error(
                    Severity::Requirement,
                    ErrorCode::InvalidCharacter,
                    slot.spec.id(),
                    e.to_string(),
                    matches!(slot.spec, FieldSpec::Composite(_)).then_some(*component),
                    0,
                ));
            }
        }
    }
    trace!(segment = %segment_id, "Stored fixed-width record");
}
