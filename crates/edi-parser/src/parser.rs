//! Template-matching descent
//!
//! The parser walks the template's child lists with one index per open
//! container, kept on an explicit stack of frames. At each step it peeks
//! the tokenizer's current segment id and either opens a child container,
//! consumes a segment, skips the template slot, or closes the frame.
//!
//! A segment that no open frame can place is reported and skipped, then
//! matching resumes from the deepest container that consumed input last.

use crate::config::{ErrorPolicy, ParserConfig};
use crate::document::Document;
use crate::fields::{field_width, parse_fields};
use crate::{Error, Result};
use edi_dialect::{Dialect, Tokenizer, tokenizer_for};
use edi_ir::{
    ContainerId, ContainerType, DocumentError, DocumentErrors, ErrorCode, Offender, Severity,
    TemplateId,
};
use edi_schema::TemplateTree;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where the descent state machine stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseState {
    /// Looking for the template slot that takes the current segment
    Matching,
    /// Reading the fields of a matched segment
    Consuming,
    /// Reporting an unplaceable segment and looking for an anchor
    Resyncing,
    /// Input or template exhausted
    Exhausted,
}

/// Result of one parse
#[derive(Debug)]
pub struct ParseOutcome {
    pub document: Document,
    pub errors: DocumentErrors,
    pub dialect: Dialect,
    /// Segments stored in the document
    pub segments: usize,
    /// Segments reported and skipped
    pub skipped: usize,
    /// Whether resync found no anchor and parsing stopped early
    pub abandoned: bool,
}

impl ParseOutcome {
    /// No errors and nothing skipped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.skipped == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    template: TemplateId,
    container: ContainerId,
    index: usize,
    consumed: bool,
}

/// Parses documents against one shared template tree
#[derive(Debug, Clone)]
pub struct Parser {
    template: Arc<TemplateTree>,
    config: ParserConfig,
}

impl Parser {
    pub fn new(template: Arc<TemplateTree>) -> Self {
        Self {
            template,
            config: ParserConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn template(&self) -> &Arc<TemplateTree> {
        &self.template
    }

    /// Tokenize `input` as `dialect` and parse it
    ///
    /// # Errors
    ///
    /// Fails for a malformed leading control segment, and under
    /// [`ErrorPolicy::Surface`] whenever an error was recorded.
    pub fn parse_bytes(&self, dialect: Dialect, input: &[u8]) -> Result<ParseOutcome> {
        let mut tokenizer = tokenizer_for(dialect, input)?;
        self.parse(tokenizer.as_mut())
    }

    /// Detect the dialect from the leading bytes, then parse
    ///
    /// # Errors
    ///
    /// As [`Parser::parse_bytes`], plus input whose dialect is not recognized.
    pub fn parse_detected(&self, input: &[u8]) -> Result<ParseOutcome> {
        let dialect = Dialect::detect(input).ok_or(Error::UndetectedDialect)?;
        self.parse_bytes(dialect, input)
    }

    /// Parse everything the tokenizer yields
    ///
    /// # Errors
    ///
    /// Under [`ErrorPolicy::Surface`], fails when any error was recorded.
    pub fn parse(&self, tokenizer: &mut dyn Tokenizer) -> Result<ParseOutcome> {
        let dialect = tokenizer.dialect();
        let mut session = Session::new(Arc::clone(&self.template), tokenizer, self.config);
        session.run();
        let outcome = session.finish(dialect);
        debug!(
            template = self.template.name(),
            %dialect,
            segments = outcome.segments,
            errors = outcome.errors.len(),
            "Parsed document"
        );

        match self.config.error_policy {
            ErrorPolicy::Surface if !outcome.errors.is_empty() => {
                let first = outcome
                    .errors
                    .iter()
                    .next()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                Err(Error::Rejected {
                    count: outcome.errors.len(),
                    first,
                    errors: Box::new(outcome.errors),
                })
            }
            _ => Ok(outcome),
        }
    }
}

/// Whether template node `node` can begin with segment `id`
fn starts_with(tree: &TemplateTree, node: TemplateId, id: &str) -> bool {
    let template = tree.node(node);
    match template.kind {
        ContainerType::Segment => template.id == id,
        ContainerType::Table => tree
            .children(node)
            .iter()
            .any(|child| starts_with(tree, *child, id)),
        kind if kind.is_element() => false,
        _ => template.match_id() == Some(id),
    }
}

/// Slot to try after slot `index` of `parent` took a container
fn next_index(tree: &TemplateTree, parent: TemplateId, index: usize) -> usize {
    let Some(slot) = tree.child(parent, index) else {
        return index + 1;
    };
    if tree.node(slot).occurs.is_repeatable() {
        index
    } else if tree.equivalent_to_next(parent, index) {
        tree.equivalence_start(parent, index)
    } else {
        index + 1
    }
}

struct Session<'t> {
    tree: Arc<TemplateTree>,
    tokenizer: &'t mut dyn Tokenizer,
    config: ParserConfig,
    document: Document,
    errors: DocumentErrors,
    stack: Vec<Frame>,
    state: ParseState,
    /// Offset of the last segment reported, so one token is reported once
    last_reported: Option<usize>,
    segments: usize,
    skipped: usize,
    abandoned: bool,
}

impl<'t> Session<'t> {
    fn new(tree: Arc<TemplateTree>, tokenizer: &'t mut dyn Tokenizer, config: ParserConfig) -> Self {
        let document = Document::new(Arc::clone(&tree));
        let root = Frame {
            template: tree.root(),
            container: document.root(),
            index: 0,
            consumed: false,
        };
        Self {
            tree,
            tokenizer,
            config,
            document,
            errors: DocumentErrors::with_limit(config.max_errors),
            stack: vec![root],
            state: ParseState::Matching,
            last_reported: None,
            segments: 0,
            skipped: 0,
            abandoned: false,
        }
    }

    fn run(&mut self) {
        let mut pending: Option<ContainerId> = None;
        loop {
            match self.state {
                ParseState::Matching => pending = self.step_matching(),
                ParseState::Consuming => {
                    if let Some(segment) = pending.take() {
                        self.consume(segment);
                    }
                    self.state = ParseState::Matching;
                }
                ParseState::Resyncing => self.resync(),
                ParseState::Exhausted => break,
            }
        }
        while !self.stack.is_empty() {
            self.pop_frame();
        }
    }

    fn finish(mut self, dialect: Dialect) -> ParseOutcome {
        let mut lexical = self.tokenizer.take_errors();
        self.errors.append(&mut lexical);
        ParseOutcome {
            document: self.document,
            errors: self.errors,
            dialect,
            segments: self.segments,
            skipped: self.skipped,
            abandoned: self.abandoned,
        }
    }

    /// One matching step; returns the segment container to consume, if any
    fn step_matching(&mut self) -> Option<ContainerId> {
        let tree = Arc::clone(&self.tree);
        let Some(id) = self.tokenizer.current_segment_id().map(str::to_string) else {
            self.state = ParseState::Exhausted;
            return None;
        };
        let Some(frame) = self.stack.last().copied() else {
            self.state = ParseState::Resyncing;
            return None;
        };
        let Some(slot) = tree.child(frame.template, frame.index) else {
            self.pop_frame();
            return None;
        };
        let node = tree.node(slot);

        if !starts_with(&tree, slot, &id) {
            self.advance_frame();
            return None;
        }
        if !self.prevalidation_passes(slot, &id) {
            trace!(segment = %id, slot = %node.id, "Prevalidation rejected slot");
            self.advance_frame();
            return None;
        }

        let existing = self.document.instances(frame.container, frame.index).len();
        if !node.occurs.can_add(existing) {
            if tree.has_later_equivalent(frame.template, frame.index) {
                self.advance_frame();
                return None;
            }
            let code = match node.kind {
                ContainerType::Segment => ErrorCode::SegmentOverMaximum,
                _ => ErrorCode::LoopOverMaximum,
            };
            self.report(
                Severity::Structural,
                code,
                &node.id,
                format!(
                    "{} {} occurs more than {} time(s)",
                    node.kind, node.id, node.occurs
                ),
                Some(frame.container),
            );
            self.pop_frame();
            return None;
        }

        let position = self.tokenizer.position();
        let child = match self
            .document
            .insert_child(frame.container, frame.index, position)
        {
            Ok(child) => child,
            Err(e) => {
                self.report(
                    Severity::Structural,
                    ErrorCode::IllegalContainment,
                    &node.id,
                    e.to_string(),
                    Some(frame.container),
                );
                self.pop_frame();
                return None;
            }
        };

        if node.kind == ContainerType::Segment {
            trace!(segment = %id, offset = position.offset, "Matched segment");
            self.state = ParseState::Consuming;
            Some(child)
        } else {
            trace!(kind = %node.kind, id = %node.id, segment = %id, "Opened container");
            self.stack.push(Frame {
                template: slot,
                container: child,
                index: 0,
                consumed: false,
            });
            None
        }
    }

    fn consume(&mut self, segment: ContainerId) {
        parse_fields(
            self.tokenizer,
            &mut self.document,
            segment,
            &self.config,
            &mut self.errors,
        );
        self.segments += 1;
        self.tokenizer.next_segment();
        if let Some(frame) = self.stack.last_mut() {
            frame.consumed = true;
            frame.index = next_index(&self.tree, frame.template, frame.index);
        }
    }

    /// Move the top frame past its current slot without consuming
    fn advance_frame(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.index += 1;
        }
    }

    /// Close the top frame, dropping its container when it stayed empty
    fn pop_frame(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if !frame.consumed {
            self.document.discard(frame.container);
        }
        if let Some(parent) = self.stack.last_mut() {
            if frame.consumed {
                parent.consumed = true;
                parent.index = next_index(&self.tree, parent.template, parent.index);
            } else {
                parent.index += 1;
            }
        }
    }

    fn prevalidation_passes(&mut self, slot: TemplateId, id: &str) -> bool {
        let tree = Arc::clone(&self.tree);
        let node = tree.node(slot);
        let Some(pre) = &node.prevalidate else {
            return true;
        };
        let segment = if node.kind == ContainerType::Segment {
            Some(slot)
        } else {
            tree.find_segment(slot, id)
        };
        let value = self.live_value(segment, pre.position, pre.component);
        pre.accepts(value.as_deref())
    }

    /// Value of field `position` of the current segment, cursor left at the start
    fn live_value(
        &mut self,
        segment: Option<TemplateId>,
        position: usize,
        component: Option<usize>,
    ) -> Option<String> {
        if !self.tokenizer.is_fixed_width() {
            return self
                .tokenizer
                .data_element_at(position)
                .and_then(|token| token.component(component.unwrap_or(1)))
                .map(str::to_string);
        }

        let tree = Arc::clone(&self.tree);
        let segment = segment?;
        self.tokenizer.reset_segment();
        let mut value = None;
        for slot in tree.node(segment).fields() {
            let text = self.tokenizer.next_fixed_field(field_width(slot));
            if slot.spec.sequence() == position {
                value = text;
                break;
            }
        }
        self.tokenizer.reset_segment();
        value
    }

    fn resync(&mut self) {
        let Some(id) = self.tokenizer.current_segment_id().map(str::to_string) else {
            self.state = ParseState::Exhausted;
            return;
        };
        let offset = self.tokenizer.input_byte_count();
        if self.last_reported != Some(offset) {
            let known = self.tree.find_segment(self.tree.root(), &id).is_some();
            let (code, what) = if known {
                (ErrorCode::UnexpectedSegment, "out of place")
            } else {
                (ErrorCode::UnrecognizedSegment, "not recognized")
            };
            warn!(segment = %id, offset, "Segment {what}; resynchronizing");
            self.report(
                Severity::Structural,
                code,
                &id,
                format!("Segment {id} at byte {offset} is {what}"),
                None,
            );
        }
        self.skipped += 1;
        self.tokenizer.next_segment();
        self.continue_parse();
    }

    /// Rebuild the frame stack down to the last container that consumed input
    fn continue_parse(&mut self) {
        if self.tokenizer.is_exhausted() {
            self.state = ParseState::Exhausted;
            return;
        }
        let root = self.document.root();
        let Some(anchor) = self.document.last_consumer(root) else {
            warn!("No container to resume from; abandoning transaction set");
            self.abandoned = true;
            self.state = ParseState::Exhausted;
            return;
        };

        let path = self.document.path(anchor);
        self.stack.clear();
        for (depth, container) in path.iter().enumerate() {
            let node = self.document.container(*container);
            // Ancestors sit on the slot of the open child; the anchor moves past its last segment
            let index = match path.get(depth + 1) {
                Some(next) => node.slot_of(*next).unwrap_or(0),
                None => node
                    .children()
                    .max()
                    .and_then(|c| node.slot_of(c))
                    .map_or(0, |slot| next_index(&self.tree, node.template, slot)),
            };
            self.stack.push(Frame {
                template: node.template,
                container: *container,
                index,
                consumed: true,
            });
        }
        debug!(anchor = %self.document.container(anchor).key, depth = self.stack.len(), "Resuming descent");
        self.state = ParseState::Matching;
    }

    fn report(
        &mut self,
        severity: Severity,
        code: ErrorCode,
        id: &str,
        message: String,
        container: Option<ContainerId>,
    ) {
        let offset = self.tokenizer.input_byte_count();
        self.last_reported = Some(offset);
        let mut error = DocumentError::new(severity, code, id, message)
            .at(self.tokenizer.segment_ordinal())
            .offender(Offender::Token { offset });
        if let Some(container) = container {
            error = error.in_container(container);
        }
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ElementKind, ElementSpec, Occurs};
    use edi_schema::{NodeSpec, Prevalidation};

    const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*^*00501*000000001*0*P*:~";

    fn isa() -> NodeSpec {
        let mut isa = NodeSpec::segment("ISA").required();
        for i in 1..=16 {
            isa = isa.field(ElementSpec::new(format!("ISA{i:02}"), ElementKind::Char).length(1, 15));
        }
        isa
    }

    fn template(header: NodeSpec) -> Arc<TemplateTree> {
        let transaction = NodeSpec::transaction("850")
            .child(header)
            .child(
                NodeSpec::table("SUMMARY").child(
                    NodeSpec::segment("SE")
                        .required()
                        .field(ElementSpec::new("SE01", ElementKind::Numeric { decimals: 0 }))
                        .field(ElementSpec::new("SE02", ElementKind::Char)),
                ),
            )
            .repeating();
        let group = NodeSpec::group("PO")
            .child(NodeSpec::segment("GS").field(ElementSpec::new("GS01", ElementKind::Id)))
            .child(transaction)
            .child(NodeSpec::segment("GE").field(ElementSpec::new("GE01", ElementKind::Char)));
        let tree = NodeSpec::envelope("X12")
            .child(isa())
            .child(group.repeating())
            .child(NodeSpec::segment("IEA").field(ElementSpec::new("IEA01", ElementKind::Char)))
            .build("850")
            .unwrap();
        Arc::new(tree)
    }

    fn header() -> NodeSpec {
        NodeSpec::table("HEADER")
            .child(
                NodeSpec::segment("ST")
                    .required()
                    .field(ElementSpec::new("ST01", ElementKind::Id))
                    .field(ElementSpec::new("ST02", ElementKind::Char)),
            )
            .child(NodeSpec::segment("BEG").field(ElementSpec::new("BEG01", ElementKind::Id)))
            .child(
                NodeSpec::segment("REF")
                    .sequence(5)
                    .field(ElementSpec::new("REF01", ElementKind::Id))
                    .field(ElementSpec::new("REF02", ElementKind::Char)),
            )
            .child(
                NodeSpec::segment("REF")
                    .sequence(5)
                    .field(ElementSpec::new("REF01", ElementKind::Id))
                    .field(ElementSpec::new("REF02", ElementKind::Char)),
            )
            .child(
                NodeSpec::looped("N1")
                    .occurs(Occurs::Bounded(2))
                    .child(
                        NodeSpec::segment("N1")
                            .field(ElementSpec::new("N101", ElementKind::Id))
                            .field(ElementSpec::new("N102", ElementKind::Char)),
                    )
                    .child(NodeSpec::segment("N3").field(ElementSpec::new("N301", ElementKind::Char))),
            )
    }

    fn wrap(body: &str) -> String {
        format!("{ISA}\nGS*PO~\nST*850*0001~\n{body}SE*9*0001~\nGE*1~\nIEA*1~\n")
    }

    fn parse(tree: &Arc<TemplateTree>, input: &str) -> ParseOutcome {
        Parser::new(Arc::clone(tree))
            .parse_bytes(Dialect::X12, input.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_parses_nested_containers() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("BEG*00~\nN1*BY*ACME~\nN3*1 MAIN ST~\n"));
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let doc = &outcome.document;
        let n1 = doc.find(doc.root(), ContainerType::Loop, "N1").unwrap();
        assert_eq!(doc.children(n1).len(), 2);
        assert_eq!(doc.segments(doc.root()).len(), 9);
        let n3 = doc.find(n1, ContainerType::Segment, "N3").unwrap();
        assert_eq!(doc.value(n3, 1).as_deref(), Some("1 MAIN ST"));
        assert_eq!(outcome.segments, 9);
    }

    #[test]
    fn test_equivalent_segments_take_consecutive_refs() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("BEG*00~\nREF*DP*1~\nREF*IA*2~\n"));
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let doc = &outcome.document;
        let table = doc.find(doc.root(), ContainerType::Table, "HEADER").unwrap();
        let refs = doc.children_with_key(table, &edi_ir::ContainerKey::segment("REF"));
        assert_eq!(refs.len(), 2);
        assert_eq!(doc.value(refs[1], 1).as_deref(), Some("IA"));
    }

    #[test]
    fn test_third_ref_exceeds_equivalence_run() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("REF*DP*1~\nREF*IA*2~\nREF*ZZ*3~\n"));
        let misplaced: Vec<_> = outcome.errors.with_code(ErrorCode::UnexpectedSegment).collect();
        assert_eq!(misplaced.len(), 1);
        assert_eq!(misplaced[0].id, "REF");
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.errors.len(), 1);
        // SE still lands in the summary table after the resync
        let doc = &outcome.document;
        assert!(doc.find(doc.root(), ContainerType::Segment, "SE").is_some());
    }

    #[test]
    fn test_loop_occurs_limit() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("N1*BY*A~\nN1*ST*B~\nN1*VN*C~\n"));
        assert_eq!(outcome.errors.with_code(ErrorCode::LoopOverMaximum).count(), 1);
        let doc = &outcome.document;
        assert_eq!(doc.find_all(doc.root(), ContainerType::Loop).len(), 2);
    }

    #[test]
    fn test_unknown_segment_resyncs() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("BEG*00~\nZZZ*1~\nN1*BY*A~\n"));
        let unknown: Vec<_> = outcome.errors.with_code(ErrorCode::UnrecognizedSegment).collect();
        assert_eq!(unknown.len(), 1);
        assert!(unknown[0].message.contains("ZZZ"));
        assert!(matches!(unknown[0].offender, Some(Offender::Token { offset }) if offset > 106));
        let doc = &outcome.document;
        assert!(doc.find(doc.root(), ContainerType::Loop, "N1").is_some());
        assert!(!outcome.abandoned);
    }

    #[test]
    fn test_prevalidation_selects_variant() {
        let header = NodeSpec::table("HEADER")
            .child(
                NodeSpec::segment("ST")
                    .field(ElementSpec::new("ST01", ElementKind::Id))
                    .field(ElementSpec::new("ST02", ElementKind::Char)),
            )
            .child(
                NodeSpec::looped("N1")
                    .named("Bill-to")
                    .prevalidate(Prevalidation::new(1, ["BT"]))
                    .child(NodeSpec::segment("N1").field(ElementSpec::new("N101", ElementKind::Id))),
            )
            .child(
                NodeSpec::looped("N1")
                    .named("Ship-to")
                    .prevalidate(Prevalidation::new(1, ["ST"]))
                    .child(NodeSpec::segment("N1").field(ElementSpec::new("N101", ElementKind::Id))),
            );
        let tree = template(header);
        let outcome = parse(&tree, &wrap("N1*ST~\n"));
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let doc = &outcome.document;
        let table = doc.find(doc.root(), ContainerType::Table, "HEADER").unwrap();
        assert!(doc.instances(table, 1).is_empty());
        assert_eq!(doc.instances(table, 2).len(), 1);
    }

    #[test]
    fn test_surface_policy_returns_err() {
        let tree = template(header());
        let input = wrap("ZZZ~\n");
        let parser = Parser::new(Arc::clone(&tree)).with_config(ParserConfig::surface());
        let err = parser.parse_bytes(Dialect::X12, input.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Rejected { count: 1, .. }));

        let inspect = Parser::new(tree).parse_bytes(Dialect::X12, input.as_bytes()).unwrap();
        assert_eq!(inspect.errors.len(), 1);
    }

    #[test]
    fn test_second_transaction_set() {
        let tree = template(header());
        let input = format!(
            "{ISA}\nGS*PO~\nST*850*0001~\nBEG*00~\nSE*3*0001~\nST*850*0002~\nSE*2*0002~\nGE*2~\nIEA*1~\n"
        );
        let outcome = parse(&tree, &input);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let doc = &outcome.document;
        assert_eq!(doc.find_all(doc.root(), ContainerType::TransactionSet).len(), 2);
    }

    #[test]
    fn test_too_many_elements() {
        let tree = template(header());
        let outcome = parse(&tree, &wrap("BEG*00*EXTRA~\n"));
        assert_eq!(outcome.errors.with_code(ErrorCode::TooManyElements).count(), 1);
    }
}
