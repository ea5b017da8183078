//! Declarative template construction
//!
//! A [`NodeSpec`] is an owned, nested description of a template. Building
//! it flattens the nesting into a [`TemplateTree`] arena, checking the
//! containment table, resolving named checks and precomputing each
//! segment's field list and each group's opening segment id.

use crate::callbacks::CallbackRegistry;
use crate::control::ControlLink;
use crate::rules::ElementRule;
use crate::template::{ElementOptions, FieldSlot, FieldSpec, Prevalidation, TemplateNode, TemplateTree};
use crate::{Error, Result};
use edi_ir::{CompositeSpec, ContainerType, ElementKind, ElementSpec, Occurs, TemplateId};
use std::sync::Arc;
use tracing::debug;

/// Nested description of one template node
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub kind: ContainerType,
    pub id: String,
    pub name: Option<String>,
    pub occurs: Occurs,
    pub required: bool,
    pub used: bool,
    pub sequence: Option<usize>,
    pub prevalidate: Option<Prevalidation>,
    pub rules: Vec<ElementRule>,
    pub control: Option<ControlLink>,
    /// Element metadata of a DataElement node
    pub element: Option<ElementSpec>,
    /// Name of a registered check for a DataElement node
    pub check: Option<String>,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(kind: ContainerType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: None,
            occurs: Occurs::ONCE,
            required: false,
            used: true,
            sequence: None,
            prevalidate: None,
            rules: Vec::new(),
            control: None,
            element: None,
            check: None,
            children: Vec::new(),
        }
    }

    pub fn envelope(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Envelope, id).required()
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(ContainerType::FunctionalGroup, id)
    }

    pub fn transaction(id: impl Into<String>) -> Self {
        Self::new(ContainerType::TransactionSet, id)
    }

    pub fn table(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Table, id)
    }

    pub fn looped(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Loop, id)
    }

    pub fn segment(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Segment, id)
    }

    pub fn composite(id: impl Into<String>) -> Self {
        Self::new(ContainerType::CompositeElement, id)
    }

    /// DataElement node carrying `spec`
    pub fn element(spec: ElementSpec) -> Self {
        let mut node = Self::new(ContainerType::DataElement, spec.id.clone());
        node.occurs = spec.occurs;
        node.required = spec.required;
        node.used = spec.used;
        node.sequence = (spec.sequence > 0).then_some(spec.sequence);
        node.name = Some(spec.name.clone());
        node.element = Some(spec);
        node
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Shorthand for `occurs(Occurs::Unbounded)`
    #[must_use]
    pub fn repeating(self) -> Self {
        self.occurs(Occurs::Unbounded)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn unused(mut self) -> Self {
        self.used = false;
        self
    }

    #[must_use]
    pub fn sequence(mut self, sequence: usize) -> Self {
        self.sequence = Some(sequence);
        self
    }

    #[must_use]
    pub fn prevalidate(mut self, prevalidation: Prevalidation) -> Self {
        self.prevalidate = Some(prevalidation);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: ElementRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn control(mut self, link: ControlLink) -> Self {
        self.control = Some(link);
        self
    }

    /// Attach a registered check by name
    #[must_use]
    pub fn check(mut self, name: impl Into<String>) -> Self {
        self.check = Some(name.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    /// Append a data element field
    #[must_use]
    pub fn field(self, spec: ElementSpec) -> Self {
        self.child(NodeSpec::element(spec))
    }

    /// Build with no callbacks and default options
    ///
    /// # Errors
    ///
    /// See [`TreeBuilder::build`].
    pub fn build(self, name: impl Into<String>) -> Result<TemplateTree> {
        TreeBuilder::new(name).build(self)
    }
}

/// Turns a [`NodeSpec`] into a [`TemplateTree`]
#[derive(Debug, Default)]
pub struct TreeBuilder {
    name: String,
    callbacks: CallbackRegistry,
    options: ElementOptions,
}

impl TreeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callbacks: CallbackRegistry::new(),
            options: ElementOptions::default(),
        }
    }

    #[must_use]
    pub fn callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    #[must_use]
    pub fn options(mut self, options: ElementOptions) -> Self {
        self.options = options;
        self
    }

    /// Flatten and check `root`
    ///
    /// # Errors
    ///
    /// Fails when the root is not an Envelope, a pairing breaks the
    /// containment table, a check name is unknown, or a rule, prevalidation
    /// or control link points at a field or segment that does not exist.
    pub fn build(self, root: NodeSpec) -> Result<TemplateTree> {
        if root.kind != ContainerType::Envelope {
            return Err(Error::InvalidRoot(root.kind));
        }
        let mut tree = TemplateTree {
            name: self.name.clone(),
            nodes: Vec::new(),
            options: self.options,
        };
        self.add(&mut tree, root, None, 1)?;
        debug!(template = %tree.name, nodes = tree.nodes.len(), "Built template tree");
        Ok(tree)
    }

    fn add(
        &self,
        tree: &mut TemplateTree,
        spec: NodeSpec,
        parent: Option<TemplateId>,
        ordinal: usize,
    ) -> Result<TemplateId> {
        if let Some(parent) = parent {
            let parent_kind = tree.node(parent).kind;
            if !parent_kind.can_contain(spec.kind) {
                return Err(Error::IllegalContainment {
                    id: spec.id,
                    parent: parent_kind,
                    child: spec.kind,
                });
            }
        }

        let id = TemplateId(tree.nodes.len());
        let mut node = TemplateNode::new(spec.kind, spec.id.clone(), parent);
        if let Some(name) = spec.name.clone() {
            node.name = name;
        }
        node.occurs = spec.occurs;
        node.required = spec.required;
        node.used = spec.used;
        node.sequence = spec.sequence.unwrap_or(ordinal);
        node.prevalidate = spec.prevalidate.clone();
        node.rules = spec.rules.clone();
        node.control = spec.control.clone();
        tree.nodes.push(node);

        let NodeSpec {
            kind,
            id: node_id,
            element,
            check,
            children,
            ..
        } = spec;

        let mut child_ids = Vec::with_capacity(children.len());
        for (index, child) in children.into_iter().enumerate() {
            child_ids.push(self.add(tree, child, Some(id), index + 1)?);
        }

        let field = match kind {
            ContainerType::DataElement => {
                let element = element.ok_or_else(|| {
                    Error::InvalidFormat(format!("data element '{node_id}' has no type"))
                })?;
                Some(FieldSpec::Data(Arc::new(
                    self.finish_element(element, check.as_deref(), tree.node(id))?,
                )))
            }
            ContainerType::CompositeElement => {
                let node = tree.node(id);
                let mut composite = CompositeSpec::new(node_id.clone()).occurs(node.occurs);
                composite.name = node.name.clone();
                composite.required = node.required;
                composite.used = node.used;
                composite.sequence = node.sequence;
                for child in &child_ids {
                    if let Some(FieldSpec::Data(component)) = &tree.node(*child).field {
                        composite.components.push(Arc::clone(component));
                    }
                }
                Some(FieldSpec::Composite(Arc::new(composite)))
            }
            _ => None,
        };

        let mut slots_by_key = std::collections::HashMap::new();
        for (index, child) in child_ids.iter().enumerate() {
            slots_by_key
                .entry(tree.node(*child).key())
                .or_insert_with(Vec::new)
                .push(index);
        }

        let fields: Vec<FieldSlot> = if kind == ContainerType::Segment {
            let mut fields: Vec<FieldSlot> = child_ids
                .iter()
                .filter_map(|child| {
                    tree.node(*child).field.clone().map(|spec| FieldSlot {
                        node: *child,
                        spec,
                    })
                })
                .collect();
            fields.sort_by_key(|slot| slot.spec.sequence());
            fields
        } else {
            Vec::new()
        };

        let match_id = match kind {
            ContainerType::Segment => Some(node_id.clone()),
            k if k.is_element() => None,
            _ => child_ids
                .iter()
                .find_map(|child| tree.node(*child).match_id.clone()),
        };

        let node = &mut tree.nodes[id.index()];
        node.field = field;
        node.children = child_ids;
        node.slots_by_key = slots_by_key;
        node.fields = fields;
        node.match_id = match_id;

        self.check_references(tree, id)?;
        Ok(id)
    }

    fn finish_element(
        &self,
        mut element: ElementSpec,
        check: Option<&str>,
        node: &TemplateNode,
    ) -> Result<ElementSpec> {
        element.sequence = node.sequence;
        element.required = node.required;
        element.used = node.used;
        element.occurs = node.occurs;
        if element.kind == ElementKind::Real && self.options.preserve_real_precision {
            element.preserve_precision = true;
        }
        if let Some(name) = check {
            element.check = Some(self.callbacks.resolve(name)?);
        }
        Ok(element)
    }

    fn check_references(&self, tree: &TemplateTree, id: TemplateId) -> Result<()> {
        let node = tree.node(id);

        if !node.rules.is_empty() {
            let positions: Vec<usize> = match node.kind {
                ContainerType::Segment => {
                    node.fields.iter().map(|slot| slot.spec.sequence()).collect()
                }
                ContainerType::CompositeElement => match &node.field {
                    Some(FieldSpec::Composite(composite)) => {
                        composite.components.iter().map(|c| c.sequence).collect()
                    }
                    _ => Vec::new(),
                },
                _ => {
                    return Err(Error::invalid_rule(
                        node.rules[0].to_string(),
                        format!("rules are not allowed on {} '{}'", node.kind, node.id),
                    ));
                }
            };
            for rule in &node.rules {
                if let Some(missing) = rule.positions.iter().find(|p| !positions.contains(p)) {
                    return Err(Error::invalid_rule(
                        rule.to_string(),
                        format!("'{}' has no field at position {missing}", node.id),
                    ));
                }
            }
        }

        if let Some(pre) = &node.prevalidate {
            let first = match node.kind {
                ContainerType::Segment => Some(id),
                _ => node
                    .match_id
                    .as_deref()
                    .and_then(|seg| tree.find_segment(id, seg)),
            };
            let known = first.is_some_and(|seg| tree.field_at(seg, pre.position).is_some());
            if !known {
                return Err(Error::InvalidFormat(format!(
                    "prevalidation of '{}' refers to missing field {}",
                    node.id, pre.position
                )));
            }
        }

        if let Some(link) = &node.control {
            if !node.kind.is_control_level() {
                return Err(Error::invalid_control(
                    &node.id,
                    format!("{} cannot carry a control link", node.kind),
                ));
            }
            let segments = tree.control_segments(id);
            for wanted in [&link.header, &link.trailer] {
                if !segments.iter().any(|s| &tree.node(*s).id == wanted) {
                    return Err(Error::invalid_control(
                        &node.id,
                        format!("no '{wanted}' segment directly inside"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlLink;
    use edi_ir::ContainerKey;

    fn n1_loop() -> NodeSpec {
        NodeSpec::looped("N1")
            .occurs(Occurs::Bounded(200))
            .child(
                NodeSpec::segment("N1")
                    .required()
                    .field(ElementSpec::new("N101", ElementKind::Id).length(2, 3).required())
                    .field(ElementSpec::new("N102", ElementKind::Char).length(1, 60))
                    .field(ElementSpec::new("N103", ElementKind::Id).length(1, 2))
                    .field(ElementSpec::new("N104", ElementKind::Char).length(2, 80))
                    .rule(ElementRule::from_syntax_note("P0304").unwrap()),
            )
            .child(NodeSpec::segment("N3").occurs(Occurs::Bounded(2)))
    }

    fn template() -> NodeSpec {
        NodeSpec::envelope("ENV")
            .control(ControlLink::new("ISA", "IEA"))
            .child(NodeSpec::segment("ISA").required())
            .child(
                NodeSpec::group("GS_LOOP").repeating().child(
                    NodeSpec::transaction("850").repeating().child(
                        NodeSpec::table("HEADER")
                            .child(NodeSpec::segment("ST").required())
                            .child(NodeSpec::segment("REF").sequence(50).occurs(Occurs::ONCE))
                            .child(NodeSpec::segment("REF").sequence(50).occurs(Occurs::ONCE))
                            .child(n1_loop())
                            .child(NodeSpec::segment("SE").required()),
                    ),
                ),
            )
            .child(NodeSpec::segment("IEA").required())
    }

    #[test]
    fn test_build_assigns_match_ids() {
        let tree = template().build("850").unwrap();
        let root = tree.root();
        let group = tree.child(root, 1).unwrap();
        assert_eq!(tree.node(group).match_id(), Some("ST"));
        let table = tree.children(tree.child(group, 0).unwrap())[0];
        let n1 = tree.child(table, 3).unwrap();
        assert_eq!(tree.node(n1).kind, ContainerType::Loop);
        assert_eq!(tree.node(n1).match_id(), Some("N1"));
    }

    #[test]
    fn test_segment_fields_are_ordered() {
        let tree = template().build("850").unwrap();
        let n1 = tree.find_segment(tree.root(), "N1").unwrap();
        let ids: Vec<&str> = tree.node(n1).fields().iter().map(|f| f.spec.id()).collect();
        assert_eq!(ids, vec!["N101", "N102", "N103", "N104"]);
        assert!(tree.node(n1).fields()[0].spec.required());
        assert_eq!(tree.max_field(n1), 4);
    }

    #[test]
    fn test_equivalence_run() {
        let tree = template().build("850").unwrap();
        let table = tree.children(tree.children(tree.child(tree.root(), 1).unwrap())[0])[0];
        assert!(tree.equivalent_to_next(table, 1));
        assert!(!tree.equivalent_to_next(table, 2));
        assert_eq!(tree.equivalence_start(table, 2), 1);
        assert_eq!(tree.slots_for(table, &ContainerKey::segment("REF")), &[1, 2]);
    }

    #[test]
    fn test_illegal_containment_is_rejected() {
        let bad = NodeSpec::envelope("ENV").child(NodeSpec::looped("L1"));
        let err = bad.build("bad").unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalContainment {
                parent: ContainerType::Envelope,
                child: ContainerType::Loop,
                ..
            }
        ));
    }

    #[test]
    fn test_root_must_be_envelope() {
        let err = NodeSpec::segment("ST").build("bad").unwrap_err();
        assert!(matches!(err, Error::InvalidRoot(ContainerType::Segment)));
    }

    #[test]
    fn test_rule_positions_must_exist() {
        let bad = NodeSpec::envelope("ENV").child(
            NodeSpec::segment("N1")
                .field(ElementSpec::new("N101", ElementKind::Id))
                .rule(ElementRule::from_syntax_note("P0102").unwrap()),
        );
        assert!(matches!(bad.build("bad"), Err(Error::InvalidRule { .. })));
    }

    #[test]
    fn test_control_link_segments_must_exist() {
        let bad = NodeSpec::envelope("ENV")
            .control(ControlLink::new("ISA", "IEA"))
            .child(NodeSpec::segment("ISA"));
        assert!(matches!(bad.build("bad"), Err(Error::InvalidControl { .. })));
    }

    #[test]
    fn test_unknown_check_is_rejected() {
        let spec = NodeSpec::envelope("ENV").child(
            NodeSpec::segment("BEG")
                .child(NodeSpec::element(ElementSpec::new("BEG01", ElementKind::Id)).check("nope")),
        );
        assert!(matches!(
            spec.build("bad"),
            Err(Error::UnknownCallback(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_real_precision_option() {
        let spec = NodeSpec::envelope("ENV").child(
            NodeSpec::segment("MEA").field(ElementSpec::new("MEA03", ElementKind::Real)),
        );
        let tree = TreeBuilder::new("t")
            .options(ElementOptions {
                preserve_real_precision: true,
            })
            .build(spec)
            .unwrap();
        let mea = tree.find_segment(tree.root(), "MEA").unwrap();
        match &tree.node(mea).fields()[0].spec {
            FieldSpec::Data(el) => assert!(el.preserve_precision),
            FieldSpec::Composite(_) => panic!("expected a data element"),
        }
    }

    #[test]
    fn test_composite_components() {
        let spec = NodeSpec::envelope("ENV").child(
            NodeSpec::segment("SV1").child(
                NodeSpec::composite("SV101")
                    .required()
                    .field(ElementSpec::new("SV10101", ElementKind::Id).required())
                    .field(ElementSpec::new("SV10102", ElementKind::Char)),
            ),
        );
        let tree = spec.build("t").unwrap();
        let sv1 = tree.find_segment(tree.root(), "SV1").unwrap();
        let FieldSpec::Composite(c) = &tree.node(sv1).fields()[0].spec else {
            panic!("expected a composite");
        };
        assert_eq!(c.components.len(), 2);
        assert_eq!(c.components[1].sequence, 2);
        assert!(c.required);
    }
}
