//! The immutable template tree
//!
//! Nodes live in one arena and refer to each other through [`TemplateId`].
//! A tree is only produced by the builder, so every handle it hands out is
//! valid for that tree.

use crate::control::ControlLink;
use crate::rules::ElementRule;
use edi_ir::{
    CompositeElement, CompositeSpec, ContainerKey, ContainerType, DataElement, ElementSpec, Field,
    Occurs, TemplateId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Template-wide element options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementOptions {
    /// Keep the parsed fraction digit count when re-formatting reals
    #[serde(default)]
    pub preserve_real_precision: bool,
}

/// Primary-field predicate that tells variants with the same first segment apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prevalidation {
    /// 1-based field position in the first segment
    pub position: usize,
    /// 1-based component position when the field is a composite
    #[serde(default)]
    pub component: Option<usize>,
    /// Accepted values
    pub codes: Vec<String>,
}

impl Prevalidation {
    pub fn new<I, S>(position: usize, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            position,
            component: None,
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Narrow the predicate to a composite component
    #[must_use]
    pub fn component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    /// Whether the live field value selects this variant
    #[must_use]
    pub fn accepts(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| {
            let v = v.trim_end();
            self.codes.iter().any(|code| code == v)
        })
    }
}

/// Metadata of one segment field
#[derive(Debug, Clone)]
pub enum FieldSpec {
    Data(Arc<ElementSpec>),
    Composite(Arc<CompositeSpec>),
}

impl FieldSpec {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            FieldSpec::Data(spec) => &spec.id,
            FieldSpec::Composite(spec) => &spec.id,
        }
    }

    /// 1-based field position
    #[must_use]
    pub fn sequence(&self) -> usize {
        match self {
            FieldSpec::Data(spec) => spec.sequence,
            FieldSpec::Composite(spec) => spec.sequence,
        }
    }

    #[must_use]
    pub fn required(&self) -> bool {
        match self {
            FieldSpec::Data(spec) => spec.required,
            FieldSpec::Composite(spec) => spec.required,
        }
    }

    #[must_use]
    pub fn occurs(&self) -> Occurs {
        match self {
            FieldSpec::Data(spec) => spec.occurs,
            FieldSpec::Composite(spec) => spec.occurs,
        }
    }

    /// Fresh, empty runtime field
    #[must_use]
    pub fn instantiate(&self) -> Field {
        match self {
            FieldSpec::Data(spec) => Field::Data(DataElement::new(Arc::clone(spec))),
            FieldSpec::Composite(spec) => {
                Field::Composite(CompositeElement::new(Arc::clone(spec)))
            }
        }
    }
}

/// A segment field together with the node that declared it
#[derive(Debug, Clone)]
pub struct FieldSlot {
    pub node: TemplateId,
    pub spec: FieldSpec,
}

/// One node of the template tree
#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub kind: ContainerType,
    pub id: String,
    pub name: String,
    pub occurs: Occurs,
    pub required: bool,
    pub used: bool,
    /// Declared sequence position among siblings
    pub sequence: usize,
    pub parent: Option<TemplateId>,
    pub prevalidate: Option<Prevalidation>,
    /// Cross-field rules (Segment and CompositeElement nodes)
    pub rules: Vec<ElementRule>,
    /// Header/trailer linkage (control levels)
    pub control: Option<ControlLink>,
    /// Field metadata (DataElement and CompositeElement nodes)
    pub field: Option<FieldSpec>,
    pub(crate) children: Vec<TemplateId>,
    pub(crate) slots_by_key: HashMap<ContainerKey, Vec<usize>>,
    pub(crate) fields: Vec<FieldSlot>,
    pub(crate) match_id: Option<String>,
}

impl TemplateNode {
    pub(crate) fn new(kind: ContainerType, id: String, parent: Option<TemplateId>) -> Self {
        Self {
            kind,
            name: id.clone(),
            id,
            occurs: Occurs::ONCE,
            required: false,
            used: true,
            sequence: 0,
            parent,
            prevalidate: None,
            rules: Vec::new(),
            control: None,
            field: None,
            children: Vec::new(),
            slots_by_key: HashMap::new(),
            fields: Vec::new(),
            match_id: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(self.kind, self.id.clone())
    }

    #[must_use]
    pub fn children(&self) -> &[TemplateId] {
        &self.children
    }

    /// Segment id that opens this node (Tables are transparent)
    #[must_use]
    pub fn match_id(&self) -> Option<&str> {
        self.match_id.as_deref()
    }

    /// Ordered fields of a Segment node
    #[must_use]
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }
}

/// Immutable, shareable message template
#[derive(Debug, Clone)]
pub struct TemplateTree {
    pub(crate) name: String,
    pub(crate) nodes: Vec<TemplateNode>,
    pub(crate) options: ElementOptions,
}

impl TemplateTree {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Envelope node
    #[must_use]
    pub fn root(&self) -> TemplateId {
        TemplateId(0)
    }

    #[must_use]
    pub fn options(&self) -> ElementOptions {
        self.options
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node behind a handle issued by this tree
    #[must_use]
    pub fn node(&self, id: TemplateId) -> &TemplateNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn get(&self, id: TemplateId) -> Option<&TemplateNode> {
        self.nodes.get(id.index())
    }

    #[must_use]
    pub fn children(&self, id: TemplateId) -> &[TemplateId] {
        &self.node(id).children
    }

    /// Child slot `index` of `parent`
    #[must_use]
    pub fn child(&self, parent: TemplateId, index: usize) -> Option<TemplateId> {
        self.node(parent).children.get(index).copied()
    }

    /// Slot indices of `parent`'s children carrying `key`
    #[must_use]
    pub fn slots_for(&self, parent: TemplateId, key: &ContainerKey) -> &[usize] {
        self.node(parent)
            .slots_by_key
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Same id, kind and declared sequence
    #[must_use]
    pub fn equivalent(&self, a: TemplateId, b: TemplateId) -> bool {
        let (a, b) = (self.node(a), self.node(b));
        a.kind == b.kind && a.id == b.id && a.sequence == b.sequence
    }

    /// Whether slot `index` of `parent` is equivalent to the slot after it
    #[must_use]
    pub fn equivalent_to_next(&self, parent: TemplateId, index: usize) -> bool {
        match (self.child(parent, index), self.child(parent, index + 1)) {
            (Some(a), Some(b)) => self.equivalent(a, b),
            _ => false,
        }
    }

    /// First slot of the equivalence run containing `index`
    #[must_use]
    pub fn equivalence_start(&self, parent: TemplateId, index: usize) -> usize {
        let mut start = index;
        while start > 0 && self.equivalent_to_next(parent, start - 1) {
            start -= 1;
        }
        start
    }

    /// Whether a later slot of the run containing `index` is still open
    #[must_use]
    pub fn has_later_equivalent(&self, parent: TemplateId, index: usize) -> bool {
        self.equivalent_to_next(parent, index)
    }

    /// Field at 1-based `position` of a Segment node
    #[must_use]
    pub fn field_at(&self, segment: TemplateId, position: usize) -> Option<&FieldSlot> {
        self.node(segment)
            .fields
            .iter()
            .find(|slot| slot.spec.sequence() == position)
    }

    /// Highest field position declared by a Segment node
    #[must_use]
    pub fn max_field(&self, segment: TemplateId) -> usize {
        self.node(segment)
            .fields
            .iter()
            .map(|slot| slot.spec.sequence())
            .max()
            .unwrap_or(0)
    }

    /// Nodes below and including `from`, parents before children
    #[must_use]
    pub fn walk(&self, from: TemplateId) -> Vec<TemplateId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// First Segment node with `id` below `from`
    #[must_use]
    pub fn find_segment(&self, from: TemplateId, id: &str) -> Option<TemplateId> {
        self.walk(from).into_iter().find(|t| {
            let node = self.node(*t);
            node.kind == ContainerType::Segment && node.id == id
        })
    }

    /// Segment slots directly under a control level, looking through Tables
    #[must_use]
    pub fn control_segments(&self, level: TemplateId) -> Vec<TemplateId> {
        let mut out = Vec::new();
        for child in self.children(level) {
            let node = self.node(*child);
            match node.kind {
                ContainerType::Segment => out.push(*child),
                ContainerType::Table => out.extend(
                    node.children
                        .iter()
                        .copied()
                        .filter(|t| self.node(*t).kind == ContainerType::Segment),
                ),
                _ => {}
            }
        }
        out
    }

    /// Indented outline of the tree
    #[must_use]
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(self.root(), 0, &mut out);
        out
    }

    fn outline_into(&self, id: TemplateId, depth: usize, out: &mut String) {
        let node = self.node(id);
        if node.kind.is_element() {
            return;
        }
        out.push_str(&format!(
            "{:indent$}{} {} [{}{}]\n",
            "",
            node.kind,
            node.id,
            node.occurs,
            if node.required { ", required" } else { "" },
            indent = depth * 2
        ));
        for child in &node.children {
            self.outline_into(*child, depth + 1, out);
        }
    }
}
