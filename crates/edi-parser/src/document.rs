//! Runtime document trees
//!
//! A [`Document`] is an arena of [`Container`]s. Each container points at
//! the template node it instantiates and at its parent by handle; children
//! are grouped per template slot, in slot order, with a key index over the
//! groups. Segment fields are materialized on first write.

use crate::{Error, Result};
use edi_ir::container::check_containment;
use edi_ir::{
    ContainerId, ContainerKey, ContainerType, Field, Position, TemplateId,
};
use edi_schema::TemplateTree;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ChildGroup {
    slot: usize,
    instances: Vec<ContainerId>,
}

/// One runtime container
#[derive(Debug, Clone)]
pub struct Container {
    pub template: TemplateId,
    pub kind: ContainerType,
    pub key: ContainerKey,
    pub parent: Option<ContainerId>,
    /// Source position of the container's first segment
    pub position: Position,
    groups: Vec<ChildGroup>,
    groups_by_key: HashMap<ContainerKey, Vec<usize>>,
    fields: BTreeMap<usize, Field>,
}

impl Container {
    fn new(
        template: TemplateId,
        kind: ContainerType,
        key: ContainerKey,
        parent: Option<ContainerId>,
        position: Position,
    ) -> Self {
        Self {
            template,
            kind,
            key,
            parent,
            position,
            groups: Vec::new(),
            groups_by_key: HashMap::new(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// Children in slot order, instances in insertion order
    pub fn children(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.groups.iter().flat_map(|g| g.instances.iter().copied())
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        self.groups.iter().any(|g| !g.instances.is_empty())
    }

    /// Instances occupying template slot `slot`
    #[must_use]
    pub fn instances(&self, slot: usize) -> &[ContainerId] {
        self.groups
            .iter()
            .find(|g| g.slot == slot)
            .map(|g| g.instances.as_slice())
            .unwrap_or_default()
    }

    /// Template slot holding `child`
    #[must_use]
    pub fn slot_of(&self, child: ContainerId) -> Option<usize> {
        self.groups
            .iter()
            .find(|g| g.instances.contains(&child))
            .map(|g| g.slot)
    }

    /// Materialized fields by 1-based position
    pub fn fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields.iter().map(|(pos, field)| (*pos, field))
    }

    #[must_use]
    pub fn field(&self, position: usize) -> Option<&Field> {
        self.fields.get(&position)
    }

    /// Highest position holding data
    #[must_use]
    pub fn last_field(&self) -> usize {
        self.fields
            .iter()
            .rev()
            .find(|(_, f)| f.has_content())
            .map_or(0, |(pos, _)| *pos)
    }

    fn push_child(&mut self, slot: usize, key: ContainerKey, child: ContainerId) {
        match self.groups.binary_search_by_key(&slot, |g| g.slot) {
            Ok(index) => self.groups[index].instances.push(child),
            Err(index) => {
                self.groups.insert(
                    index,
                    ChildGroup {
                        slot,
                        instances: vec![child],
                    },
                );
                self.reindex_from(index, key);
            }
        }
    }

    fn reindex_from(&mut self, inserted: usize, key: ContainerKey) {
        for positions in self.groups_by_key.values_mut() {
            for p in positions.iter_mut().filter(|p| **p >= inserted) {
                *p += 1;
            }
        }
        let positions = self.groups_by_key.entry(key).or_default();
        positions.push(inserted);
        positions.sort_unstable();
    }

    fn remove_child(&mut self, child: ContainerId) -> bool {
        let Some(index) = self
            .groups
            .iter()
            .position(|g| g.instances.contains(&child))
        else {
            return false;
        };
        self.groups[index].instances.retain(|c| *c != child);
        if self.groups[index].instances.is_empty() {
            self.groups.remove(index);
            for positions in self.groups_by_key.values_mut() {
                positions.retain(|p| *p != index);
                for p in positions.iter_mut().filter(|p| **p > index) {
                    *p -= 1;
                }
            }
            self.groups_by_key.retain(|_, positions| !positions.is_empty());
        }
        true
    }
}

/// A parsed (or programmatically built) document
#[derive(Debug, Clone)]
pub struct Document {
    template: Arc<TemplateTree>,
    nodes: Vec<Container>,
}

impl Document {
    /// Empty document holding only the root container
    pub fn new(template: Arc<TemplateTree>) -> Self {
        let root = template.root();
        let node = template.node(root);
        let container = Container::new(root, node.kind, node.key(), None, Position::default());
        Self {
            template,
            nodes: vec![container],
        }
    }

    pub fn template(&self) -> &Arc<TemplateTree> {
        &self.template
    }

    #[must_use]
    pub fn root(&self) -> ContainerId {
        ContainerId(0)
    }

    /// Number of containers, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing was added under the root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.nodes[0].has_children()
    }

    /// # Panics
    ///
    /// Panics when `id` does not belong to this document.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> &Container {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn get(&self, id: ContainerId) -> Option<&Container> {
        self.nodes.get(id.index())
    }

    #[must_use]
    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.container(id).parent
    }

    #[must_use]
    pub fn children(&self, id: ContainerId) -> Vec<ContainerId> {
        self.container(id).children().collect()
    }

    #[must_use]
    pub fn instances(&self, parent: ContainerId, slot: usize) -> &[ContainerId] {
        self.container(parent).instances(slot)
    }

    /// Children of `parent` carrying `key`, across every slot with that key
    #[must_use]
    pub fn children_with_key(&self, parent: ContainerId, key: &ContainerKey) -> Vec<ContainerId> {
        let container = self.container(parent);
        container
            .groups_by_key
            .get(key)
            .into_iter()
            .flatten()
            .flat_map(|g| container.groups[*g].instances.iter().copied())
            .collect()
    }

    /// Keys present under `parent`
    #[must_use]
    pub fn keys(&self, parent: ContainerId) -> BTreeSet<ContainerKey> {
        self.container(parent).groups_by_key.keys().cloned().collect()
    }

    /// Instantiate template slot `slot` of `parent`'s template under `parent`
    ///
    /// # Errors
    ///
    /// Fails for an unknown slot, a kind the parent may not hold, or a slot
    /// already holding `occurs` instances.
    pub fn insert_child(
        &mut self,
        parent: ContainerId,
        slot: usize,
        position: Position,
    ) -> Result<ContainerId> {
        let parent_node = self.container(parent);
        let parent_kind = parent_node.kind;
        let existing = parent_node.instances(slot).len();
        let child_template = self
            .template
            .child(parent_node.template, slot)
            .ok_or_else(|| Error::NoSlot {
                parent: parent_node.key.to_string(),
                id: format!("slot {slot}"),
            })?;
        let node = self.template.node(child_template);
        check_containment(parent_kind, node.kind)?;
        if !node.occurs.can_add(existing) {
            return Err(edi_ir::Error::occurs_exceeded(
                &node.id,
                node.occurs.limit().unwrap_or_default(),
            )
            .into());
        }

        let id = ContainerId(self.nodes.len());
        let key = node.key();
        self.nodes.push(Container::new(
            child_template,
            node.kind,
            key.clone(),
            Some(parent),
            position,
        ));
        self.nodes[parent.index()].push_child(slot, key, id);
        Ok(id)
    }

    /// Add a child by kind and id, into the first slot with room
    ///
    /// # Errors
    ///
    /// Fails when the parent's template has no such child, or every slot
    /// with that key is full.
    pub fn append(
        &mut self,
        parent: ContainerId,
        kind: ContainerType,
        id: &str,
    ) -> Result<ContainerId> {
        let key = ContainerKey::new(kind, id);
        let parent_node = self.container(parent);
        let slots = self.template.slots_for(parent_node.template, &key);
        if slots.is_empty() {
            return Err(Error::NoSlot {
                parent: parent_node.key.to_string(),
                id: key.to_string(),
            });
        }
        let open = slots.iter().copied().find(|slot| {
            self.template
                .child(parent_node.template, *slot)
                .is_some_and(|t| {
                    self.template
                        .node(t)
                        .occurs
                        .can_add(parent_node.instances(*slot).len())
                })
        });
        // A full key reports through insert_child's occurs check
        let slot = open.unwrap_or(slots[slots.len() - 1]);
        self.insert_child(parent, slot, Position::default())
    }

    /// Shorthand for appending a segment
    ///
    /// # Errors
    ///
    /// See [`Document::append`].
    pub fn append_segment(&mut self, parent: ContainerId, id: &str) -> Result<ContainerId> {
        self.append(parent, ContainerType::Segment, id)
    }

    /// Remove a childless container that was created last
    pub(crate) fn discard(&mut self, id: ContainerId) -> bool {
        let node = self.container(id);
        let Some(parent) = node.parent else {
            return false;
        };
        if node.has_children() || !node.fields.is_empty() || id.index() + 1 != self.nodes.len() {
            return false;
        }
        self.nodes[parent.index()].remove_child(id);
        self.nodes.pop();
        true
    }

    #[must_use]
    pub fn field(&self, segment: ContainerId, position: usize) -> Option<&Field> {
        self.container(segment).field(position)
    }

    /// Field at `position`, created from the template when first touched
    ///
    /// # Errors
    ///
    /// Fails when the segment's template declares no field there.
    pub fn field_mut(&mut self, segment: ContainerId, position: usize) -> Result<&mut Field> {
        let node = &self.nodes[segment.index()];
        if !node.fields.contains_key(&position) {
            let slot = self
                .template
                .field_at(node.template, position)
                .ok_or_else(|| Error::NoSuchField {
                    segment: node.key.id.clone(),
                    position,
                })?;
            let field = slot.spec.instantiate();
            self.nodes[segment.index()].fields.insert(position, field);
        }
        let node = &mut self.nodes[segment.index()];
        node.fields.get_mut(&position).ok_or_else(|| Error::NoSuchField {
            segment: node.key.id.clone(),
            position,
        })
    }

    /// Set a simple field, or component 1 of a composite
    ///
    /// # Errors
    ///
    /// Fails for an unknown position or a value the element rejects.
    pub fn set_value(&mut self, segment: ContainerId, position: usize, text: &str) -> Result<()> {
        match self.field_mut(segment, position)? {
            Field::Data(element) => element.set(text)?,
            Field::Composite(composite) => composite.set(1, text)?,
        }
        Ok(())
    }

    /// Set one component of a composite field
    ///
    /// # Errors
    ///
    /// Fails when the field is not a composite or has no such component.
    pub fn set_component(
        &mut self,
        segment: ContainerId,
        position: usize,
        component: usize,
        text: &str,
    ) -> Result<()> {
        match self.field_mut(segment, position)? {
            Field::Composite(composite) => composite.set(component, text)?,
            Field::Data(element) if component == 1 => element.set(text)?,
            Field::Data(element) => {
                return Err(Error::NoSuchField {
                    segment: element.id().to_string(),
                    position: component,
                });
            }
        }
        Ok(())
    }

    /// Text of a simple field, or of component 1 of a composite
    #[must_use]
    pub fn value(&self, segment: ContainerId, position: usize) -> Option<String> {
        match self.field(segment, position)? {
            Field::Data(element) => element.get(),
            Field::Composite(composite) => composite.get(1),
        }
    }

    /// Containers below and including `from`, parents first
    #[must_use]
    pub fn walk(&self, from: ContainerId) -> Vec<ContainerId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children: Vec<ContainerId> = self.container(id).children().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Segments below `from` in document order
    #[must_use]
    pub fn segments(&self, from: ContainerId) -> Vec<ContainerId> {
        self.walk(from)
            .into_iter()
            .filter(|id| self.container(*id).kind == ContainerType::Segment)
            .collect()
    }

    /// Descendants of `from` (itself excluded) of `kind`
    #[must_use]
    pub fn count(&self, from: ContainerId, kind: ContainerType) -> usize {
        self.walk(from)
            .into_iter()
            .skip(1)
            .filter(|id| self.container(*id).kind == kind)
            .count()
    }

    /// First container of `kind` and `id` below and including `from`
    #[must_use]
    pub fn find(&self, from: ContainerId, kind: ContainerType, id: &str) -> Option<ContainerId> {
        self.walk(from).into_iter().find(|c| {
            let node = self.container(*c);
            node.kind == kind && node.key.id == id
        })
    }

    /// Every container of `kind` below and including `from`
    #[must_use]
    pub fn find_all(&self, from: ContainerId, kind: ContainerType) -> Vec<ContainerId> {
        self.walk(from)
            .into_iter()
            .filter(|c| self.container(*c).kind == kind)
            .collect()
    }

    /// Nearest ancestor of `kind`, `id` included
    #[must_use]
    pub fn enclosing(&self, id: ContainerId, kind: ContainerType) -> Option<ContainerId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if self.container(c).kind == kind {
                return Some(c);
            }
            current = self.parent(c);
        }
        None
    }

    /// Handles from the root down to `id`
    #[must_use]
    pub fn path(&self, id: ContainerId) -> Vec<ContainerId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Deepest container under `from` whose newest child is a segment
    ///
    /// Follows the most recently created child at each level.
    #[must_use]
    pub fn last_consumer(&self, from: ContainerId) -> Option<ContainerId> {
        let mut current = from;
        loop {
            let newest = self.container(current).children().max()?;
            if self.container(newest).kind == ContainerType::Segment {
                return Some(current);
            }
            current = newest;
        }
    }

    /// Indented listing of the runtime tree
    #[must_use]
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for id in self.walk(self.root()) {
            let node = self.container(id);
            let depth = self.path(id).len() - 1;
            let _ = write!(out, "{:indent$}{} {}", "", node.kind, node.key.id, indent = depth * 2);
            if node.kind == ContainerType::Segment {
                let _ = write!(out, " @{}", node.position.offset);
            }
            out.push('\n');
        }
        out
    }

    fn same_subtree(&self, a: ContainerId, other: &Document, b: ContainerId) -> bool {
        let (x, y) = (self.container(a), other.container(b));
        if x.kind != y.kind || x.key != y.key {
            return false;
        }
        let filled = |c: &Container| -> Vec<(usize, Field)> {
            c.fields
                .iter()
                .filter(|(_, f)| f.has_content())
                .map(|(p, f)| (*p, f.clone()))
                .collect()
        };
        if filled(x) != filled(y) {
            return false;
        }
        let (xs, ys) = (self.children(a), other.children(b));
        xs.len() == ys.len()
            && xs
                .iter()
                .zip(&ys)
                .all(|(ca, cb)| self.same_subtree(*ca, other, *cb))
    }
}

/// Structural equality: kinds, keys and field contents, positions ignored
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.same_subtree(self.root(), other, other.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ElementKind, ElementSpec, Occurs};
    use edi_schema::NodeSpec;

    fn template() -> Arc<TemplateTree> {
        let table = NodeSpec::table("HEADER")
            .child(
                NodeSpec::segment("HDR")
                    .required()
                    .field(ElementSpec::new("HDR01", ElementKind::Char).length(1, 10)),
            )
            .child(
                NodeSpec::looped("N1")
                    .occurs(Occurs::Bounded(2))
                    .child(NodeSpec::segment("N1").field(ElementSpec::new("N101", ElementKind::Id))),
            )
            .child(NodeSpec::segment("TRL"));
        let tree = NodeSpec::envelope("INT")
            .child(NodeSpec::group("GRP").child(NodeSpec::transaction("MSG").child(table)))
            .build("test")
            .unwrap();
        Arc::new(tree)
    }

    /// Document with the nesting down to the table already in place
    fn document() -> (Document, ContainerId) {
        let mut doc = Document::new(template());
        let group = doc.append(doc.root(), ContainerType::FunctionalGroup, "GRP").unwrap();
        let message = doc.append(group, ContainerType::TransactionSet, "MSG").unwrap();
        let table = doc.append(message, ContainerType::Table, "HEADER").unwrap();
        (doc, table)
    }

    #[test]
    fn test_insert_respects_occurs() {
        let (mut doc, root) = document();
        doc.insert_child(root, 1, Position::default()).unwrap();
        doc.insert_child(root, 1, Position::default()).unwrap();
        let err = doc.insert_child(root, 1, Position::default()).unwrap_err();
        assert!(matches!(err, Error::Ir(edi_ir::Error::OccursExceeded { limit: 2, .. })));
        assert_eq!(doc.instances(root, 1).len(), 2);
    }

    #[test]
    fn test_segment_occurs_once() {
        let (mut doc, root) = document();
        doc.append_segment(root, "HDR").unwrap();
        assert!(doc.append_segment(root, "HDR").is_err());
        assert!(doc.append_segment(root, "ZZZ").is_err());
    }

    #[test]
    fn test_children_follow_slot_order() {
        let (mut doc, root) = document();
        let trl = doc.append_segment(root, "TRL").unwrap();
        let hdr = doc.append_segment(root, "HDR").unwrap();
        assert_eq!(doc.children(root), vec![hdr, trl]);
        assert_eq!(
            doc.children_with_key(root, &ContainerKey::segment("TRL")),
            vec![trl]
        );
        let keys: Vec<String> = doc.keys(root).into_iter().map(|k| k.id).collect();
        assert_eq!(keys, vec!["HDR", "TRL"]);
    }

    #[test]
    fn test_fields_are_materialized_on_write() {
        let (mut doc, table) = document();
        let hdr = doc.append_segment(table, "HDR").unwrap();
        assert!(doc.field(hdr, 1).is_none());
        doc.set_value(hdr, 1, "HELLO").unwrap();
        assert_eq!(doc.value(hdr, 1).as_deref(), Some("HELLO"));
        assert!(doc.set_value(hdr, 2, "X").is_err());
    }

    #[test]
    fn test_discard_and_last_consumer() {
        let (mut doc, table) = document();
        let lp = doc.append(table, ContainerType::Loop, "N1").unwrap();
        doc.append_segment(lp, "N1").unwrap();
        assert_eq!(doc.last_consumer(doc.root()), Some(lp));

        let empty = doc.append(table, ContainerType::Loop, "N1").unwrap();
        assert!(doc.discard(empty));
        assert_eq!(doc.instances(table, 1).len(), 1);
        assert_eq!(doc.len(), 6);
    }

    #[test]
    fn test_structural_equality_ignores_positions() {
        let (mut a, ta) = document();
        let (mut b, tb) = document();
        let sa = a.append_segment(ta, "HDR").unwrap();
        a.set_value(sa, 1, "X").unwrap();
        let sb = b.insert_child(tb, 0, Position::new(1, 10, 5)).unwrap();
        b.set_value(sb, 1, "X").unwrap();
        assert_eq!(a, b);
        b.set_value(sb, 1, "Y").unwrap();
        assert_ne!(a, b);
    }
}
