//! Arena-backed document model.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]; detached
//! nodes stay in the arena so stale ids keep answering queries (they just
//! report `is_connected() == false`). Mutations are queued per observer only
//! while at least one observer is registered.

mod html;
mod style;

use pathmark_common::record::BoundingBox;
use std::collections::BTreeMap;
use thiserror::Error;

pub use style::{parse_declarations, serialize_declarations};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("HTML parse error: {0}")]
    Parse(String),
    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("Node {0:?} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("Cannot insert {child:?} into {parent:?}: would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    attrs: Vec<(String, String)>,
    value: Option<String>,
    rect: BoundingBox,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A single change to the tree, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. } => *target,
        }
    }
}

/// Pending step of a serialization walk.
enum Visit<'a> {
    Open(NodeId),
    Close(&'a str),
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    observers: BTreeMap<ObserverId, Vec<MutationRecord>>,
    next_observer: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            observers: BTreeMap::new(),
            next_observer: 0,
        }
    }

    /// Parses an HTML document or fragment into a new document.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        html::parse(source)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached element. Tag names are stored lower-cased.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: None,
            rect: BoundingBox::default(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(_) => Err(DomError::NotAnElement(id)),
            None => Err(DomError::UnknownNode(id)),
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Inserts `child` at `index` among `parent`'s children, detaching it from
    /// its previous parent first.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), DomError> {
        for id in [parent, child] {
            if !self.contains_node(id) {
                return Err(DomError::UnknownNode(id));
            }
        }
        if matches!(self.nodes[parent.0].kind, NodeKind::Text(_)) {
            return Err(DomError::NotAnElement(parent));
        }
        if child == self.root || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }

        let mut index = index;
        if let Some(old_parent) = self.nodes[child.0].parent {
            if old_parent == parent
                && let Some(pos) = self.nodes[parent.0].children.iter().position(|c| *c == child)
                && pos < index
            {
                index -= 1;
            }
            self.detach(child);
        }

        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detaches a node (and its subtree) from its parent. Returns false when
    /// the node had no parent.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.contains_node(id) || self.nodes[id.0].parent.is_none() {
            return false;
        }
        self.detach(id);
        true
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![id],
        });
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value when present and not blank.
    pub fn non_empty_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute(id, name).filter(|v| !v.trim().is_empty())
    }

    /// Attributes in source order.
    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        self.element(id).map(|e| e.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(id)?;
        match element.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attrs.push((name.clone(), value.to_string())),
        }
        self.record(MutationRecord::Attributes { target: id, name });
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool, DomError> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(id)?;
        let before = element.attrs.len();
        element.attrs.retain(|(k, _)| *k != name);
        let removed = element.attrs.len() != before;
        if removed {
            self.record(MutationRecord::Attributes { target: id, name });
        }
        Ok(removed)
    }

    pub fn class_tokens(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.class_tokens(id).contains(&class_name)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            match &node.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Document | NodeKind::Element(_) => {
                    stack.extend(node.children.iter().rev());
                }
            }
        }
    }

    /// Current form value, following the rules of the matching HTML control.
    pub fn value(&self, id: NodeId) -> String {
        let Some(element) = self.element(id) else {
            return String::new();
        };
        if let Some(live) = &element.value {
            return live.clone();
        }
        match element.tag_name.as_str() {
            "input" | "button" | "li" | "data" | "meter" | "progress" | "param" => {
                self.attribute(id, "value").unwrap_or_default().to_string()
            }
            "option" => self
                .attribute(id, "value")
                .map(str::to_string)
                .unwrap_or_else(|| self.text_content(id).trim().to_string()),
            "textarea" => self.text_content(id),
            "select" => {
                let options = self.descendants_by_tag(id, "option");
                options
                    .iter()
                    .find(|o| self.attribute(**o, "selected").is_some())
                    .or(options.first())
                    .map(|o| self.value(*o))
                    .unwrap_or_default()
            }
            _ => String::new(),
        }
    }

    /// Sets the live value, as typing into a control would. Not a mutation.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?.value = Some(value.to_string());
        Ok(())
    }

    /// Layout box supplied by the host; zero when never measured.
    pub fn rect(&self, id: NodeId) -> BoundingBox {
        self.element(id).map(|e| e.rect).unwrap_or_default()
    }

    pub fn set_rect(&mut self, id: NodeId, rect: BoundingBox) -> Result<(), DomError> {
        self.element_mut(id)?.rect = rect;
        Ok(())
    }

    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    pub fn set_style_property(
        &mut self,
        id: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let mut decls = parse_declarations(self.attribute(id, "style").unwrap_or_default());
        match decls.iter_mut().find(|(k, _)| k == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        self.set_attribute(id, "style", &serialize_declarations(&decls))
    }

    /// Removes one inline style property; drops the `style` attribute when it
    /// ends up empty.
    pub fn remove_style_property(&mut self, id: NodeId, property: &str) -> Result<(), DomError> {
        let Some(style) = self.attribute(id, "style") else {
            return Ok(());
        };
        let mut decls = parse_declarations(style);
        let before = decls.len();
        decls.retain(|(k, _)| k != property);
        if decls.len() == before {
            return Ok(());
        }
        if decls.is_empty() {
            self.remove_attribute(id, "style")?;
        } else {
            self.set_attribute(id, "style", &serialize_declarations(&decls))?;
        }
        Ok(())
    }

    /// All connected elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    /// Descendant elements of `id` (excluding `id`) in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(id) {
            self.collect_elements(*child, &mut out);
        }
        out
    }

    fn descendants_by_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some(tag))
            .collect()
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        // Iterative so very deep trees cannot exhaust the stack.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.is_element(current) {
                out.push(current);
            }
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
    }

    /// First connected element carrying `id="..."`.
    pub fn element_by_id(&self, id_value: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id_value))
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, &mut out);
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        // Close tags ride on the same stack as the nodes still to open.
        let mut stack = vec![Visit::Open(id)];
        while let Some(visit) = stack.pop() {
            let current = match visit {
                Visit::Open(current) => current,
                Visit::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };
            let Some(node) = self.node(current) else {
                continue;
            };
            match &node.kind {
                NodeKind::Document => {
                    stack.extend(node.children.iter().rev().map(|c| Visit::Open(*c)));
                }
                NodeKind::Text(text) => out.push_str(&html::escape_text(text)),
                NodeKind::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (k, v) in &element.attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        out.push_str(&html::escape_attribute(v));
                        out.push('"');
                    }
                    out.push('>');
                    if html::is_void_tag(&element.tag_name) {
                        continue;
                    }
                    stack.push(Visit::Close(&element.tag_name));
                    stack.extend(node.children.iter().rev().map(|c| Visit::Open(*c)));
                }
            }
        }
    }

    /// Starts queueing mutation records for a new observer.
    pub fn observe(&mut self) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(id, Vec::new());
        id
    }

    /// Stops queueing for `observer` and drops anything still pending.
    pub fn disconnect(&mut self, observer: ObserverId) -> bool {
        self.observers.remove(&observer).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Drains the records queued for `observer` since the last call.
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&observer)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn record(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        for queue in self.observers.values_mut() {
            queue.push(record.clone());
        }
    }
}
