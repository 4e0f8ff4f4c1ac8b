//! In-memory render target.
//!
//! `MemoryHost` implements [`HostTree`] over a slotmap arena and records every
//! call it receives as a [`HostOp`]. Tests assert on the serialised tree
//! ([`MemoryHost::inner_html`]) and on the operation log (how many nodes were
//! created, moved, patched).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use slotmap::{SlotMap, new_key_type};
use vtree_core::{HostTree, PropValue, SVG_NAMESPACE};

new_key_type! {
    pub struct NodeHandle;
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateElement { tag: String },
    CreateText { text: String },
    SetText { node: NodeHandle, text: String },
    SetProperty { node: NodeHandle, name: String, value: String },
    SetAttribute { node: NodeHandle, name: String, value: String },
    RemoveAttribute { node: NodeHandle, name: String },
    SetStyle { node: NodeHandle, key: String, value: String },
    AddListener { node: NodeHandle, event: String, capture: bool },
    RemoveListener { node: NodeHandle, event: String, capture: bool },
    /// `moved` when the child was already attached somewhere.
    Insert { parent: NodeHandle, child: NodeHandle, moved: bool },
    Remove { node: NodeHandle },
}

impl HostOp {
    /// Whether the op changes anything visible in the serialised tree.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::AddListener { .. } | HostOp::RemoveListener { .. })
    }
}

#[derive(Clone, Debug)]
enum Kind {
    Element { tag: String, namespace: Option<String> },
    Text(String),
}

#[derive(Clone, Debug)]
struct HostNode {
    kind: Kind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, PropValue>,
    style: BTreeMap<String, String>,
    listeners: BTreeSet<(String, bool)>,
}

impl HostNode {
    fn new(kind: Kind) -> Self {
        HostNode {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            style: BTreeMap::new(),
            listeners: BTreeSet::new(),
        }
    }
}

#[derive(Default)]
pub struct MemoryHost {
    nodes: SlotMap<NodeHandle, HostNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached element to render into. Not logged.
    pub fn create_container(&mut self) -> NodeHandle {
        self.nodes.insert(HostNode::new(Kind::Element {
            tag: "root".into(),
            namespace: None,
        }))
    }

    /// Appends `child` under `parent` without logging, for building
    /// pre-existing output to hydrate.
    pub fn append(&mut self, parent: NodeHandle, child: NodeHandle) {
        self.attach(parent, child, None);
    }

    /// Builds an element with attributes, unlogged.
    pub fn build_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeHandle {
        let mut node = HostNode::new(Kind::Element {
            tag: tag.into(),
            namespace: None,
        });
        for (k, v) in attributes {
            node.attributes.insert(k.to_string(), v.to_string());
        }
        self.nodes.insert(node)
    }

    pub fn build_text(&mut self, text: &str) -> NodeHandle {
        self.nodes.insert(HostNode::new(Kind::Text(text.into())))
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Logged operations that changed the tree.
    pub fn mutations(&self) -> usize {
        self.ops.iter().filter(|op| op.is_mutation()).count()
    }

    pub fn created(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::CreateElement { .. } | HostOp::CreateText { .. }))
            .count()
    }

    pub fn moves(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Insert { moved: true, .. }))
            .count()
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn is_attached(&self, node: NodeHandle) -> bool {
        self.nodes.get(node).is_some_and(|n| n.parent.is_some())
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<String> {
        self.nodes.get(node)?.attributes.get(name).cloned()
    }

    pub fn style(&self, node: NodeHandle, key: &str) -> Option<String> {
        self.nodes.get(node)?.style.get(key).cloned()
    }

    pub fn listeners(&self, node: NodeHandle) -> Vec<(String, bool)> {
        self.nodes
            .get(node)
            .map(|n| n.listeners.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Depth-first search below `root` for the first element named `tag`.
    pub fn find(&self, root: NodeHandle, tag: &str) -> Option<NodeHandle> {
        let n = self.nodes.get(root)?;
        for &c in &n.children {
            if let Some(Kind::Element { tag: t, .. }) = self.nodes.get(c).map(|n| &n.kind)
                && t == tag
            {
                return Some(c);
            }
            if let Some(found) = self.find(c, tag) {
                return Some(found);
            }
        }
        None
    }

    /// Serialised children of `node`.
    pub fn inner_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        if let Some(n) = self.nodes.get(node) {
            for &c in &n.children {
                self.write_html(c, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, id: NodeHandle, out: &mut String) {
        let Some(n) = self.nodes.get(id) else { return };
        let tag = match &n.kind {
            Kind::Text(t) => {
                out.push_str(&escape(t));
                return;
            }
            Kind::Element { tag, .. } => tag,
        };

        let mut attrs: BTreeMap<String, String> = n.attributes.clone();
        for (name, value) in &n.properties {
            let name = if name == "className" { "class" } else { name.as_str() };
            match value {
                PropValue::Bool(false) | PropValue::Null => {}
                PropValue::Bool(true) => {
                    attrs.insert(name.to_string(), String::new());
                }
                v => {
                    if let Some(s) = v.to_attr_string()
                        && !s.is_empty()
                    {
                        attrs.insert(name.to_string(), s);
                    }
                }
            }
        }
        if !n.style.is_empty() {
            let css = n
                .style
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            attrs.insert("style".into(), css);
        }

        let _ = write!(out, "<{tag}");
        for (k, v) in &attrs {
            if v.is_empty() {
                let _ = write!(out, " {k}");
            } else {
                let _ = write!(out, " {k}=\"{}\"", escape(v));
            }
        }
        out.push('>');
        for &c in &n.children {
            self.write_html(c, out);
        }
        let _ = write!(out, "</{tag}>");
    }

    fn detach(&mut self, child: NodeHandle) -> bool {
        let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
        true
    }

    fn attach(&mut self, parent: NodeHandle, child: NodeHandle, before: Option<NodeHandle>) -> bool {
        let moved = self.detach(child);
        let Some(p) = self.nodes.get_mut(parent) else {
            log::warn!("insert into unknown node {parent:?}");
            return moved;
        };
        let at = before.and_then(|b| p.children.iter().position(|c| *c == b));
        if before.is_some() && at.is_none() {
            log::warn!("insert anchor {before:?} is not a child of {parent:?}; appending");
        }
        match at {
            Some(i) => p.children.insert(i, child),
            None => p.children.push(child),
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        moved
    }

    fn node_mut(&mut self, node: &NodeHandle) -> Option<&mut HostNode> {
        let n = self.nodes.get_mut(*node);
        if n.is_none() {
            log::warn!("unknown host node {node:?}");
        }
        n
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl HostTree for MemoryHost {
    type Node = NodeHandle;

    fn create_element(&mut self, tag: &str) -> NodeHandle {
        self.ops.push(HostOp::CreateElement { tag: tag.into() });
        self.nodes.insert(HostNode::new(Kind::Element {
            tag: tag.into(),
            namespace: None,
        }))
    }

    fn create_element_ns(&mut self, namespace: &str, tag: &str) -> NodeHandle {
        self.ops.push(HostOp::CreateElement { tag: tag.into() });
        self.nodes.insert(HostNode::new(Kind::Element {
            tag: tag.into(),
            namespace: Some(namespace.into()),
        }))
    }

    fn create_text(&mut self, text: &str) -> NodeHandle {
        self.ops.push(HostOp::CreateText { text: text.into() });
        self.nodes.insert(HostNode::new(Kind::Text(text.into())))
    }

    fn set_text(&mut self, node: &NodeHandle, text: &str) {
        self.ops.push(HostOp::SetText {
            node: *node,
            text: text.into(),
        });
        if let Some(n) = self.node_mut(node) {
            n.kind = Kind::Text(text.into());
        }
    }

    fn text(&self, node: &NodeHandle) -> Option<String> {
        match &self.nodes.get(*node)?.kind {
            Kind::Text(t) => Some(t.clone()),
            Kind::Element { .. } => None,
        }
    }

    fn tag_name(&self, node: &NodeHandle) -> Option<String> {
        match &self.nodes.get(*node)?.kind {
            Kind::Element { tag, .. } => Some(tag.clone()),
            Kind::Text(_) => None,
        }
    }

    fn is_svg(&self, node: &NodeHandle) -> bool {
        matches!(
            self.nodes.get(*node).map(|n| &n.kind),
            Some(Kind::Element { namespace: Some(ns), .. }) if ns == SVG_NAMESPACE
        )
    }

    fn set_property(&mut self, node: &NodeHandle, name: &str, value: &PropValue) {
        self.ops.push(HostOp::SetProperty {
            node: *node,
            name: name.into(),
            value: value.to_attr_string().unwrap_or_default(),
        });
        if let Some(n) = self.node_mut(node) {
            n.properties.insert(name.into(), value.clone());
        }
    }

    fn property(&self, node: &NodeHandle, name: &str) -> Option<PropValue> {
        self.nodes.get(*node)?.properties.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &NodeHandle, name: &str, value: &str) {
        self.ops.push(HostOp::SetAttribute {
            node: *node,
            name: name.into(),
            value: value.into(),
        });
        if let Some(n) = self.node_mut(node) {
            n.attributes.insert(name.into(), value.into());
        }
    }

    fn remove_attribute(&mut self, node: &NodeHandle, name: &str) {
        self.ops.push(HostOp::RemoveAttribute {
            node: *node,
            name: name.into(),
        });
        if let Some(n) = self.node_mut(node) {
            n.attributes.remove(name);
        }
    }

    fn attributes(&self, node: &NodeHandle) -> Vec<(String, String)> {
        self.nodes
            .get(*node)
            .map(|n| n.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn set_style(&mut self, node: &NodeHandle, key: &str, value: &str) {
        self.ops.push(HostOp::SetStyle {
            node: *node,
            key: key.into(),
            value: value.into(),
        });
        if let Some(n) = self.node_mut(node) {
            if value.is_empty() {
                n.style.remove(key);
            } else {
                n.style.insert(key.into(), value.into());
            }
        }
    }

    fn set_style_text(&mut self, node: &NodeHandle, css: &str) {
        self.ops.push(HostOp::SetStyle {
            node: *node,
            key: String::new(),
            value: css.into(),
        });
        if let Some(n) = self.node_mut(node) {
            n.style.clear();
            for decl in css.split(';') {
                if let Some((k, v)) = decl.split_once(':') {
                    let (k, v) = (k.trim(), v.trim());
                    if !k.is_empty() && !v.is_empty() {
                        n.style.insert(k.into(), v.into());
                    }
                }
            }
        }
    }

    fn add_listener(&mut self, node: &NodeHandle, event: &str, capture: bool) {
        self.ops.push(HostOp::AddListener {
            node: *node,
            event: event.into(),
            capture,
        });
        if let Some(n) = self.node_mut(node) {
            n.listeners.insert((event.into(), capture));
        }
    }

    fn remove_listener(&mut self, node: &NodeHandle, event: &str, capture: bool) {
        self.ops.push(HostOp::RemoveListener {
            node: *node,
            event: event.into(),
            capture,
        });
        if let Some(n) = self.node_mut(node) {
            n.listeners.remove(&(event.to_string(), capture));
        }
    }

    fn insert_before(&mut self, parent: &NodeHandle, child: &NodeHandle, before: Option<&NodeHandle>) {
        let moved = self.attach(*parent, *child, before.copied());
        self.ops.push(HostOp::Insert {
            parent: *parent,
            child: *child,
            moved,
        });
    }

    fn remove(&mut self, node: &NodeHandle) {
        if self.detach(*node) {
            self.ops.push(HostOp::Remove { node: *node });
        }
    }

    fn parent(&self, node: &NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(*node)?.parent
    }

    fn next_sibling(&self, node: &NodeHandle) -> Option<NodeHandle> {
        let parent = self.nodes.get(*node)?.parent?;
        let siblings = &self.nodes.get(parent)?.children;
        let i = siblings.iter().position(|c| c == node)?;
        siblings.get(i + 1).copied()
    }

    fn first_child(&self, node: &NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(*node)?.children.first().copied()
    }

    fn children(&self, node: &NodeHandle) -> Vec<NodeHandle> {
        self.nodes
            .get(*node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }
}
