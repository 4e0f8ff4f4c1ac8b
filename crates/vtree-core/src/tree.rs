//! Rendered-node arena.
//!
//! Every node that took part in a render owns a [`Fiber`]: its vnode plus
//! what reconciliation attached to it (host node, instance, children). Parent
//! links are plain ids, so a subtree can be detached and freed without
//! reference cycles.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::component::Instance;
use crate::node::{NodeType, VNode};
use crate::value::EventHandler;

new_key_type! {
    pub struct NodeId;
}

pub(crate) struct Fiber<N> {
    pub(crate) vnode: VNode,
    /// Identity counter of the output this fiber holds. `None` once a render
    /// of this node failed.
    pub(crate) original: Option<u64>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: u32,
    /// Normalised children; `None` marks an empty slot.
    pub(crate) children: Vec<Option<NodeId>>,
    /// Own host node for elements/text, first descendant host node for
    /// components.
    pub(crate) dom: Option<N>,
    /// Insertion anchor after a component's last placed child.
    pub(crate) next_dom: Option<Option<N>>,
    pub(crate) component: Option<Rc<Instance>>,
    pub(crate) parent_dom: Option<N>,
    pub(crate) svg: bool,
    /// `Some(hydrating)` when the fiber kept server output after a failure.
    pub(crate) hydrating: Option<bool>,
    /// Children were carried over without re-rendering.
    pub(crate) reused_children: bool,
}

impl<N> Fiber<N> {
    fn new(vnode: VNode, parent: Option<NodeId>, depth: u32) -> Self {
        Fiber {
            original: Some(vnode.original()),
            vnode,
            parent,
            depth,
            children: Vec::new(),
            dom: None,
            next_dom: None,
            component: None,
            parent_dom: None,
            svg: false,
            hydrating: None,
            reused_children: false,
        }
    }

    pub(crate) fn is_component(&self) -> bool {
        matches!(self.vnode.ty(), NodeType::Component(_))
    }

    pub(crate) fn is_portal(&self) -> bool {
        self.vnode.ty().component().is_some_and(|c| c.is_portal())
    }
}

type Listeners = HashMap<(String, bool), EventHandler>;

pub(crate) struct Tree<N> {
    fibers: SlotMap<NodeId, Fiber<N>>,
    /// Handlers per host node, keyed by `(event, capture)`.
    pub(crate) listeners: HashMap<N, Listeners>,
}

impl<N: Clone + Eq + Hash> Tree<N> {
    pub(crate) fn new() -> Self {
        Tree {
            fibers: SlotMap::with_key(),
            listeners: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, vnode: VNode, parent: Option<NodeId>, depth: u32) -> NodeId {
        self.fibers.insert(Fiber::new(vnode, parent, depth))
    }

    /// A fresh fiber for re-rendering `id` in place.
    pub(crate) fn insert_copy(&mut self, id: NodeId) -> Option<NodeId> {
        let old = self.fibers.get(id)?;
        let mut copy = Fiber::new(old.vnode.clone(), old.parent, old.depth);
        copy.original = old.original;
        copy.parent_dom = old.parent_dom.clone();
        copy.svg = old.svg;
        copy.hydrating = old.hydrating;
        Some(self.fibers.insert(copy))
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Fiber<N>> {
        self.fibers.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Fiber<N>> {
        self.fibers.get_mut(id)
    }

    /// Frees one fiber. Its children must already be moved or freed.
    pub(crate) fn remove(&mut self, id: NodeId) {
        if let Some(f) = self.fibers.remove(id)
            && !f.children.is_empty()
        {
            log::trace!("freed fiber {:?} still listed {} children", id, f.children.len());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Moves `children` under `parent`, fixing their back links.
    pub(crate) fn adopt(&mut self, parent: NodeId, children: Vec<Option<NodeId>>) {
        for c in children.iter().flatten() {
            if let Some(f) = self.fibers.get_mut(*c) {
                f.parent = Some(parent);
            }
        }
        if let Some(p) = self.fibers.get_mut(parent) {
            p.children = children;
        }
    }

    pub(crate) fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if let Some(p) = self.fibers.get_mut(parent)
            && let Some(slot) = p.children.iter_mut().find(|c| **c == Some(old))
        {
            *slot = Some(new);
        }
    }

    /// First host node after `id` in document order, not crossing its
    /// nearest element ancestor. With `from`, the search starts at that child
    /// index of `id` itself.
    pub(crate) fn dom_sibling(&self, id: NodeId, from: Option<usize>) -> Option<N> {
        let (owner, start) = match from {
            Some(i) => (id, i),
            None => {
                let parent = self.fibers.get(id)?.parent?;
                let pos = self.fibers[parent]
                    .children
                    .iter()
                    .position(|c| *c == Some(id))
                    .map_or(0, |p| p + 1);
                (parent, pos)
            }
        };

        let fiber = self.fibers.get(owner)?;
        for child in fiber.children.iter().skip(start).flatten() {
            if let Some(c) = self.fibers.get(*child)
                && !c.is_portal()
                && let Some(dom) = &c.dom
            {
                return Some(dom.clone());
            }
        }

        if fiber.is_component() && !fiber.is_portal() {
            return self.dom_sibling(owner, None);
        }
        None
    }

    /// Top-level host nodes of a subtree, in order. Portals contribute none.
    pub(crate) fn host_nodes(&self, id: NodeId) -> Vec<N> {
        let mut out = Vec::new();
        self.collect_host_nodes(id, &mut out);
        out
    }

    fn collect_host_nodes(&self, id: NodeId, out: &mut Vec<N>) {
        let Some(f) = self.fibers.get(id) else { return };
        if f.is_portal() {
            return;
        }
        if !f.is_component() {
            if let Some(d) = &f.dom {
                out.push(d.clone());
            }
            return;
        }
        for c in f.children.iter().flatten() {
            self.collect_host_nodes(*c, out);
        }
    }

    /// Recomputes `dom` for component ancestors of `id` after its first host
    /// node changed.
    pub(crate) fn update_parent_dom_pointers(&mut self, id: NodeId) {
        let mut cur = self.fibers.get(id).and_then(|f| f.parent);
        while let Some(p) = cur {
            let Some(fiber) = self.fibers.get(p) else { break };
            if !fiber.is_component() || fiber.is_portal() {
                break;
            }
            let first = fiber
                .children
                .iter()
                .flatten()
                .filter_map(|c| self.fibers.get(*c))
                .find_map(|c| c.dom.clone());
            let parent = fiber.parent;
            if let Some(f) = self.fibers.get_mut(p) {
                f.dom = first;
            }
            cur = parent;
        }
    }

    /// Component names from `id` outward.
    pub(crate) fn component_stack(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            let Some(f) = self.fibers.get(i) else { break };
            if let Some(c) = f.vnode.ty().component()
                && !c.is_fragment()
            {
                names.push(c.name().to_string());
            }
            cur = f.parent;
        }
        names.join("\n  at ")
    }

    /// Indented outline of the subtree at `id`.
    pub(crate) fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_outline(id, 0, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, indent: usize, out: &mut String) {
        let Some(f) = self.fibers.get(id) else { return };
        let pad = "  ".repeat(indent);
        let _ = match f.vnode.ty() {
            NodeType::Text(t) => writeln!(out, "{pad}#text {t:?}"),
            NodeType::Element(tag) => match f.vnode.key() {
                Some(k) => writeln!(out, "{pad}<{tag} key={}>", k.as_str()),
                None => writeln!(out, "{pad}<{tag}>"),
            },
            NodeType::Component(c) => match f.vnode.key() {
                Some(k) => writeln!(out, "{pad}{} key={}", c.name(), k.as_str()),
                None => writeln!(out, "{pad}{}", c.name()),
            },
        };
        for c in f.children.iter().flatten() {
            self.write_outline(*c, indent + 1, out);
        }
    }
}

impl<N> std::ops::Index<NodeId> for Tree<N> {
    type Output = Fiber<N>;

    fn index(&self, id: NodeId) -> &Fiber<N> {
        &self.fibers[id]
    }
}

impl<N> std::ops::IndexMut<NodeId> for Tree<N> {
    fn index_mut(&mut self, id: NodeId) -> &mut Fiber<N> {
        &mut self.fibers[id]
    }
}
