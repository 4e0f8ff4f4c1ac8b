//! Reconciliation: compare a freshly rendered node against the one it
//! replaces and patch the host tree to match.
//!
//! One [`Reconciler`] lives for one top-level render or one queued
//! re-render. It walks the new tree depth-first, reusing old fibers where
//! type and key match, and collects instances with pending commit callbacks
//! for [`Reconciler::commit_root`].

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::component::{Instance, RenderCallback};
use crate::context::ContextMap;
use crate::error::{ComponentError, RenderError, Thrown};
use crate::hooks::{self, RenderCx};
use crate::host::HostTree;
use crate::node::{Child, ComponentKind, ComponentType, NodeType, Rendered};
use crate::options::Options;
use crate::refs::RefValue;
use crate::scheduler::RenderQueue;
use crate::tree::{NodeId, Tree};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct DiffMode: u8 {
        /// Adopting existing host output: props are not rewritten.
        const HYDRATE = 1 << 0;
        const SVG = 1 << 1;
    }
}

/// Pre-existing host nodes still up for adoption. Adopted entries are
/// cleared; whatever is left afterwards gets removed.
pub(crate) type Excess<N> = Option<Vec<Option<N>>>;

/// Render passes re-run inline while a component keeps dirtying itself.
const MAX_INLINE_RENDERS: usize = 25;

#[derive(Clone, Copy)]
enum OldSlot {
    Null,
    Live(NodeId),
    Consumed,
}

pub(crate) struct Reconciler<'a, H: HostTree> {
    pub(crate) tree: &'a mut Tree<H::Node>,
    pub(crate) host: &'a mut H,
    pub(crate) queue: &'a Rc<RenderQueue>,
    pub(crate) options: &'a Options,
    pub(crate) commit_queue: Vec<Rc<Instance>>,
    /// Component stack of the first error no boundary took.
    pub(crate) unhandled_stack: Option<String>,
}

impl<'a, H: HostTree> Reconciler<'a, H> {
    pub(crate) fn new(
        tree: &'a mut Tree<H::Node>,
        host: &'a mut H,
        queue: &'a Rc<RenderQueue>,
        options: &'a Options,
    ) -> Self {
        Reconciler {
            tree,
            host,
            queue,
            options,
            commit_queue: Vec::new(),
            unhandled_stack: None,
        }
    }

    /// Diffs `new` against `old`, leaving `new` with its host node (or, for
    /// components, the first host node below it) in `dom`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn diff(
        &mut self,
        parent_dom: &H::Node,
        new: NodeId,
        old: Option<NodeId>,
        ctx: &ContextMap,
        mode: DiffMode,
        excess: &mut Excess<H::Node>,
        old_dom: Option<H::Node>,
    ) -> Result<(), Thrown> {
        let vnode = self.tree[new].vnode.clone();
        self.options.observe(|o| o.diff_start(&vnode));

        match vnode.ty() {
            NodeType::Component(ty) => {
                self.diff_component(parent_dom, new, old, ty.clone(), ctx, mode, excess, old_dom)?
            }
            _ => match old {
                Some(o) if excess.is_none() && self.same_output(new, o) => self.reuse_output(new, o),
                _ => {
                    let dom = self.diff_element(new, old, ctx, mode, excess)?;
                    self.tree[new].dom = Some(dom);
                }
            },
        }

        self.options.observe(|o| o.diffed(&vnode));
        Ok(())
    }

    /// Unchanged identity counter (or equal text): nothing to patch.
    fn same_output(&self, new: NodeId, old: NodeId) -> bool {
        let (n, o) = (&self.tree[new], &self.tree[old]);
        match (n.vnode.text_content(), o.vnode.text_content()) {
            (Some(a), Some(b)) => a == b && o.dom.is_some(),
            (None, None) => n.original.is_some() && n.original == o.original && o.dom.is_some(),
            _ => false,
        }
    }

    /// Carries host output and children of `old` over to `new` untouched.
    fn reuse_output(&mut self, new: NodeId, old: NodeId) {
        let (dom, children) = {
            let o = &mut self.tree[old];
            (o.dom.clone(), std::mem::take(&mut o.children))
        };
        self.tree.adopt(new, children);
        self.tree[new].dom = dom;
    }

    #[allow(clippy::too_many_arguments)]
    fn diff_component(
        &mut self,
        parent_dom: &H::Node,
        new: NodeId,
        old: Option<NodeId>,
        ty: ComponentType,
        ctx: &ContextMap,
        mode: DiffMode,
        excess: &mut Excess<H::Node>,
        old_dom: Option<H::Node>,
    ) -> Result<(), Thrown> {
        let vnode = self.tree[new].vnode.clone();
        let new_props = vnode.props().clone();
        let depth = self.tree[new].depth;

        let existing = old.and_then(|o| self.tree[o].component.clone());
        let (c, is_new) = match existing {
            Some(c) => {
                c.processing_exception.set(c.pending_error.get());
                (c, false)
            }
            None => (Instance::mount(&ty, &new_props, self.queue.clone()), true),
        };
        let clear_processing = c.processing_exception.get();

        self.tree[new].component = Some(c.clone());
        c.set_type(&ty);
        c.attach(new, depth);
        c.derive_state(&new_props);
        c.set_global_context(ctx);
        {
            // A skipped instance may still be dirty; its queued re-render
            // starts from here.
            let f = &mut self.tree[new];
            f.parent_dom = Some(parent_dom.clone());
            f.svg = mode.contains(DiffMode::SVG);
        }

        let old_props = c.props();
        let old_state = c.state();
        let snapshot = Rc::new(RefCell::new(None));

        if is_new {
            c.will_mount();
        } else {
            if let ComponentKind::Provider(_) = ty.kind()
                && !same_value(old_props.get("value"), new_props.get("value"))
            {
                c.notify_subscribers();
            }
            if !Rc::ptr_eq(&new_props, &old_props) {
                c.will_receive_props(&new_props);
            }

            let same_output = old.is_some_and(|o| self.tree[o].original == self.tree[new].original);
            if !c.force.get() && (same_output || !c.should_update(&old_props, &new_props)) {
                if !same_output {
                    c.accept(new_props);
                    c.dirty.set(false);
                }
                if let Some(o) = old {
                    self.reuse_output(new, o);
                    self.tree[new].reused_children = true;
                }
                c.queue_state_callbacks();
                if c.has_render_callbacks() {
                    self.commit_queue.push(c.clone());
                }
                log::trace!("skip {}", ty.name());
                return Ok(());
            }

            c.will_update(&new_props);
            if c.is_class() {
                c.push_callback(RenderCallback::DidUpdate {
                    prev_props: old_props.clone(),
                    prev_state: old_state.clone(),
                    snapshot: snapshot.clone(),
                });
            }
        }

        c.accept(new_props);
        c.queue_state_callbacks();
        c.force.set(false);

        hooks::flush_passive(&c);
        let mut passes = 0;
        let rendered = loop {
            c.dirty.set(false);
            let result = {
                let mut cx = RenderCx::new(&c, ctx);
                c.render(&mut cx, &vnode)
            };
            c.accept_state();
            passes += 1;
            if result.is_err() || !c.dirty.get() {
                break result;
            }
            if passes >= MAX_INLINE_RENDERS {
                log::warn!("{}: still dirty after {passes} inline renders", ty.name());
                break result;
            }
        };

        let output = match rendered {
            Ok(Rendered::Ready(child)) => child,
            Ok(Rendered::Pending(p)) => {
                return self.fail(new, old, old_dom, mode, excess, Thrown::Pending(p));
            }
            Err(e) => return self.fail(new, old, old_dom, mode, excess, Thrown::Error(e)),
        };

        let child_ctx = match ty.kind() {
            ComponentKind::Provider(id) => ctx.with(*id, c.clone()),
            _ => ctx.clone(),
        };
        if !is_new {
            *snapshot.borrow_mut() = c.snapshot(&old_props, &old_state);
        }
        if c.hooks.borrow().has_pending_effects() {
            self.queue.after_paint(&c);
        }

        let children = unwrap_fragment(output).into_list();
        match ty.kind() {
            ComponentKind::Portal { container, .. } => {
                let Some(target) = container.downcast_ref::<H::Node>().cloned() else {
                    let e = ComponentError::msg("portal container is not a node of this host");
                    return self.fail(new, old, old_dom, mode, excess, Thrown::Error(e));
                };
                let anchor = old.and_then(|o| self.tree.dom_sibling(o, Some(0)));
                let portal_mode = if self.host.is_svg(&target) {
                    DiffMode::SVG
                } else {
                    DiffMode::empty()
                };
                self.diff_children(&target, children, new, old, &child_ctx, portal_mode, &mut None, anchor)?;
                let f = &mut self.tree[new];
                f.dom = None;
                f.next_dom = None;
            }
            _ => self.diff_children(parent_dom, children, new, old, &child_ctx, mode, excess, old_dom)?,
        }

        if c.has_render_callbacks() {
            self.commit_queue.push(c.clone());
        }
        if clear_processing {
            c.pending_error.set(false);
            c.processing_exception.set(false);
        }
        Ok(())
    }

    /// `new` could not render. Keeps whatever host output the old node had
    /// and hands `thrown` to the nearest boundary.
    fn fail(
        &mut self,
        new: NodeId,
        old: Option<NodeId>,
        old_dom: Option<H::Node>,
        mode: DiffMode,
        excess: &mut Excess<H::Node>,
        thrown: Thrown,
    ) -> Result<(), Thrown> {
        log::trace!("render failed at {new:?}: {thrown:?}");
        self.tree[new].original = None;
        if mode.contains(DiffMode::HYDRATE) || excess.is_some() {
            self.tree[new].dom = old_dom.clone();
            self.tree[new].hydrating = Some(mode.contains(DiffMode::HYDRATE));
            if let (Some(ex), Some(dom)) = (excess.as_mut(), old_dom.as_ref())
                && let Some(slot) = ex.iter_mut().find(|s| s.as_ref() == Some(dom))
            {
                *slot = None;
            }
        } else if let Some(o) = old {
            self.reuse_output(new, o);
        }
        self.catch_error(thrown, new)
    }

    /// Reconciles the child list of `new_parent` (rendered as
    /// `render_result`) against the children of `old_parent`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn diff_children(
        &mut self,
        parent_dom: &H::Node,
        render_result: Vec<Child>,
        new_parent: NodeId,
        old_parent: Option<NodeId>,
        ctx: &ContextMap,
        mode: DiffMode,
        excess: &mut Excess<H::Node>,
        mut old_dom: Option<H::Node>,
    ) -> Result<(), Thrown> {
        let mut old_children: Vec<OldSlot> = old_parent
            .map(|o| std::mem::take(&mut self.tree[o].children))
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.map_or(OldSlot::Null, OldSlot::Live))
            .collect();
        let old_len = old_children.len();
        let depth = self.tree[new_parent].depth + 1;
        let parent_is_component = self.tree[new_parent].is_component();

        // Normalise and match.
        let mut pairs: Vec<Option<(NodeId, Option<NodeId>)>> = Vec::with_capacity(render_result.len());
        for (i, raw) in render_result.into_iter().enumerate() {
            let Some(vnode) = raw.into_vnode() else {
                pairs.push(None);
                continue;
            };
            let child = self.tree.insert(vnode, Some(new_parent), depth);
            let matched = self.match_old(&mut old_children, i, child);
            pairs.push(Some((child, matched)));
        }
        self.tree[new_parent].children = pairs.iter().map(|p| p.map(|(c, _)| c)).collect();

        // Old children nothing matched go first, so their teardown runs
        // before any sibling is patched.
        for slot in old_children.iter_mut() {
            let OldSlot::Live(o) = *slot else { continue };
            let nodes = self.tree.host_nodes(o);
            if let (Some(anchor), Some(last)) = (old_dom.as_ref(), nodes.last())
                && nodes.contains(anchor)
            {
                old_dom = self.host.next_sibling(last);
            }
            self.unmount(o, o, false);
            *slot = OldSlot::Consumed;
        }

        let mut first_child_dom = None;
        let mut refs = Vec::new();
        for i in 0..pairs.len() {
            let Some((child, matched)) = pairs[i] else { continue };
            self.diff(parent_dom, child, matched, ctx, mode, excess, old_dom.clone())?;

            let new_dom = self.tree[child].dom.clone();
            self.collect_ref(child, matched, new_dom.as_ref(), &mut refs);

            match new_dom {
                Some(dom) => {
                    if first_child_dom.is_none() {
                        first_child_dom = Some(dom.clone());
                    }
                    let reused = self.tree[child].is_component() && self.tree[child].reused_children;
                    old_dom = if reused {
                        self.reorder_children(child, old_dom, parent_dom)
                    } else {
                        self.place_child(parent_dom, child, old_len, &dom, old_dom)
                    };
                    if parent_is_component {
                        self.tree[new_parent].next_dom = Some(old_dom.clone());
                    }
                }
                None => {
                    let stale = old_dom.as_ref().is_some_and(|anchor| {
                        matched.is_some_and(|m| self.tree[m].dom.as_ref() == Some(anchor))
                            && self.host.parent(anchor).as_ref() != Some(parent_dom)
                    });
                    if stale {
                        old_dom = self.next_matched_dom(&pairs[i + 1..], parent_dom);
                    }
                }
            }
        }

        self.tree[new_parent].dom = first_child_dom;
        for (_, matched) in pairs.into_iter().flatten() {
            if let Some(m) = matched {
                self.tree.remove(m);
            }
        }

        for (node_ref, value, owner) in refs {
            self.apply_ref(&node_ref, value, owner)?;
        }
        Ok(())
    }

    /// Same-position match first, then a scan of every unconsumed old child.
    fn match_old(&self, old: &mut [OldSlot], i: usize, child: NodeId) -> Option<NodeId> {
        match old.get(i).copied() {
            Some(OldSlot::Null) => {
                old[i] = OldSlot::Consumed;
                return None;
            }
            Some(OldSlot::Live(o)) if self.same_kind(o, child) => {
                old[i] = OldSlot::Consumed;
                return Some(o);
            }
            _ => {}
        }
        for slot in old.iter_mut() {
            if let OldSlot::Live(o) = *slot
                && self.same_kind(o, child)
            {
                *slot = OldSlot::Consumed;
                return Some(o);
            }
        }
        None
    }

    fn same_kind(&self, old: NodeId, new: NodeId) -> bool {
        let (o, n) = (&self.tree[old].vnode, &self.tree[new].vnode);
        o.key() == n.key() && o.ty().same(n.ty())
    }

    fn collect_ref(
        &self,
        child: NodeId,
        matched: Option<NodeId>,
        dom: Option<&H::Node>,
        refs: &mut Vec<(crate::refs::NodeRef, Option<RefValue>, NodeId)>,
    ) {
        let fiber = &self.tree[child];
        if fiber.vnode.ty().component().is_some_and(|c| c.is_forward()) {
            return;
        }
        let Some(node_ref) = fiber.vnode.node_ref() else { return };
        let old_ref = matched.and_then(|m| self.tree[m].vnode.node_ref().cloned());
        if old_ref.as_ref().is_some_and(|o| o.ptr_eq(node_ref)) {
            return;
        }
        if let Some(o) = old_ref {
            refs.push((o, None, child));
        }
        let value = match &fiber.component {
            Some(c) => Some(RefValue::Component(c.updater())),
            None => dom.map(|d| RefValue::Host(Rc::new(d.clone()))),
        };
        refs.push((node_ref.clone(), value, child));
    }

    fn next_matched_dom(
        &self,
        rest: &[Option<(NodeId, Option<NodeId>)>],
        parent_dom: &H::Node,
    ) -> Option<H::Node> {
        rest.iter()
            .flatten()
            .filter_map(|(_, m)| m.and_then(|m| self.tree.get(m)))
            .filter_map(|f| f.dom.clone())
            .find(|d| self.host.parent(d).as_ref() == Some(parent_dom))
    }

    /// Puts `new_dom` in place before `old_dom` unless it already sits
    /// within the next `old_len` siblings. Returns the anchor for the next
    /// child.
    fn place_child(
        &mut self,
        parent_dom: &H::Node,
        child: NodeId,
        old_len: usize,
        new_dom: &H::Node,
        old_dom: Option<H::Node>,
    ) -> Option<H::Node> {
        if let Some(next) = self.tree[child].next_dom.take() {
            return next;
        }

        if old_dom.as_ref() == Some(new_dom) && self.host.parent(new_dom).is_some() {
            return self.host.next_sibling(new_dom);
        }

        match old_dom {
            Some(anchor) if self.host.parent(&anchor).as_ref() == Some(parent_dom) => {
                let mut sibling = anchor.clone();
                for _ in 0..old_len {
                    match self.host.next_sibling(&sibling) {
                        Some(s) if &s == new_dom => return self.host.next_sibling(new_dom),
                        Some(s) => sibling = s,
                        None => break,
                    }
                }
                log::trace!("place {child:?} before old anchor");
                self.host.insert_before(parent_dom, new_dom, Some(&anchor));
                Some(anchor)
            }
            _ => {
                self.host.insert_before(parent_dom, new_dom, None);
                None
            }
        }
    }

    /// Re-places the host nodes of a component whose children were carried
    /// over, descending through nested components.
    fn reorder_children(
        &mut self,
        id: NodeId,
        mut old_dom: Option<H::Node>,
        parent_dom: &H::Node,
    ) -> Option<H::Node> {
        let children = self.tree[id].children.clone();
        let len = children.len();
        for c in children.into_iter().flatten() {
            self.tree[c].parent = Some(id);
            if self.tree[c].is_portal() {
                continue;
            }
            if self.tree[c].is_component() {
                old_dom = self.reorder_children(c, old_dom, parent_dom);
            } else if let Some(dom) = self.tree[c].dom.clone() {
                old_dom = self.place_child(parent_dom, c, len, &dom, old_dom);
            }
        }
        old_dom
    }

    /// Re-renders one queued instance in place.
    pub(crate) fn render_component(&mut self, c: &Rc<Instance>) -> Result<(), RenderError> {
        let Some(node) = c.vnode() else {
            c.dirty.set(false);
            return Ok(());
        };
        let Some(fiber) = self.tree.get(node) else {
            log::warn!("{}: queued for a fiber that is gone", c.name());
            c.dirty.set(false);
            return Ok(());
        };
        let Some(parent_dom) = fiber.parent_dom.clone() else {
            log::warn!("{}: dropping re-render, no parent host node", c.name());
            c.dirty.set(false);
            return Ok(());
        };
        let old_dom = fiber.dom.clone();
        let parent = fiber.parent;
        let mut mode = DiffMode::empty();
        mode.set(DiffMode::SVG, fiber.svg);
        mode.set(DiffMode::HYDRATE, fiber.hydrating == Some(true));
        let mut excess = fiber.hydrating.map(|_| vec![old_dom.clone()]);

        let Some(new) = self.tree.insert_copy(node) else {
            return Ok(());
        };
        // Old and new must not look identical, or the diff would skip.
        self.tree[node].original = self.tree[node].original.map(|o| o.wrapping_add(1));
        if let Some(p) = parent {
            self.tree.replace_child(p, node, new);
        }

        let anchor = old_dom.clone().or_else(|| self.tree.dom_sibling(new, None));
        let ctx = c.global_context();
        log::debug!("re-render {}", c.name());

        let diffed = self.diff(&parent_dom, new, Some(node), &ctx, mode, &mut excess, anchor);
        if let Some(ex) = excess {
            for n in ex.into_iter().flatten() {
                self.host.remove(&n);
            }
        }
        let committed = self.commit_root(new);

        if self.tree[new].dom != old_dom {
            self.tree.update_parent_dom_pointers(new);
        }
        self.tree.remove(node);

        diffed.and(committed).map_err(|t| self.to_render_error(t))
    }

    pub(crate) fn to_render_error(&mut self, thrown: Thrown) -> RenderError {
        let stack = self.unhandled_stack.take().unwrap_or_default();
        RenderError::from_thrown(thrown, stack)
    }
}

fn same_value(a: Option<&crate::value::PropValue>, b: Option<&crate::value::PropValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same(b),
        (None, None) => true,
        _ => false,
    }
}

/// A keyless fragment returned at the top of a render is transparent.
fn unwrap_fragment(output: Child) -> Child {
    match output {
        Child::Node(v)
            if v.key().is_none() && v.ty().component().is_some_and(ComponentType::is_fragment) =>
        {
            v.props().children_or_empty()
        }
        other => other,
    }
}
