//! Public entry point: owns the host, the fiber arena and the render queue.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::ContextMap;
use crate::diff::{DiffMode, Reconciler};
use crate::error::RenderError;
use crate::hooks;
use crate::host::HostTree;
use crate::node::{Child, ComponentKind, ComponentType, VNode, create_element};
use crate::options::Options;
use crate::scheduler::{RenderQueue, Task};
use crate::tree::{NodeId, Tree};
use crate::value::{Bag, Event};

struct Inner<H: HostTree> {
    host: RefCell<H>,
    tree: RefCell<Tree<H::Node>>,
    roots: RefCell<HashMap<H::Node, NodeId>>,
    queue: Rc<RenderQueue>,
    options: Options,
    /// A flush was requested while the tree was borrowed.
    needs_flush: Cell<bool>,
}

/// Renders node trees into containers of one host.
///
/// Cloning gives another handle to the same renderer.
pub struct Renderer<H: HostTree> {
    inner: Rc<Inner<H>>,
}

impl<H: HostTree> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Renderer {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostTree> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_options(host, Options::default())
    }

    pub fn with_options(host: H, options: Options) -> Self {
        let inner = Rc::new(Inner {
            host: RefCell::new(host),
            tree: RefCell::new(Tree::new()),
            roots: RefCell::new(HashMap::new()),
            queue: Rc::new(RenderQueue::default()),
            options,
            needs_flush: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let flush_weak = weak.clone();
        let request_flush: Rc<dyn Fn()> = Rc::new(move || {
            let Some(inner) = flush_weak.upgrade() else { return };
            let target = Rc::downgrade(&inner);
            let task = Task::new(move || match target.upgrade() {
                Some(inner) => Renderer { inner }.flush(),
                None => Ok(()),
            });
            let options = &inner.options;
            match options.debounce_rendering.as_ref().or(options.request_animation_frame.as_ref()) {
                Some(schedule) => schedule(task),
                None => inner.queue.defer(task),
            }
        });

        let request_effects: Rc<dyn Fn()> = Rc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            let target = Rc::downgrade(&inner);
            let task = Task::new(move || {
                if let Some(inner) = target.upgrade() {
                    Renderer { inner }.flush_effects();
                }
                Ok(())
            });
            match &inner.options.request_animation_frame {
                Some(schedule) => schedule(task),
                None => inner.queue.defer(task),
            }
        });

        inner.queue.set_requesters(request_flush, request_effects);
        Renderer { inner }
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    /// Direct host access, e.g. to build containers. Must not be held across
    /// renderer calls.
    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Renders `child` into `container`, diffing against whatever was
    /// rendered there before. `Child::Empty` unmounts everything.
    pub fn render(&self, child: impl Into<Child>, container: &H::Node) -> Result<(), RenderError> {
        self.render_root(child.into(), container, None, false)
    }

    /// Renders into `container`, diffing against the single existing host
    /// node `replace` instead of the container's previous tree.
    pub fn render_replacing(
        &self,
        child: impl Into<Child>,
        container: &H::Node,
        replace: &H::Node,
    ) -> Result<(), RenderError> {
        self.render_root(child.into(), container, Some(replace), false)
    }

    /// Adopts existing host output in `container`: matching nodes are
    /// reused, props are not rewritten (handlers are still attached), and
    /// anything left over is removed.
    pub fn hydrate(&self, child: impl Into<Child>, container: &H::Node) -> Result<(), RenderError> {
        self.render_root(child.into(), container, None, true)
    }

    pub fn unmount(&self, container: &H::Node) -> Result<(), RenderError> {
        self.render(Child::Empty, container)
    }

    fn render_root(
        &self,
        child: Child,
        container: &H::Node,
        replace: Option<&H::Node>,
        hydrate: bool,
    ) -> Result<(), RenderError> {
        let inner = &self.inner;
        let result = {
            let mut tree = inner.tree.try_borrow_mut().map_err(|_| RenderError::Busy("render"))?;
            let mut host = inner.host.try_borrow_mut().map_err(|_| RenderError::Busy("render"))?;

            let root_vnode = VNode::fragment(vec![child]);
            inner.options.observe(|o| o.root_render(&root_vnode));

            let old_root = if hydrate {
                None
            } else {
                let roots = inner.roots.borrow();
                replace
                    .and_then(|r| roots.get(r))
                    .or_else(|| roots.get(container))
                    .copied()
            };
            let new_root = tree.insert(root_vnode, None, 0);

            let mut excess = match (replace, old_root) {
                (Some(r), _) if !hydrate => Some(vec![Some(r.clone())]),
                (_, Some(_)) => None,
                _ => {
                    let existing = host.children(container);
                    (!existing.is_empty()).then(|| existing.into_iter().map(Some).collect())
                }
            };
            let old_dom = match (replace, old_root) {
                (Some(r), _) if !hydrate => Some(r.clone()),
                (_, Some(o)) => tree.get(o).and_then(|f| f.dom.clone()),
                _ => host.first_child(container),
            };

            let mut mode = DiffMode::empty();
            mode.set(DiffMode::HYDRATE, hydrate);
            mode.set(DiffMode::SVG, host.is_svg(container));

            let mut rec = Reconciler::new(&mut *tree, &mut *host, &inner.queue, &inner.options);
            let diffed = rec.diff(
                container,
                new_root,
                old_root,
                &ContextMap::default(),
                mode,
                &mut excess,
                old_dom,
            );
            if let Some(ex) = excess {
                for n in ex.into_iter().flatten() {
                    rec.host.remove(&n);
                }
            }
            let result = match diffed {
                Ok(()) => rec.commit_root(new_root),
                Err(t) => Err(t),
            };
            let result = result.map_err(|t| rec.to_render_error(t));

            inner.roots.borrow_mut().insert(container.clone(), new_root);
            if let Some(o) = old_root {
                tree.remove(o);
            }
            result
        };
        self.settle_deferred_flush()?;
        result
    }

    /// Re-renders every dirty component, shallowest first, until the queue
    /// stays empty. Called from inside a render it is deferred until that
    /// render returns.
    pub fn flush(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        if inner.queue.is_flushing() {
            return Ok(());
        }
        let (Ok(mut tree), Ok(mut host)) = (inner.tree.try_borrow_mut(), inner.host.try_borrow_mut()) else {
            inner.needs_flush.set(true);
            return Ok(());
        };
        inner.needs_flush.set(false);
        log::debug!("flush: {} dirty", inner.queue.len());
        inner.queue.drain(|c| {
            let mut rec = Reconciler::new(&mut *tree, &mut *host, &inner.queue, &inner.options);
            rec.render_component(c)
        })
    }

    fn settle_deferred_flush(&self) -> Result<(), RenderError> {
        if self.inner.needs_flush.replace(false) {
            self.flush()?;
        }
        Ok(())
    }

    /// Runs queued passive effects: for each instance, all cleanups, then
    /// all effect bodies.
    pub fn flush_effects(&self) {
        for c in self.inner.queue.take_effects() {
            if c.is_mounted() {
                hooks::flush_passive(&c);
            }
        }
    }

    /// Drains the built-in microtask queue (flushes and effects scheduled
    /// without host hooks, deferred transitions).
    pub fn run_microtasks(&self) -> Result<(), RenderError> {
        while let Some(task) = self.inner.queue.next_microtask() {
            task.run()?;
        }
        Ok(())
    }

    /// Runs microtasks, flushes and passive effects until nothing is left.
    pub fn settle(&self) -> Result<(), RenderError> {
        loop {
            self.run_microtasks()?;
            self.flush()?;
            self.flush_effects();
            if !self.inner.queue.has_microtasks()
                && self.inner.queue.len() == 0
                && !self.inner.queue.has_effects()
            {
                return Ok(());
            }
        }
    }

    /// Runs `f` with flush requests held back, then flushes once.
    pub fn batched_updates<R>(&self, f: impl FnOnce() -> R) -> Result<R, RenderError> {
        let batch = self.inner.queue.batch();
        let out = f();
        if batch.close() {
            self.flush()?;
        }
        Ok(out)
    }

    /// Number of instances waiting for a re-render.
    pub fn pending_renders(&self) -> usize {
        self.inner.queue.len()
    }

    /// Delivers `event` at `target`: capture handlers from the outermost
    /// ancestor down, then bubble handlers from `target` up. Returns how
    /// many handlers ran.
    pub fn dispatch_event(&self, target: &H::Node, event: &Event) -> usize {
        self.inner.options.observe(|o| o.event(event));
        let path = {
            let host = self.inner.host.borrow();
            let mut path = vec![target.clone()];
            let mut cur = host.parent(target);
            while let Some(p) = cur {
                cur = host.parent(&p);
                path.push(p);
            }
            path
        };

        let handlers = {
            let Ok(tree) = self.inner.tree.try_borrow() else {
                log::warn!("dispatch_event: renderer busy, dropping {}", event.name);
                return 0;
            };
            let lookup = |node: &H::Node, capture: bool| {
                tree.listeners
                    .get(node)
                    .and_then(|l| l.get(&(event.name.clone(), capture)))
                    .cloned()
            };
            let capture = path.iter().rev().filter_map(|n| lookup(n, true));
            let bubble = path.iter().filter_map(|n| lookup(n, false));
            capture.chain(bubble).collect::<Vec<_>>()
        };

        for h in &handlers {
            h.call(event);
        }
        handlers.len()
    }

    /// Indented outline of the tree rendered into `container`.
    pub fn describe(&self, container: &H::Node) -> String {
        let Some(root) = self.inner.roots.borrow().get(container).copied() else {
            return String::new();
        };
        match self.inner.tree.try_borrow() {
            Ok(tree) => tree.outline(root),
            Err(_) => String::new(),
        }
    }

    /// Live fiber count, for leak checks.
    pub fn fiber_count(&self) -> usize {
        self.inner.tree.borrow().len()
    }
}

struct PortalOf<N>(std::marker::PhantomData<N>);

fn same_node<N: PartialEq + 'static>(a: &dyn std::any::Any, b: &dyn std::any::Any) -> bool {
    match (a.downcast_ref::<N>(), b.downcast_ref::<N>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Renders `children` into `container` (any node of the same host) while
/// keeping them in this position of the component tree, so context and
/// error boundaries from here still apply.
pub fn create_portal<N: Clone + PartialEq + 'static>(children: Vec<Child>, container: &N) -> VNode {
    let ty = ComponentType::of_type::<PortalOf<N>>(
        "Portal",
        ComponentKind::Portal {
            container: Rc::new(container.clone()),
            same_container: same_node::<N>,
        },
    );
    create_element(ty, Bag::new(), children)
}
