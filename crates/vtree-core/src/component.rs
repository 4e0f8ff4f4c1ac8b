//! Stateful component instances.
//!
//! Every component node (function, class, fragment, provider, portal) gets
//! one [`Instance`] that lives as long as it keeps its position in the tree.
//! The instance owns props/state, the hook slots and the callbacks queued for
//! the next commit. [`Component`] is the class-style lifecycle API; function
//! components only use the hook store.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::context::ContextMap;
use crate::error::{ComponentError, ErrorInfo, Thrown};
use crate::hooks::{self, HookStore, RenderCx};
use crate::node::{
    Child, ComponentKind, ComponentType, NodeType, Props, RenderResult, Rendered, VNode, fragment_type,
};
use crate::scheduler::RenderQueue;
use crate::tree::NodeId;
use crate::value::{Bag, PropValue, shallow_equal};

pub type State = Bag;

/// Class-style component. All lifecycle methods default to no-ops.
pub trait Component: 'static {
    fn create(props: &Props) -> Self
    where
        Self: Sized;

    fn render(&mut self, cx: &mut RenderCx<'_>, props: &Props, state: &State) -> RenderResult;

    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    /// Merged into the pending state before every render.
    fn derive_state_from_props(&self, _props: &Props, _state: &State) -> Option<State> {
        None
    }

    fn will_mount(&mut self, _updater: &Updater) {}

    fn did_mount(&mut self, _updater: &Updater) -> Result<(), ComponentError> {
        Ok(())
    }

    fn will_receive_props(&mut self, _updater: &Updater, _next_props: &Props) {}

    fn should_update(
        &self,
        _props: &Props,
        _next_props: &Props,
        _state: &State,
        _next_state: &State,
    ) -> bool {
        true
    }

    fn will_update(&mut self, _next_props: &Props, _next_state: &State) {}

    /// Captured after render, before children are patched; handed to
    /// `did_update`.
    fn snapshot_before_update(&self, _prev_props: &Props, _prev_state: &State) -> Option<PropValue> {
        None
    }

    fn did_update(
        &mut self,
        _updater: &Updater,
        _prev_props: &Props,
        _prev_state: &State,
        _snapshot: Option<PropValue>,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    fn will_unmount(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// State merged in when a descendant fails.
    fn derive_state_from_error(&self, _error: &Thrown) -> Option<State> {
        None
    }

    /// Opt in to `did_catch`.
    fn is_boundary(&self) -> bool {
        false
    }

    /// Returning `Err` passes the (new) error further up.
    fn did_catch(
        &mut self,
        _updater: &Updater,
        _error: &Thrown,
        _info: &ErrorInfo,
    ) -> Result<(), ComponentError> {
        Ok(())
    }
}

pub(crate) enum RenderCallback {
    DidMount,
    DidUpdate {
        prev_props: Rc<Props>,
        prev_state: Rc<State>,
        snapshot: Rc<RefCell<Option<PropValue>>>,
    },
    LayoutEffect(usize),
    Callback(Box<dyn FnOnce()>),
}

pub(crate) type CatchHandler = Rc<dyn Fn(&Thrown, &ErrorInfo)>;

pub(crate) struct Instance {
    ty: RefCell<ComponentType>,
    class: RefCell<Option<Box<dyn Component>>>,
    props: RefCell<Rc<Props>>,
    state: RefCell<Rc<State>>,
    next_state: RefCell<Option<State>>,
    pub(crate) dirty: Cell<bool>,
    pub(crate) force: Cell<bool>,
    render_callbacks: RefCell<Vec<RenderCallback>>,
    state_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
    pub(crate) hooks: RefCell<HookStore>,
    vnode: Cell<Option<NodeId>>,
    depth: Cell<u32>,
    global_context: RefCell<ContextMap>,
    pub(crate) pending_error: Cell<bool>,
    pub(crate) processing_exception: Cell<bool>,
    pub(crate) catch_handler: RefCell<Option<CatchHandler>>,
    subscribers: RefCell<Vec<Weak<Instance>>>,
    subscriptions: RefCell<Vec<Weak<Instance>>>,
    pub(crate) queue: Rc<RenderQueue>,
    self_weak: Weak<Instance>,
}

impl Instance {
    pub(crate) fn mount(ty: &ComponentType, props: &Rc<Props>, queue: Rc<RenderQueue>) -> Rc<Self> {
        let class = match ty.kind() {
            ComponentKind::Class(factory) => Some(factory(props)),
            _ => None,
        };
        let state = class
            .as_ref()
            .map(|c| c.initial_state(props))
            .unwrap_or_default();

        Rc::new_cyclic(|weak| Instance {
            ty: RefCell::new(ty.clone()),
            class: RefCell::new(class),
            props: RefCell::new(props.clone()),
            state: RefCell::new(Rc::new(state)),
            next_state: RefCell::new(None),
            dirty: Cell::new(true),
            force: Cell::new(false),
            render_callbacks: RefCell::new(Vec::new()),
            state_callbacks: RefCell::new(Vec::new()),
            hooks: RefCell::new(HookStore::default()),
            vnode: Cell::new(None),
            depth: Cell::new(0),
            global_context: RefCell::new(ContextMap::default()),
            pending_error: Cell::new(false),
            processing_exception: Cell::new(false),
            catch_handler: RefCell::new(None),
            subscribers: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            queue,
            self_weak: weak.clone(),
        })
    }

    pub(crate) fn name(&self) -> String {
        self.ty.borrow().name().to_string()
    }

    pub(crate) fn ty(&self) -> ComponentType {
        self.ty.borrow().clone()
    }

    /// Keeps the latest body (closures may capture new values each render).
    pub(crate) fn set_type(&self, ty: &ComponentType) {
        *self.ty.borrow_mut() = ty.clone();
    }

    pub(crate) fn is_class(&self) -> bool {
        self.class.borrow().is_some()
    }

    pub(crate) fn props(&self) -> Rc<Props> {
        self.props.borrow().clone()
    }

    pub(crate) fn state(&self) -> Rc<State> {
        self.state.borrow().clone()
    }

    pub(crate) fn vnode(&self) -> Option<NodeId> {
        self.vnode.get()
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth.get()
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.vnode.get().is_some()
    }

    pub(crate) fn attach(&self, node: NodeId, depth: u32) {
        self.vnode.set(Some(node));
        self.depth.set(depth);
    }

    pub(crate) fn global_context(&self) -> ContextMap {
        self.global_context.borrow().clone()
    }

    pub(crate) fn set_global_context(&self, ctx: &ContextMap) {
        *self.global_context.borrow_mut() = ctx.clone();
    }

    pub(crate) fn updater(&self) -> Updater {
        Updater(self.self_weak.clone())
    }

    fn rc(&self) -> Option<Rc<Instance>> {
        self.self_weak.upgrade()
    }

    pub(crate) fn enqueue(&self) {
        if !self.is_mounted() {
            return;
        }
        if let Some(me) = self.rc() {
            self.queue.enqueue(&me);
        }
    }

    pub(crate) fn set_state(&self, partial: State, callback: Option<Box<dyn FnOnce()>>) {
        {
            let mut next = self.next_state.borrow_mut();
            let base = next.get_or_insert_with(|| (**self.state.borrow()).clone());
            base.merge(&partial);
        }
        if let Some(cb) = callback {
            self.state_callbacks.borrow_mut().push(cb);
        }
        self.enqueue();
    }

    /// `None` from `f` is a bail-out: nothing is merged or queued.
    pub(crate) fn set_state_with(
        &self,
        f: impl FnOnce(&State, &Props) -> Option<State>,
        callback: Option<Box<dyn FnOnce()>>,
    ) {
        let base = self
            .next_state
            .borrow()
            .clone()
            .unwrap_or_else(|| (**self.state.borrow()).clone());
        let props = self.props();
        if let Some(partial) = f(&base, &props) {
            self.set_state(partial, callback);
        }
    }

    pub(crate) fn force_update(&self, callback: Option<Box<dyn FnOnce()>>) {
        if !self.is_mounted() {
            return;
        }
        self.force.set(true);
        if let Some(cb) = callback {
            self.render_callbacks
                .borrow_mut()
                .push(RenderCallback::Callback(cb));
        }
        self.enqueue();
    }

    // Lifecycle plumbing used by the reconciler.

    pub(crate) fn derive_state(&self, props: &Props) {
        let class = self.class.borrow();
        let Some(class) = class.as_ref() else { return };
        let mut next = self.next_state.borrow_mut();
        let next = next.get_or_insert_with(|| (**self.state.borrow()).clone());
        if let Some(derived) = class.derive_state_from_props(props, next) {
            next.merge(&derived);
        }
    }

    fn with_class<R>(&self, f: impl FnOnce(&mut dyn Component, &Updater) -> R) -> Option<R> {
        let updater = self.updater();
        let mut class = self.class.borrow_mut();
        class.as_mut().map(|c| f(c.as_mut(), &updater))
    }

    pub(crate) fn will_mount(&self) {
        self.with_class(|c, u| c.will_mount(u));
        if self.is_class() {
            self.push_callback(RenderCallback::DidMount);
        }
    }

    pub(crate) fn will_receive_props(&self, next_props: &Props) {
        self.with_class(|c, u| c.will_receive_props(u, next_props));
    }

    pub(crate) fn should_update(&self, props: &Props, next_props: &Props) -> bool {
        let class = self.class.borrow();
        let Some(class) = class.as_ref() else { return true };
        let state = self.state();
        let next = self.next_state.borrow();
        class.should_update(props, next_props, &state, next.as_ref().unwrap_or(&*state))
    }

    pub(crate) fn will_update(&self, next_props: &Props) {
        let next = self
            .next_state
            .borrow()
            .clone()
            .unwrap_or_else(|| (*self.state()).clone());
        self.with_class(|c, _| c.will_update(next_props, &next));
    }

    pub(crate) fn snapshot(&self, prev_props: &Props, prev_state: &State) -> Option<PropValue> {
        let class = self.class.borrow();
        class
            .as_ref()
            .and_then(|c| c.snapshot_before_update(prev_props, prev_state))
    }

    /// Takes the pending props/state as current.
    pub(crate) fn accept(&self, props: Rc<Props>) {
        *self.props.borrow_mut() = props;
        self.accept_state();
    }

    pub(crate) fn accept_state(&self) {
        let next = self.next_state.borrow_mut().take();
        if let Some(next) = next {
            *self.state.borrow_mut() = Rc::new(next);
        }
    }

    /// Moves `set_state` callbacks to the commit list.
    pub(crate) fn queue_state_callbacks(&self) {
        let callbacks = std::mem::take(&mut *self.state_callbacks.borrow_mut());
        self.render_callbacks
            .borrow_mut()
            .extend(callbacks.into_iter().map(RenderCallback::Callback));
    }

    pub(crate) fn render(
        &self,
        cx: &mut RenderCx<'_>,
        vnode: &VNode,
    ) -> RenderResult {
        let props = self.props();
        let ty = self.ty();
        match ty.kind() {
            ComponentKind::Function(body) => {
                let body = body.clone();
                body(cx, &props)
            }
            ComponentKind::Forward(body) => {
                let body = body.clone();
                body(cx, &props, vnode.node_ref().cloned())
            }
            ComponentKind::Class(_) => {
                let state = self.state();
                let mut class = self.class.borrow_mut();
                match class.as_mut() {
                    Some(c) => c.render(cx, &props, &state),
                    None => Ok(Rendered::Ready(Child::Empty)),
                }
            }
            ComponentKind::Fragment | ComponentKind::Provider(_) | ComponentKind::Portal { .. } => {
                Ok(props.children_or_empty().into())
            }
        }
    }

    pub(crate) fn push_callback(&self, cb: RenderCallback) {
        self.render_callbacks.borrow_mut().push(cb);
    }

    pub(crate) fn has_render_callbacks(&self) -> bool {
        !self.render_callbacks.borrow().is_empty()
    }

    /// Runs queued commit callbacks in order; stops at the first failure and
    /// drops the rest.
    pub(crate) fn run_render_callbacks(&self) -> Result<(), ComponentError> {
        let callbacks = std::mem::take(&mut *self.render_callbacks.borrow_mut());
        for cb in callbacks {
            match cb {
                RenderCallback::DidMount => self.with_class(|c, u| c.did_mount(u)).unwrap_or(Ok(()))?,
                RenderCallback::DidUpdate {
                    prev_props,
                    prev_state,
                    snapshot,
                } => {
                    let snapshot = snapshot.borrow_mut().take();
                    self.with_class(|c, u| c.did_update(u, &prev_props, &prev_state, snapshot))
                        .unwrap_or(Ok(()))?
                }
                RenderCallback::LayoutEffect(index) => hooks::run_effect(self, index),
                RenderCallback::Callback(f) => f(),
            }
        }
        Ok(())
    }

    /// Offers `thrown` to this instance. `Ok(true)` when it queued itself for
    /// a re-render in response.
    pub(crate) fn try_catch(&self, thrown: &Thrown, info: &ErrorInfo) -> Result<bool, ComponentError> {
        let mut handled = false;

        let derived = {
            let class = self.class.borrow();
            class.as_ref().and_then(|c| c.derive_state_from_error(thrown))
        };
        if let Some(state) = derived {
            self.set_state(state, None);
            handled = self.dirty.get();
        }

        let boundary = self.class.borrow().as_ref().is_some_and(|c| c.is_boundary());
        if boundary {
            self.with_class(|c, u| c.did_catch(u, thrown, info))
                .unwrap_or(Ok(()))?;
            handled = self.dirty.get();
        }

        let handler = self.catch_handler.borrow().clone();
        if let Some(handler) = handler {
            handler(thrown, info);
            handled = self.dirty.get();
        }
        Ok(handled)
    }

    pub(crate) fn subscribe(&self, provider: &Rc<Instance>) {
        provider.subscribers.borrow_mut().push(self.self_weak.clone());
        self.subscriptions.borrow_mut().push(Rc::downgrade(provider));
    }

    /// Forces every live subscriber to re-render, skipping `should_update`.
    pub(crate) fn notify_subscribers(&self) {
        let subscribers: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        log::trace!("{}: value changed, {} subscribers", self.name(), subscribers.len());
        for s in subscribers {
            s.force.set(true);
            s.enqueue();
        }
    }

    /// Unmount-time cleanup: hook cleanups, `will_unmount`, provider
    /// unsubscription. Errors are collected, not short-circuited.
    pub(crate) fn teardown(&self) -> Vec<ComponentError> {
        log::trace!("teardown {}", self.name());
        let mut errors = Vec::new();
        hooks::run_cleanups(self);
        if let Some(Err(e)) = self.with_class(|c, _| c.will_unmount()) {
            errors.push(e);
        }

        let me = self.self_weak.clone();
        for provider in self.subscriptions.borrow_mut().drain(..) {
            if let Some(p) = provider.upgrade() {
                p.subscribers.borrow_mut().retain(|s| !s.ptr_eq(&me));
            }
        }
        self.vnode.set(None);
        self.render_callbacks.borrow_mut().clear();
        self.state_callbacks.borrow_mut().clear();
        *self.catch_handler.borrow_mut() = None;
        errors
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.name())
            .field("dirty", &self.dirty.get())
            .field("depth", &self.depth.get())
            .finish()
    }
}

/// Weak handle to a mounted instance, given to lifecycle methods and stored
/// in component refs. Calls after unmount are ignored.
#[derive(Clone)]
pub struct Updater(Weak<Instance>);

impl Updater {
    pub fn set_state(&self, partial: State) {
        if let Some(i) = self.0.upgrade() {
            i.set_state(partial, None);
        }
    }

    pub fn set_state_then(&self, partial: State, callback: impl FnOnce() + 'static) {
        if let Some(i) = self.0.upgrade() {
            i.set_state(partial, Some(Box::new(callback)));
        }
    }

    pub fn set_state_with(&self, f: impl FnOnce(&State, &Props) -> Option<State>) {
        if let Some(i) = self.0.upgrade() {
            i.set_state_with(f, None);
        }
    }

    pub fn force_update(&self) {
        if let Some(i) = self.0.upgrade() {
            i.force_update(None);
        }
    }

    pub fn state(&self) -> Option<Rc<State>> {
        self.0.upgrade().map(|i| i.state())
    }

    pub fn props(&self) -> Option<Rc<Props>> {
        self.0.upgrade().map(|i| i.props())
    }

    pub fn is_mounted(&self) -> bool {
        self.0.upgrade().is_some_and(|i| i.is_mounted())
    }

    pub fn ptr_eq(&self, other: &Updater) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.upgrade() {
            Some(i) => write!(f, "Updater({})", i.name()),
            None => write!(f, "Updater(<dropped>)"),
        }
    }
}

type Compare = Rc<dyn Fn(&Props, &Props) -> bool>;

struct Memo {
    inner: ComponentType,
    compare: Compare,
}

impl Component for Memo {
    fn create(_props: &Props) -> Self {
        Memo {
            inner: fragment_type(),
            compare: Rc::new(|_, _| false),
        }
    }

    fn should_update(&self, props: &Props, next_props: &Props, _: &State, _: &State) -> bool {
        !(self.compare)(props, next_props)
    }

    fn render(&mut self, _cx: &mut RenderCx<'_>, props: &Props, _state: &State) -> RenderResult {
        Ok(VNode::from_parts(
            NodeType::Component(self.inner.clone()),
            Rc::new(props.clone()),
            None,
            None,
        )
        .into())
    }
}

/// Wraps `inner` so it re-renders only when `compare(prev, next)` says the
/// props differ. Defaults to shallow prop equality.
pub fn memo(inner: ComponentType, compare: Option<Compare>) -> ComponentType {
    let compare = compare.unwrap_or_else(|| {
        Rc::new(|a: &Props, b: &Props| shallow_equal(a.attrs(), b.attrs()) && same_children(a, b))
    });
    let name = format!("Memo({})", inner.name());
    ComponentType::unique(
        name,
        ComponentKind::Class(Rc::new(move |_props| {
            Box::new(Memo {
                inner: inner.clone(),
                compare: compare.clone(),
            })
        })),
    )
}

fn same_children(a: &Props, b: &Props) -> bool {
    match (a.children(), b.children()) {
        (None, None) => true,
        (Some(Child::Node(x)), Some(Child::Node(y))) => x.original() == y.original(),
        (Some(Child::Text(x)), Some(Child::Text(y))) => x == y,
        _ => false,
    }
}
