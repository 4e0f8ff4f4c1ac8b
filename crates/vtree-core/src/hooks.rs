//! Hooks: per-instance state addressed by call order.
//!
//! Each hook call in a render takes the next slot of the instance's
//! [`HookStore`]. Calling hooks in a different order on a later render hits a
//! slot of the wrong kind; that slot is replaced (with a warning) rather than
//! reinterpreted.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::component::{Instance, RenderCallback, Updater};
use crate::context::{Context, ContextId, ContextMap, provided_value};
use crate::effects::{Dispose, EffectFn};
use crate::error::{ErrorInfo, Thrown};
use crate::refs::{NodeRef, RefValue};
use crate::scheduler::Task;
use crate::value::{Deps, EventHandler, Event, deps_changed};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotKind {
    Memo,
    Reducer,
    Effect,
    Context,
    Id,
    Value,
}

pub(crate) enum Slot {
    Empty,
    Memo { value: Rc<dyn Any>, deps: Option<Deps> },
    Reducer(Rc<dyn Any>),
    Effect(EffectSlot),
    Context { subscribed: bool },
    Id(Rc<str>),
    Value(Rc<dyn Any>),
}

impl Slot {
    fn kind(&self) -> Option<SlotKind> {
        Some(match self {
            Slot::Empty => return None,
            Slot::Memo { .. } => SlotKind::Memo,
            Slot::Reducer(_) => SlotKind::Reducer,
            Slot::Effect(_) => SlotKind::Effect,
            Slot::Context { .. } => SlotKind::Context,
            Slot::Id(_) => SlotKind::Id,
            Slot::Value(_) => SlotKind::Value,
        })
    }
}

#[derive(Default)]
pub(crate) struct EffectSlot {
    pending: Option<EffectFn>,
    cleanup: Option<Dispose>,
    deps: Option<Deps>,
}

#[derive(Default)]
pub(crate) struct HookStore {
    slots: Vec<Slot>,
    /// Passive effects scheduled by the last render, in slot order.
    pending_effects: Vec<usize>,
}

impl HookStore {
    pub(crate) fn has_pending_effects(&self) -> bool {
        !self.pending_effects.is_empty()
    }
}

/// Runs the effect queued in slot `index`: previous cleanup first, then the
/// new body. No-op when nothing is queued there.
pub(crate) fn run_effect(inst: &Instance, index: usize) {
    let (body, cleanup) = {
        let mut store = inst.hooks.borrow_mut();
        match store.slots.get_mut(index) {
            Some(Slot::Effect(e)) => match e.pending.take() {
                Some(body) => (body, e.cleanup.take()),
                None => return,
            },
            _ => return,
        }
    };
    if let Some(c) = cleanup {
        c.run();
    }
    let dispose = body();
    store_cleanup(inst, index, dispose);
}

fn store_cleanup(inst: &Instance, index: usize, dispose: Dispose) {
    let mut store = inst.hooks.borrow_mut();
    match store.slots.get_mut(index) {
        Some(Slot::Effect(e)) => e.cleanup = Some(dispose),
        _ => {
            drop(store);
            dispose.run();
        }
    }
}

/// Flushes passive effects queued by the last render: every cleanup runs
/// before any new body.
pub(crate) fn flush_passive(inst: &Instance) {
    let indices = std::mem::take(&mut inst.hooks.borrow_mut().pending_effects);
    if indices.is_empty() {
        return;
    }

    let mut bodies = Vec::with_capacity(indices.len());
    for index in indices {
        let (body, cleanup) = {
            let mut store = inst.hooks.borrow_mut();
            match store.slots.get_mut(index) {
                Some(Slot::Effect(e)) => match e.pending.take() {
                    Some(body) => (body, e.cleanup.take()),
                    None => continue,
                },
                _ => continue,
            }
        };
        if let Some(c) = cleanup {
            c.run();
        }
        bodies.push((index, body));
    }
    for (index, body) in bodies {
        let dispose = body();
        store_cleanup(inst, index, dispose);
    }
}

/// Unmount: runs every stored cleanup and drops queued bodies.
pub(crate) fn run_cleanups(inst: &Instance) {
    let cleanups: Vec<Dispose> = {
        let mut store = inst.hooks.borrow_mut();
        store.pending_effects.clear();
        store
            .slots
            .iter_mut()
            .filter_map(|s| match s {
                Slot::Effect(e) => {
                    e.pending = None;
                    e.cleanup.take()
                }
                _ => None,
            })
            .collect()
    };
    for c in cleanups {
        c.run();
    }
}

/// Handle passed to render functions; every hook lives here.
pub struct RenderCx<'a> {
    instance: &'a Rc<Instance>,
    context: &'a ContextMap,
    index: usize,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(instance: &'a Rc<Instance>, context: &'a ContextMap) -> Self {
        Self {
            instance,
            context,
            index: 0,
        }
    }

    fn next_index(&mut self) -> usize {
        let i = self.index;
        self.index += 1;
        i
    }

    /// Ensures slot `index` holds `kind`, resetting it otherwise, then hands
    /// it to `f`. Never call user code from `f`.
    fn with_slot<R>(
        &self,
        index: usize,
        kind: SlotKind,
        init: impl FnOnce() -> Slot,
        f: impl FnOnce(&mut Slot) -> R,
    ) -> R {
        let mut store = self.instance.hooks.borrow_mut();
        if store.slots.len() <= index {
            store.slots.resize_with(index + 1, || Slot::Empty);
        }
        let slot = &mut store.slots[index];
        match slot.kind() {
            None => *slot = init(),
            Some(k) if k != kind => {
                log::warn!(
                    "{}: hook slot {} changed from {:?} to {:?}; replacing. \
                     Hooks must run in the same order on every render.",
                    self.instance.name(),
                    index,
                    k,
                    kind
                );
                *slot = init();
            }
            Some(_) => {}
        }
        f(slot)
    }

    /// Shared value stored in a slot, if it holds a `T`.
    fn stored<T: 'static>(&self, index: usize, kind: SlotKind) -> Option<Rc<T>> {
        let store = self.instance.hooks.borrow();
        let value = match (store.slots.get(index)?, kind) {
            (Slot::Reducer(v), SlotKind::Reducer) | (Slot::Value(v), SlotKind::Value) => v.clone(),
            _ => return None,
        };
        match value.downcast::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!(
                    "{}: hook slot {} changed type; replacing.",
                    self.instance.name(),
                    index
                );
                None
            }
        }
    }

    fn put(&self, index: usize, slot: Slot) {
        let mut store = self.instance.hooks.borrow_mut();
        if store.slots.len() <= index {
            store.slots.resize_with(index + 1, || Slot::Empty);
        }
        store.slots[index] = slot;
    }

    pub fn updater(&self) -> Updater {
        self.instance.updater()
    }

    pub fn use_reducer<S: 'static, A: 'static>(
        &mut self,
        reducer: impl Fn(&Rc<S>, A) -> Rc<S> + 'static,
        init: impl FnOnce() -> S,
    ) -> (Rc<S>, Dispatch<A>) {
        let index = self.next_index();
        let cell = match self.stored::<ReducerCell<S, A>>(index, SlotKind::Reducer) {
            Some(cell) => cell,
            None => {
                let cell = ReducerCell::new(init(), Rc::downgrade(self.instance));
                self.put(index, Slot::Reducer(cell.clone()));
                cell
            }
        };
        *cell.reducer.borrow_mut() = Rc::new(reducer);
        let value = cell.value.borrow().clone();
        (value, cell.dispatch.clone())
    }

    /// Local state. Setting an equal value does not schedule a render.
    pub fn use_state<T: PartialEq + 'static>(&mut self, init: impl FnOnce() -> T) -> (Rc<T>, SetState<T>) {
        let (value, dispatch) = self.use_reducer(
            |current: &Rc<T>, action: StateAction<T>| {
                let next = match action {
                    StateAction::Set(v) => v,
                    StateAction::Update(f) => f(current),
                };
                if **current == next {
                    current.clone()
                } else {
                    Rc::new(next)
                }
            },
            init,
        );
        (value, SetState(dispatch))
    }

    /// Runs after paint when `deps` changed (`None`: after every render).
    pub fn use_effect(&mut self, deps: Option<Deps>, effect: impl FnOnce() -> Dispose + 'static) {
        if let Some(index) = self.schedule_effect(deps, Box::new(effect)) {
            self.instance.hooks.borrow_mut().pending_effects.push(index);
        }
    }

    /// Runs during commit, before control returns to the caller.
    pub fn use_layout_effect(&mut self, deps: Option<Deps>, effect: impl FnOnce() -> Dispose + 'static) {
        if let Some(index) = self.schedule_effect(deps, Box::new(effect)) {
            self.instance
                .push_callback(RenderCallback::LayoutEffect(index));
        }
    }

    fn schedule_effect(&mut self, deps: Option<Deps>, body: EffectFn) -> Option<usize> {
        let index = self.next_index();
        let scheduled = self.with_slot(
            index,
            SlotKind::Effect,
            || Slot::Effect(EffectSlot::default()),
            |slot| {
                let Slot::Effect(e) = slot else { return false };
                if deps_changed(e.deps.as_ref(), deps.as_ref()) {
                    e.pending = Some(body);
                    e.deps = deps;
                    true
                } else {
                    false
                }
            },
        );
        scheduled.then_some(index)
    }

    pub fn use_memo<T: 'static>(&mut self, deps: Option<Deps>, compute: impl FnOnce() -> T) -> Rc<T> {
        let index = self.next_index();
        let cached = {
            let store = self.instance.hooks.borrow();
            match store.slots.get(index) {
                Some(Slot::Memo { value, deps: old }) if !deps_changed(old.as_ref(), deps.as_ref()) => {
                    value.clone().downcast::<T>().ok()
                }
                _ => None,
            }
        };
        if let Some(v) = cached {
            return v;
        }
        let value = Rc::new(compute());
        self.with_slot(
            index,
            SlotKind::Memo,
            || Slot::Empty,
            |slot| {
                *slot = Slot::Memo {
                    value: value.clone(),
                    deps,
                }
            },
        );
        value
    }

    /// Event handler whose identity only changes with `deps`.
    pub fn use_callback(&mut self, deps: Option<Deps>, f: impl Fn(&Event) + 'static) -> EventHandler {
        (*self.use_memo(deps, || EventHandler::new(f))).clone()
    }

    /// A mutable box that survives re-renders. Writing to it never
    /// schedules a render.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let index = self.next_index();
        if let Some(v) = self.stored::<RefCell<T>>(index, SlotKind::Value) {
            return v;
        }
        let v = Rc::new(RefCell::new(init()));
        self.put(index, Slot::Value(v.clone()));
        v
    }

    /// Exposes `create()` through `node_ref` instead of the instance.
    pub fn use_imperative_handle<T: 'static>(
        &mut self,
        node_ref: Option<&NodeRef>,
        deps: Option<Deps>,
        create: impl FnOnce() -> Rc<T> + 'static,
    ) {
        let node_ref = node_ref.cloned();
        self.use_layout_effect(deps, move || {
            let Some(r) = node_ref else {
                return Dispose::none();
            };
            if let Err(e) = r.assign(Some(RefValue::Custom(create()))) {
                log::warn!("imperative handle: ref callback failed: {e}");
            }
            Dispose::new(move || {
                if let Err(e) = r.assign(None) {
                    log::warn!("imperative handle: ref callback failed: {e}");
                }
            })
        });
    }

    /// Nearest provider's value, or the context default. Re-renders this
    /// component whenever that provider publishes a new value.
    pub fn use_context<T: 'static>(&mut self, ctx: &Context<T>) -> Rc<T> {
        self.read_context(ctx.id(), &ctx.default_value())
    }

    pub(crate) fn read_context<T: 'static>(&mut self, id: ContextId, default: &Rc<T>) -> Rc<T> {
        let index = self.next_index();
        let provider = self.context.get(id).cloned();
        let first = self.with_slot(
            index,
            SlotKind::Context,
            || Slot::Context { subscribed: false },
            |slot| match slot {
                Slot::Context { subscribed } if provider.is_some() => {
                    !std::mem::replace(subscribed, true)
                }
                _ => false,
            },
        );

        let Some(provider) = provider else {
            return default.clone();
        };
        if first {
            self.instance.subscribe(&provider);
        }
        provided_value::<T>(&provider).unwrap_or_else(|| default.clone())
    }

    /// Turns this component into an error boundary. Returns the caught
    /// error (if any) and a function that clears it.
    pub fn use_error_boundary(
        &mut self,
        on_error: Option<Rc<dyn Fn(&Thrown, &ErrorInfo)>>,
    ) -> (Option<Thrown>, Rc<dyn Fn()>) {
        let (error, dispatch) =
            self.use_reducer(|_: &Rc<Option<Thrown>>, next: Option<Thrown>| Rc::new(next), || None);

        let set = dispatch.clone();
        *self.instance.catch_handler.borrow_mut() = Some(Rc::new(move |thrown, info| {
            if let Some(cb) = &on_error {
                cb(thrown, info);
            }
            set.dispatch(Some(thrown.clone()));
        }));

        let reset: Rc<dyn Fn()> = Rc::new(move || dispatch.dispatch(None));
        ((*error).clone(), reset)
    }

    /// Identifier unique within this renderer, stable for the instance's
    /// lifetime.
    pub fn use_id(&mut self) -> Rc<str> {
        let index = self.next_index();
        let queue = self.instance.queue.clone();
        self.with_slot(
            index,
            SlotKind::Id,
            || Slot::Id(Rc::from(format!("P{:x}", queue.next_id()))),
            |slot| match slot {
                Slot::Id(id) => id.clone(),
                _ => Rc::from(""),
            },
        )
    }

    /// Lags one passive-effect flush behind `value`.
    pub fn use_deferred_value<T: Clone + PartialEq + 'static>(&mut self, value: T) -> T {
        let (deferred, set) = self.use_state(|| value.clone());
        let next = value.clone();
        self.use_effect(None, move || {
            set.set(next);
            Dispose::none()
        });
        (*deferred).clone()
    }

    /// `(is_pending, start)`. `start` runs its callback on the microtask
    /// queue, with `is_pending` true until it has run.
    pub fn use_transition(&mut self) -> (bool, StartTransition) {
        let (pending, set) = self.use_state(|| false);
        let queue = self.instance.queue.clone();
        let start = StartTransition(Rc::new(move |f: Box<dyn FnOnce()>| {
            set.set(true);
            let done = set.clone();
            queue.defer(Task::new(move || {
                f();
                done.set(false);
                Ok(())
            }));
        }));
        (*pending, start)
    }

    /// Reads an external store, re-rendering when its snapshot changes.
    /// `subscribe` is called once, on mount; the returned `Dispose`
    /// unsubscribes on unmount.
    pub fn use_sync_external_store<T: Clone + PartialEq + 'static>(
        &mut self,
        subscribe: impl FnOnce(Rc<dyn Fn()>) -> Dispose + 'static,
        get_snapshot: impl Fn() -> T + 'static,
    ) -> T {
        let value = get_snapshot();
        let get_snapshot: Rc<dyn Fn() -> T> = Rc::new(get_snapshot);
        let store = self.use_ref(|| (value.clone(), get_snapshot.clone()));
        let (_, force) = self.use_reducer(|_: &Rc<()>, ()| Rc::new(()), || ());

        let changed = |store: &RefCell<(T, Rc<dyn Fn() -> T>)>| {
            let guard = store.borrow();
            let (last, get) = &*guard;
            get() != *last
        };

        {
            let store = store.clone();
            let force = force.clone();
            let current = value.clone();
            self.use_layout_effect(None, move || {
                *store.borrow_mut() = (current, get_snapshot);
                if changed(&store) {
                    force.dispatch(());
                }
                Dispose::none()
            });
        }

        self.use_effect(crate::deps![], move || {
            if changed(&store) {
                force.dispatch(());
            }
            let on_change: Rc<dyn Fn()> = Rc::new(move || {
                if changed(&store) {
                    force.dispatch(());
                }
            });
            subscribe(on_change)
        });

        value
    }

    pub fn use_debug_value(&mut self, value: impl Debug) {
        log::debug!("{}: {:?}", self.instance.name(), value);
    }
}

struct ReducerCell<S, A> {
    value: RefCell<Rc<S>>,
    reducer: RefCell<Rc<dyn Fn(&Rc<S>, A) -> Rc<S>>>,
    instance: Weak<Instance>,
    dispatch: Dispatch<A>,
}

impl<S: 'static, A: 'static> ReducerCell<S, A> {
    fn new(initial: S, instance: Weak<Instance>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            ReducerCell {
                value: RefCell::new(Rc::new(initial)),
                reducer: RefCell::new(Rc::new(|s: &Rc<S>, _: A| s.clone())),
                instance,
                dispatch: Dispatch(Rc::new(move |action| {
                    if let Some(cell) = weak.upgrade() {
                        cell.apply(action);
                    }
                })),
            }
        })
    }

    /// Same `Rc` back from the reducer means no change: nothing is queued.
    fn apply(&self, action: A) {
        let reducer = self.reducer.borrow().clone();
        let current = self.value.borrow().clone();
        let next = reducer(&current, action);
        if Rc::ptr_eq(&next, &current) {
            return;
        }
        *self.value.borrow_mut() = next;
        if let Some(inst) = self.instance.upgrade() {
            inst.enqueue();
        }
    }
}

/// Stable dispatcher returned by [`RenderCx::use_reducer`].
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Dispatch(self.0.clone())
    }
}

impl<A> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.0)(action)
    }

    pub fn ptr_eq(&self, other: &Dispatch<A>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

pub enum StateAction<T> {
    Set(T),
    Update(Box<dyn FnOnce(&T) -> T>),
}

/// Setter returned by [`RenderCx::use_state`].
pub struct SetState<T>(Dispatch<StateAction<T>>);

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        SetState(self.0.clone())
    }
}

impl<T: 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.0.dispatch(StateAction::Set(value))
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.0.dispatch(StateAction::Update(Box::new(f)))
    }
}

#[derive(Clone)]
pub struct StartTransition(Rc<dyn Fn(Box<dyn FnOnce()>)>);

impl StartTransition {
    pub fn start(&self, f: impl FnOnce() + 'static) {
        (self.0)(Box::new(f))
    }
}
