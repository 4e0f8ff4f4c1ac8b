//! Suspension: a render can hand back a [`Pending`] instead of output. The
//! nearest [`suspense`] boundary shows its fallback until the handle
//! resolves, then renders its children again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::{Component, State, Updater};
use crate::error::{ComponentError, ErrorInfo, Thrown};
use crate::hooks::RenderCx;
use crate::node::{
    Child, ComponentKind, ComponentType, NodeType, Props, RenderResult, Rendered, VNode,
    create_element, next_unique,
};
use crate::value::{Bag, PropValue};

struct PendingInner {
    id: u64,
    resolved: Cell<bool>,
    continuations: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Resolve-once handle for work a render is waiting on.
#[derive(Clone)]
pub struct Pending(Rc<PendingInner>);

impl Pending {
    pub fn new() -> Self {
        Pending(Rc::new(PendingInner {
            id: next_unique(),
            resolved: Cell::new(false),
            continuations: RefCell::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn is_resolved(&self) -> bool {
        self.0.resolved.get()
    }

    /// Runs every registered continuation once. Later calls are no-ops.
    pub fn resolve(&self) {
        if self.0.resolved.replace(true) {
            return;
        }
        let continuations = std::mem::take(&mut *self.0.continuations.borrow_mut());
        for f in continuations {
            f();
        }
    }

    /// Runs `f` on resolution, immediately if already resolved.
    pub fn then(&self, f: impl FnOnce() + 'static) {
        if self.is_resolved() {
            f();
        } else {
            self.0.continuations.borrow_mut().push(Box::new(f));
        }
    }
}

impl Default for Pending {
    fn default() -> Self {
        Self::new()
    }
}

const SUSPENDED: &str = "suspended";

struct SuspenseBoundary;

impl Component for SuspenseBoundary {
    fn create(_props: &Props) -> Self {
        SuspenseBoundary
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::new().with(SUSPENDED, false)
    }

    fn is_boundary(&self) -> bool {
        true
    }

    fn did_catch(
        &mut self,
        updater: &Updater,
        error: &Thrown,
        _info: &ErrorInfo,
    ) -> Result<(), ComponentError> {
        match error {
            Thrown::Pending(pending) => {
                log::debug!("suspense: waiting on #{}", pending.id());
                updater.set_state(State::new().with(SUSPENDED, true));
                let updater = updater.clone();
                pending.then(move || updater.set_state(State::new().with(SUSPENDED, false)));
                Ok(())
            }
            Thrown::Error(e) => Err(e.clone()),
        }
    }

    fn render(&mut self, _cx: &mut RenderCx<'_>, props: &Props, state: &State) -> RenderResult {
        if state.bool(SUSPENDED) == Some(true) {
            let fallback = props
                .get("fallback")
                .and_then(|f| f.downcast::<Child>())
                .map(|f| (*f).clone())
                .unwrap_or_default();
            return Ok(fallback.into());
        }
        Ok(props.children_or_empty().into())
    }
}

thread_local! {
    static SUSPENSE: ComponentType = ComponentType::class::<SuspenseBoundary>().with_name("Suspense");
}

/// Boundary that renders `fallback` while anything below it is pending.
pub fn suspense(fallback: impl Into<Child>, children: Vec<Child>) -> VNode {
    let ty = SUSPENSE.with(|s| s.clone());
    let fallback: Rc<Child> = Rc::new(fallback.into());
    create_element(ty, Bag::new().with("fallback", PropValue::opaque(fallback)), children)
}

enum LazyState {
    Idle(Option<Box<dyn FnOnce(LazyResolver)>>),
    Loading(Pending),
    Ready(ComponentType),
    Failed(ComponentError),
}

/// Completes a [`lazy`] load.
pub struct LazyResolver {
    state: Rc<RefCell<LazyState>>,
    pending: Pending,
}

impl LazyResolver {
    pub fn resolve(self, ty: ComponentType) {
        *self.state.borrow_mut() = LazyState::Ready(ty);
        self.pending.resolve();
    }

    pub fn fail(self, error: ComponentError) {
        *self.state.borrow_mut() = LazyState::Failed(error);
        self.pending.resolve();
    }
}

/// A component whose implementation arrives later. `loader` runs on first
/// render and may resolve synchronously or keep the resolver for later.
pub fn lazy(loader: impl FnOnce(LazyResolver) + 'static) -> ComponentType {
    let state = Rc::new(RefCell::new(LazyState::Idle(Some(Box::new(loader)))));
    ComponentType::unique(
        "Lazy",
        ComponentKind::Function(Rc::new(move |_cx: &mut RenderCx<'_>, props: &Props| {
            let loader = match &mut *state.borrow_mut() {
                LazyState::Idle(loader) => loader.take(),
                _ => None,
            };
            if let Some(loader) = loader {
                let pending = Pending::new();
                *state.borrow_mut() = LazyState::Loading(pending.clone());
                loader(LazyResolver {
                    state: state.clone(),
                    pending,
                });
            }
            lazy_output(&state.borrow(), props)
        })),
    )
}

fn lazy_output(state: &LazyState, props: &Props) -> RenderResult {
    match state {
        LazyState::Ready(ty) => Ok(VNode::from_parts(
            NodeType::Component(ty.clone()),
            Rc::new(props.clone()),
            None,
            None,
        )
        .into()),
        LazyState::Failed(e) => Err(e.clone()),
        LazyState::Loading(pending) => Ok(Rendered::Pending(pending.clone())),
        LazyState::Idle(_) => Err(ComponentError::msg("lazy component has no loader")),
    }
}
