use std::rc::Rc;

use crate::bindings::PropertyTable;
use crate::error::Thrown;
use crate::node::VNode;
use crate::scheduler::Task;
use crate::value::Event;

/// Hook points around reconciliation. Every method defaults to a no-op.
pub trait RenderObserver {
    /// A top-level `render`/`hydrate` call is starting.
    fn root_render(&self, _root: &VNode) {}
    fn diff_start(&self, _vnode: &VNode) {}
    fn diffed(&self, _vnode: &VNode) {}
    /// `callbacks` is the number of instances with queued render callbacks.
    fn commit(&self, _root: &VNode, _callbacks: usize) {}
    fn unmount(&self, _vnode: &VNode) {}
    fn event(&self, _event: &Event) {}
    /// A boundary named `boundary` absorbed `error`.
    fn caught(&self, _error: &Thrown, _boundary: &str) {}
}

/// Schedules a task on the host's event loop.
pub type Schedule = Rc<dyn Fn(Task)>;

/// Renderer configuration.
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) debounce_rendering: Option<Schedule>,
    pub(crate) request_animation_frame: Option<Schedule>,
    pub(crate) observer: Option<Rc<dyn RenderObserver>>,
    pub(crate) properties: Rc<PropertyTable>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where flushes are scheduled. Without it they go to
    /// `request_animation_frame`, then to the renderer's microtask queue.
    pub fn debounce_rendering(mut self, f: impl Fn(Task) + 'static) -> Self {
        self.debounce_rendering = Some(Rc::new(f));
        self
    }

    /// Frame-aligned scheduling: passive effects always run here, flushes
    /// too unless `debounce_rendering` is set. Without it both share the
    /// microtask queue.
    pub fn request_animation_frame(mut self, f: impl Fn(Task) + 'static) -> Self {
        self.request_animation_frame = Some(Rc::new(f));
        self
    }

    pub fn observer(mut self, observer: Rc<dyn RenderObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn property_table(mut self, table: PropertyTable) -> Self {
        self.properties = Rc::new(table);
        self
    }

    pub(crate) fn observe(&self, f: impl FnOnce(&dyn RenderObserver)) {
        if let Some(o) = &self.observer {
            f(o.as_ref())
        }
    }
}
