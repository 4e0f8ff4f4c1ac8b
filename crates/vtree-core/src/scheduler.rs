//! Render queue: instances marked dirty since the last flush, plus the
//! deferred work queues (passive effects, microtasks).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::component::Instance;
use crate::error::RenderError;

/// A unit of deferred work handed to the host's scheduling hooks.
pub struct Task(Box<dyn FnOnce() -> Result<(), RenderError>>);

impl Task {
    pub fn new(f: impl FnOnce() -> Result<(), RenderError> + 'static) -> Self {
        Task(Box::new(f))
    }

    pub fn run(self) -> Result<(), RenderError> {
        (self.0)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task")
    }
}

pub(crate) type Requester = Rc<dyn Fn()>;

#[derive(Default)]
pub(crate) struct RenderQueue {
    pending: RefCell<Vec<Rc<Instance>>>,
    effects: RefCell<Vec<Weak<Instance>>>,
    microtasks: RefCell<VecDeque<Task>>,
    flushing: Cell<bool>,
    batch_depth: Cell<u32>,
    flush_requested: Cell<bool>,
    effects_requested: Cell<bool>,
    next_id: Cell<u64>,
    flush_requester: RefCell<Option<Requester>>,
    effects_requester: RefCell<Option<Requester>>,
}

impl RenderQueue {
    pub(crate) fn set_requesters(&self, flush: Requester, effects: Requester) {
        *self.flush_requester.borrow_mut() = Some(flush);
        *self.effects_requester.borrow_mut() = Some(effects);
    }

    /// Marks `c` dirty and queues it once. Only the first entry after a
    /// drain asks the host for a flush.
    pub(crate) fn enqueue(&self, c: &Rc<Instance>) {
        if c.dirty.replace(true) {
            return;
        }
        self.pending.borrow_mut().push(c.clone());
        log::trace!("enqueue {} (depth {})", c.name(), c.depth());

        if self.flushing.get() || self.batch_depth.get() > 0 {
            return;
        }
        if !self.flush_requested.replace(true) {
            self.request_flush();
        }
    }

    fn request_flush(&self) {
        let requester = self.flush_requester.borrow().clone();
        if let Some(request) = requester {
            request();
        }
    }

    /// Queued instances still dirty. Entries re-rendered inline stay in the
    /// list until the next drain skips them.
    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().iter().filter(|c| c.dirty.get()).count()
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Renders queued instances shallowest-first until the queue stays
    /// empty. Entries queued while draining are merged in and re-sorted.
    pub(crate) fn drain(
        &self,
        mut render: impl FnMut(&Rc<Instance>) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        if self.flushing.replace(true) {
            return Ok(());
        }
        self.flush_requested.set(false);

        let mut result = Ok(());
        let mut len = 0;
        loop {
            // The first `len` entries are sorted deepest first, so the next
            // one pops off the end. Arrivals behind them are merged in enqueue
            // order.
            let next = {
                let mut pending = self.pending.borrow_mut();
                if pending.len() > len {
                    pending[..len].reverse();
                    pending.sort_by_key(|c| c.depth());
                    pending.reverse();
                }
                let c = pending.pop();
                len = pending.len();
                c
            };
            let Some(c) = next else { break };

            if !c.dirty.get() {
                continue;
            }
            if !c.is_mounted() {
                c.dirty.set(false);
                continue;
            }
            if let Err(e) = render(&c) {
                result = Err(e);
                break;
            }
        }

        {
            let mut pending = self.pending.borrow_mut();
            let sorted = len.min(pending.len());
            pending[..sorted].reverse();
        }
        self.flushing.set(false);
        if result.is_err() && !self.pending.borrow().is_empty() {
            self.flush_requested.set(true);
            self.request_flush();
        }
        result
    }

    /// Holds flush requests back until the returned batch is closed or
    /// dropped.
    pub(crate) fn batch(&self) -> Batch<'_> {
        self.batch_depth.set(self.batch_depth.get() + 1);
        Batch {
            queue: self,
            open: true,
        }
    }

    fn end_batch(&self) -> bool {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth == 0
    }

    /// Queues an instance whose passive effects must run after paint.
    pub(crate) fn after_paint(&self, c: &Rc<Instance>) {
        self.effects.borrow_mut().push(Rc::downgrade(c));
        if !self.effects_requested.replace(true) {
            let requester = self.effects_requester.borrow().clone();
            if let Some(request) = requester {
                request();
            }
        }
    }

    pub(crate) fn take_effects(&self) -> Vec<Rc<Instance>> {
        self.effects_requested.set(false);
        std::mem::take(&mut *self.effects.borrow_mut())
            .into_iter()
            .filter_map(|w| w.upgrade())
            .collect()
    }

    pub(crate) fn has_effects(&self) -> bool {
        !self.effects.borrow().is_empty()
    }

    pub(crate) fn defer(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }

    pub(crate) fn next_microtask(&self) -> Option<Task> {
        self.microtasks.borrow_mut().pop_front()
    }

    pub(crate) fn has_microtasks(&self) -> bool {
        !self.microtasks.borrow().is_empty()
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

/// An open batching scope on a [`RenderQueue`]. Unwinding through it still
/// closes the scope.
pub(crate) struct Batch<'a> {
    queue: &'a RenderQueue,
    open: bool,
}

impl Batch<'_> {
    /// True when this closed the outermost batch.
    pub(crate) fn close(mut self) -> bool {
        self.open = false;
        self.queue.end_batch()
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.open {
            self.queue.end_batch();
        }
    }
}
