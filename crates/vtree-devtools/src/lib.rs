use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use web_time::Instant;

use vtree_core::{Event, NodeType, RenderObserver, Thrown, VNode};

/// Running counters collected by an [`Inspector`].
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub root_renders: u64,
    pub diffs: u64,
    pub commits: u64,
    /// Instances whose render callbacks ran, summed over all commits.
    pub callbacks: u64,
    pub unmounts: u64,
    pub events: u64,
    pub last_pass_ms: f32,
    /// Exponential moving average of pass times.
    pub pass_ms_smooth: f32,
}

/// An error a boundary absorbed.
#[derive(Clone, Debug, PartialEq)]
pub struct Caught {
    pub boundary: String,
    pub message: String,
}

/// Render observer that counts reconciliation work and times each pass from
/// its first diff to its commit.
pub struct Inspector {
    enabled: Cell<bool>,
    metrics: RefCell<Metrics>,
    pass_start: Cell<Option<Instant>>,
    per_component: RefCell<HashMap<String, u64>>,
    caught: RefCell<Vec<Caught>>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self {
            enabled: Cell::new(true),
            metrics: RefCell::new(Metrics::default()),
            pass_start: Cell::new(None),
            per_component: RefCell::new(HashMap::new()),
            caught: RefCell::new(Vec::new()),
        }
    }

    pub fn toggle(&self) {
        self.enabled.set(!self.enabled.get());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.borrow().clone()
    }

    /// How often a component with this name was diffed.
    pub fn renders_of(&self, name: &str) -> u64 {
        self.per_component.borrow().get(name).copied().unwrap_or(0)
    }

    /// The `n` most diffed components, busiest first, ties by name.
    pub fn hottest(&self, n: usize) -> Vec<(String, u64)> {
        let mut all: Vec<_> = self
            .per_component
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    pub fn caught_errors(&self) -> Vec<Caught> {
        self.caught.borrow().clone()
    }

    pub fn reset(&self) {
        *self.metrics.borrow_mut() = Metrics::default();
        self.per_component.borrow_mut().clear();
        self.caught.borrow_mut().clear();
        self.pass_start.set(None);
    }

    /// One-line digest of the counters.
    pub fn summary(&self) -> String {
        let m = self.metrics.borrow();
        let mut lines = vec![
            format!("renders: {}", m.root_renders),
            format!("diffs: {}", m.diffs),
            format!("commits: {}", m.commits),
            format!("unmounts: {}", m.unmounts),
        ];
        if m.events > 0 {
            lines.push(format!("events: {}", m.events));
        }
        let caught = self.caught.borrow().len();
        if caught > 0 {
            lines.push(format!("caught: {caught}"));
        }
        lines.push(format!("pass: {:.2} ms", m.pass_ms_smooth));
        lines.join("  |  ")
    }

    fn open_pass(&self) {
        if self.pass_start.get().is_none() {
            self.pass_start.set(Some(Instant::now()));
        }
    }
}

fn component_name(vnode: &VNode) -> Option<&str> {
    match vnode.ty() {
        NodeType::Component(c) if !c.is_fragment() => Some(c.name()),
        _ => None,
    }
}

impl RenderObserver for Inspector {
    fn root_render(&self, _root: &VNode) {
        if !self.is_enabled() {
            return;
        }
        self.metrics.borrow_mut().root_renders += 1;
        self.pass_start.set(Some(Instant::now()));
    }

    fn diff_start(&self, vnode: &VNode) {
        if !self.is_enabled() {
            return;
        }
        self.open_pass();
        self.metrics.borrow_mut().diffs += 1;
        if let Some(name) = component_name(vnode) {
            *self.per_component.borrow_mut().entry(name.to_string()).or_default() += 1;
        }
    }

    fn commit(&self, root: &VNode, callbacks: usize) {
        if !self.is_enabled() {
            return;
        }
        let mut m = self.metrics.borrow_mut();
        m.commits += 1;
        m.callbacks += callbacks as u64;
        if let Some(start) = self.pass_start.take() {
            let ms = start.elapsed().as_secs_f32() * 1000.0;
            m.last_pass_ms = ms;
            let a = 0.2;
            m.pass_ms_smooth = if m.commits == 1 {
                ms
            } else {
                (1.0 - a) * m.pass_ms_smooth + a * ms
            };
        }
        log::debug!(
            "commit {:?}: {} callbacks, {:.2} ms",
            root.ty(),
            callbacks,
            m.last_pass_ms
        );
    }

    fn unmount(&self, _vnode: &VNode) {
        if self.is_enabled() {
            self.metrics.borrow_mut().unmounts += 1;
        }
    }

    fn event(&self, event: &Event) {
        if !self.is_enabled() {
            return;
        }
        self.metrics.borrow_mut().events += 1;
        log::trace!("event {}", event.name);
    }

    fn caught(&self, error: &Thrown, boundary: &str) {
        if !self.is_enabled() {
            return;
        }
        let message = match error.error() {
            Some(e) => e.to_string(),
            None => "suspended".to_string(),
        };
        log::debug!("{boundary} caught: {message}");
        self.caught.borrow_mut().push(Caught {
            boundary: boundary.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtree_core::{Bag, ComponentType, h};

    #[test]
    fn test_disabled_inspector_counts_nothing() {
        let inspector = Inspector::new();
        inspector.toggle();
        let node = h("div", Bag::new(), vec![]);
        inspector.root_render(&node);
        inspector.diff_start(&node);
        inspector.commit(&node, 0);
        assert_eq!(inspector.metrics().diffs, 0);
        assert_eq!(inspector.metrics().commits, 0);
    }

    #[test]
    fn test_hottest_orders_by_count_then_name() {
        let inspector = Inspector::new();
        let ty = |name: &'static str| ComponentType::function(|_cx, _props| Ok("".into())).with_name(name);
        for name in ["Row", "Row", "App", "Cell", "Cell"] {
            inspector.diff_start(&h(ty(name), Bag::new(), vec![]));
        }
        inspector.diff_start(&h("li", Bag::new(), vec![]));
        assert_eq!(
            inspector.hottest(2),
            [("Cell".to_string(), 2), ("Row".to_string(), 2)]
        );
        assert_eq!(inspector.renders_of("App"), 1);
        assert_eq!(inspector.metrics().diffs, 6);
    }

    #[test]
    fn test_summary_mentions_caught_errors() {
        let inspector = Inspector::new();
        inspector.caught(&Thrown::Error("boom".into()), "Fallback");
        assert!(inspector.summary().contains("caught: 1"));
        assert_eq!(
            inspector.caught_errors(),
            [Caught {
                boundary: "Fallback".into(),
                message: "boom".into()
            }]
        );
        inspector.reset();
        assert!(!inspector.summary().contains("caught"));
    }
}
