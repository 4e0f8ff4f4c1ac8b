use std::cell::RefCell;
use std::rc::Rc;

use vtree_core::prelude::*;
use vtree_core::{Task, deps};
use vtree_host::{MemoryHost, NodeHandle};

type Tasks = Rc<RefCell<Vec<Task>>>;

/// Renderer whose flushes are parked in the returned list instead of the
/// built-in microtask queue.
fn manual() -> (Renderer<MemoryHost>, NodeHandle, Tasks) {
    let tasks: Tasks = Rc::default();
    let sink = tasks.clone();
    let options = Options::new().debounce_rendering(move |task| sink.borrow_mut().push(task));
    let r = Renderer::with_options(MemoryHost::new(), options);
    let root = r.host_mut().create_container();
    (r, root, tasks)
}

fn run_next(tasks: &Tasks) {
    let task = tasks.borrow_mut().remove(0);
    task.run().unwrap();
}

fn html(r: &Renderer<MemoryHost>, root: NodeHandle) -> String {
    r.host().inner_html(root)
}

type Log = Rc<RefCell<Vec<String>>>;

/// Component exposing its state setter through `slot`.
fn counter(name: &'static str, slot: Rc<RefCell<Option<SetState<i64>>>>, log: Log) -> ComponentType {
    ComponentType::function(move |cx, props| {
        let (n, set) = cx.use_state(|| 0i64);
        *slot.borrow_mut() = Some(set);
        log.borrow_mut().push(name.to_string());
        Ok(h("i", Bag::new(), vec![(*n).into(), props.children_or_empty()]).into())
    })
    .with_name(name)
}

#[test]
fn updates_queued_during_flush_drain_in_same_flush() {
    let (r, root, tasks) = manual();
    let slot: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
    let s = slot.clone();
    let stepper = ComponentType::function(move |cx, _props| {
        let (n, set) = cx.use_state(|| 0i64);
        *s.borrow_mut() = Some(set.clone());
        let seen = *n;
        cx.use_layout_effect(deps![seen], move || {
            if seen % 2 == 1 {
                set.set(seen + 1);
            }
            Dispose::none()
        });
        Ok(h("i", Bag::new(), vec![seen.into()]).into())
    });
    r.render(h(&stepper, Bag::new(), vec![]), &root).unwrap();
    assert!(tasks.borrow().is_empty());

    slot.borrow().clone().unwrap().set(1);
    assert_eq!(tasks.borrow().len(), 1);
    run_next(&tasks);

    assert_eq!(html(&r, root), "<i>2</i>");
    assert!(tasks.borrow().is_empty());
}

#[test]
fn one_flush_request_per_drain() {
    let (r, root, tasks) = manual();
    let log: Log = Rc::default();
    let (a, b): (Rc<RefCell<Option<SetState<i64>>>>, Rc<RefCell<Option<SetState<i64>>>>) = Default::default();
    let first = counter("A", a.clone(), log.clone());
    let second = counter("B", b.clone(), log.clone());
    r.render(
        h("div", Bag::new(), vec![h(&first, Bag::new(), vec![]).into(), h(&second, Bag::new(), vec![]).into()]),
        &root,
    )
    .unwrap();

    a.borrow().clone().unwrap().set(1);
    b.borrow().clone().unwrap().set(2);
    assert_eq!(tasks.borrow().len(), 1);
    run_next(&tasks);
    assert_eq!(html(&r, root), "<div><i>1</i><i>2</i></div>");

    b.borrow().clone().unwrap().set(3);
    assert_eq!(tasks.borrow().len(), 1);
}

#[test]
fn batched_updates_flush_once_at_the_end() {
    let (r, root, tasks) = manual();
    let log: Log = Rc::default();
    let (a, b): (Rc<RefCell<Option<SetState<i64>>>>, Rc<RefCell<Option<SetState<i64>>>>) = Default::default();
    let first = counter("A", a.clone(), log.clone());
    let second = counter("B", b.clone(), log.clone());
    r.render(
        h("div", Bag::new(), vec![h(&first, Bag::new(), vec![]).into(), h(&second, Bag::new(), vec![]).into()]),
        &root,
    )
    .unwrap();
    log.borrow_mut().clear();

    let out = r
        .batched_updates(|| {
            a.borrow().clone().unwrap().set(5);
            b.borrow().clone().unwrap().set(6);
            "done"
        })
        .unwrap();

    assert_eq!(out, "done");
    assert!(tasks.borrow().is_empty());
    assert_eq!(*log.borrow(), ["A", "B"]);
    assert_eq!(html(&r, root), "<div><i>5</i><i>6</i></div>");
}

#[test]
fn panicking_batch_releases_the_queue() {
    let (r, root, tasks) = manual();
    let slot: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
    let view = counter("view", slot.clone(), Log::default());
    r.render(h(&view, Bag::new(), vec![]), &root).unwrap();

    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        r.batched_updates::<()>(|| panic!("handler failed"))
    }));
    assert!(unwound.is_err());

    slot.borrow().clone().unwrap().set(3);
    assert_eq!(tasks.borrow().len(), 1);
    run_next(&tasks);
    assert_eq!(html(&r, root), "<i>3</i>");
}

#[test]
fn shallowest_dirty_component_renders_first() {
    let (r, root, tasks) = manual();
    let log: Log = Rc::default();
    let (outer_set, inner_set): (Rc<RefCell<Option<SetState<i64>>>>, Rc<RefCell<Option<SetState<i64>>>>) =
        Default::default();
    let inner = counter("inner", inner_set.clone(), log.clone());
    let child = h(&inner, Bag::new(), vec![]);
    let outer = counter("outer", outer_set.clone(), log.clone());
    r.render(h(&outer, Bag::new(), vec![child.into()]), &root).unwrap();
    assert_eq!(*log.borrow(), ["outer", "inner"]);
    log.borrow_mut().clear();

    inner_set.borrow().clone().unwrap().set(2);
    outer_set.borrow().clone().unwrap().set(1);
    run_next(&tasks);

    assert_eq!(*log.borrow(), ["outer", "inner"]);
    assert_eq!(html(&r, root), "<i>1<i>2</i></i>");
    assert_eq!(r.pending_renders(), 0);
}

#[test]
fn removed_children_tear_down_before_siblings_render() {
    let (r, root) = {
        let r = Renderer::new(MemoryHost::new());
        let root = r.host_mut().create_container();
        (r, root)
    };
    let log: Log = Rc::default();
    let l = log.clone();
    let item = ComponentType::function(move |cx, props| {
        let name = props.str("name").unwrap_or_default().to_string();
        l.borrow_mut().push(format!("render {name}"));
        let l = l.clone();
        let n = name.clone();
        cx.use_layout_effect(deps![], move || {
            Dispose::new(move || l.borrow_mut().push(format!("cleanup {n}")))
        });
        Ok(h("li", Bag::new(), vec![name.into()]).into())
    });
    let view = |names: &[&str]| {
        let items = names
            .iter()
            .map(|n| Child::from(h(&item, Bag::new().with("key", *n).with("name", *n), vec![])))
            .collect();
        h("ul", Bag::new(), items)
    };

    r.render(view(&["a", "b"]), &root).unwrap();
    log.borrow_mut().clear();
    r.render(view(&["b"]), &root).unwrap();

    assert_eq!(*log.borrow(), ["cleanup a", "render b"]);
    assert_eq!(html(&r, root), "<ul><li>b</li></ul>");
}

#[test]
fn flushes_use_animation_frame_without_debounce() {
    let frames: Tasks = Rc::default();
    let sink = frames.clone();
    let r = Renderer::with_options(
        MemoryHost::new(),
        Options::new().request_animation_frame(move |task| sink.borrow_mut().push(task)),
    );
    let root = r.host_mut().create_container();
    let slot: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
    let view = counter("view", slot.clone(), Log::default());
    r.render(h(&view, Bag::new(), vec![]), &root).unwrap();
    assert!(frames.borrow().is_empty());

    slot.borrow().clone().unwrap().set(5);
    slot.borrow().clone().unwrap().set(6);
    assert_eq!(frames.borrow().len(), 1);
    r.run_microtasks().unwrap();
    assert_eq!(html(&r, root), "<i>0</i>");

    run_next(&frames);
    assert_eq!(html(&r, root), "<i>6</i>");
    assert!(frames.borrow().is_empty());
}

#[test]
fn passive_effects_wait_for_animation_frame() {
    let frames: Tasks = Rc::default();
    let sink = frames.clone();
    let r = Renderer::with_options(
        MemoryHost::new(),
        Options::new().request_animation_frame(move |task| sink.borrow_mut().push(task)),
    );
    let root = r.host_mut().create_container();
    let ran = Rc::new(RefCell::new(0));
    let counted = ran.clone();
    let comp = ComponentType::function(move |cx, _props| {
        let counted = counted.clone();
        cx.use_effect(deps![], move || {
            *counted.borrow_mut() += 1;
            Dispose::none()
        });
        Ok(Child::Empty.into())
    });

    r.render(h(&comp, Bag::new(), vec![]), &root).unwrap();
    r.run_microtasks().unwrap();
    assert_eq!(*ran.borrow(), 0);
    assert_eq!(frames.borrow().len(), 1);

    run_next(&frames);
    assert_eq!(*ran.borrow(), 1);
}

#[test]
fn reentrant_render_is_rejected() {
    let (r, root) = {
        let r = Renderer::new(MemoryHost::new());
        let root = r.host_mut().create_container();
        (r, root)
    };
    let outcome: Rc<RefCell<Option<RenderError>>> = Rc::default();
    let slot = outcome.clone();
    let inner = r.clone();
    let comp = ComponentType::function(move |cx, _props| {
        let slot = slot.clone();
        let inner = inner.clone();
        cx.use_layout_effect(deps![], move || {
            if let Err(e) = inner.render("nested", &root) {
                *slot.borrow_mut() = Some(e);
            }
            Dispose::none()
        });
        Ok("outer".into())
    });

    r.render(h(&comp, Bag::new(), vec![]), &root).unwrap();
    assert!(matches!(*outcome.borrow(), Some(RenderError::Busy("render"))));
    assert_eq!(html(&r, root), "outer");
}
