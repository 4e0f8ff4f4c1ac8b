use std::rc::Rc;

use vtree_core::prelude::*;
use vtree_devtools::Inspector;
use vtree_host::MemoryHost;

fn list(keys: &[i64]) -> VNode {
    let items = keys
        .iter()
        .map(|k| Child::from(h("li", Bag::new().with("key", *k), vec![(*k).into()])))
        .collect();
    h("ul", Bag::new(), items)
}

#[test]
fn counts_passes_and_unmounts() {
    let inspector = Rc::new(Inspector::new());
    let r = Renderer::with_options(MemoryHost::new(), Options::new().observer(inspector.clone()));
    let root = r.host_mut().create_container();

    r.render(list(&[1, 2, 3]), &root).unwrap();
    r.render(list(&[3, 1]), &root).unwrap();

    let m = inspector.metrics();
    assert_eq!(m.root_renders, 2);
    assert_eq!(m.commits, 2);
    assert_eq!(m.unmounts, 2);
    assert!(m.diffs >= 8);
    assert!(inspector.summary().starts_with("renders: 2  |  "));
}

#[test]
fn records_boundary_catches() {
    struct Guard;

    impl Component for Guard {
        fn create(_props: &Props) -> Self {
            Guard
        }

        fn derive_state_from_error(&self, _error: &Thrown) -> Option<State> {
            Some(State::new().with("failed", true))
        }

        fn render(&mut self, _cx: &mut RenderCx<'_>, props: &Props, state: &State) -> RenderResult {
            if state.bool("failed") == Some(true) {
                return Ok("fallback".into());
            }
            Ok(props.children_or_empty().into())
        }
    }

    let inspector = Rc::new(Inspector::new());
    let r = Renderer::with_options(MemoryHost::new(), Options::new().observer(inspector.clone()));
    let root = r.host_mut().create_container();
    let broken = ComponentType::function(|_cx, _props| Err(ComponentError::msg("nope")));

    r.render(
        h(ComponentType::class::<Guard>(), Bag::new(), vec![h(&broken, Bag::new(), vec![]).into()]),
        &root,
    )
    .unwrap();
    r.settle().unwrap();

    assert_eq!(r.host().inner_html(root), "fallback");
    let caught = inspector.caught_errors();
    assert_eq!(caught.len(), 1);
    assert_eq!(caught[0].boundary, "Guard");
    assert_eq!(caught[0].message, "nope");
    assert_eq!(inspector.renders_of("Guard"), 2);
}
