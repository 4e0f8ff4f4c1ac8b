use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use proptest::prelude::*;
use vtree_core::prelude::*;
use vtree_host::{HostOp, MemoryHost, NodeHandle};

fn setup() -> (Renderer<MemoryHost>, NodeHandle) {
    let r = Renderer::new(MemoryHost::new());
    let root = r.host_mut().create_container();
    (r, root)
}

fn html(r: &Renderer<MemoryHost>, root: NodeHandle) -> String {
    r.host().inner_html(root)
}

fn list(keys: &[u32]) -> VNode {
    let items = keys
        .iter()
        .map(|k| {
            Child::from(h(
                "li",
                Bag::new().with("key", *k as i64),
                vec![k.to_string().into()],
            ))
        })
        .collect();
    h("ul", Bag::new(), items)
}

#[test]
fn renders_elements_text_and_numbers() {
    let (r, root) = setup();
    let tree = h(
        "div",
        Bag::new().with("id", "app").with("data-n", 3),
        vec!["count: ".into(), 42.into(), Child::Empty, true.into()],
    );
    r.render(tree, &root).unwrap();
    insta::assert_snapshot!(html(&r, root), @r#"<div data-n="3" id="app">count: 42</div>"#);
}

#[test]
fn rerendering_same_tree_is_free() {
    let (r, root) = setup();
    let view = || h("p", Bag::new().with("title", "t"), vec!["hello".into()]);
    r.render(view(), &root).unwrap();
    r.host_mut().clear_ops();

    r.render(view(), &root).unwrap();
    assert_eq!(r.host().mutations(), 0, "{:?}", r.host().ops());
    assert_eq!(html(&r, root), r#"<p title="t">hello</p>"#);
}

#[test]
fn only_changed_props_are_written() {
    let (r, root) = setup();
    r.render(
        h("a", Bag::new().with("href", "/x").with("data-a", "1"), vec!["go".into()]),
        &root,
    )
    .unwrap();
    r.host_mut().clear_ops();

    r.render(h("a", Bag::new().with("href", "/y"), vec!["go".into()]), &root)
        .unwrap();
    let ops = r.host_mut().take_ops();
    let a = r.host().find(root, "a").unwrap();
    assert_eq!(
        ops,
        vec![
            HostOp::RemoveAttribute {
                node: a,
                name: "data-a".into()
            },
            HostOp::SetAttribute {
                node: a,
                name: "href".into(),
                value: "/y".into()
            },
        ]
    );
}

#[test]
fn unchanged_identity_skips_subtree() {
    let (r, root) = setup();
    let renders = Rc::new(RefCell::new(0));
    let counted = renders.clone();
    let leaf = ComponentType::function(move |_cx, _props| {
        *counted.borrow_mut() += 1;
        Ok(h("b", Bag::new(), vec!["leaf".into()]).into())
    });
    let cached = h(&leaf, Bag::new(), vec![]);

    r.render(h("div", Bag::new(), vec![cached.clone().into(), "1".into()]), &root)
        .unwrap();
    r.host_mut().clear_ops();
    r.render(h("div", Bag::new(), vec![cached.into(), "2".into()]), &root)
        .unwrap();

    assert_eq!(*renders.borrow(), 1);
    let ops = r.host_mut().take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::SetText { text, .. } if text == "2"));
    assert_eq!(html(&r, root), "<div><b>leaf</b>2</div>");
}

#[test]
fn keyed_reorder_only_moves_nodes() {
    let (r, root) = setup();
    r.render(list(&[1, 2, 3, 4]), &root).unwrap();
    let before: Vec<_> = {
        let host = r.host();
        let ul = host.find(root, "ul").unwrap();
        host.children(&ul)
    };
    r.host_mut().clear_ops();

    r.render(list(&[4, 1, 3, 2]), &root).unwrap();
    let host = r.host();
    assert_eq!(host.created(), 0);
    assert!(host.ops().iter().all(|op| matches!(op, HostOp::Insert { moved: true, .. })));
    assert!(host.moves() > 0);
    assert_eq!(
        host.inner_html(root),
        "<ul><li>4</li><li>1</li><li>3</li><li>2</li></ul>"
    );
    let ul = host.find(root, "ul").unwrap();
    let after = host.children(&ul);
    assert_eq!(after, vec![before[3], before[0], before[2], before[1]]);
}

#[test]
fn removed_keys_are_unmounted_once() {
    let (r, root) = setup();
    r.render(list(&[1, 2, 3]), &root).unwrap();
    r.host_mut().clear_ops();
    r.render(list(&[3]), &root).unwrap();

    let host = r.host();
    let removes = host
        .ops()
        .iter()
        .filter(|op| matches!(op, HostOp::Remove { .. }))
        .count();
    assert_eq!(removes, 2);
    assert_eq!(host.created(), 0);
    assert_eq!(host.inner_html(root), "<ul><li>3</li></ul>");
}

#[test]
fn type_change_replaces_node() {
    let (r, root) = setup();
    r.render(h("div", Bag::new(), vec![h("span", Bag::new(), vec!["x".into()]).into()]), &root)
        .unwrap();
    r.render(h("div", Bag::new(), vec![h("em", Bag::new(), vec!["x".into()]).into()]), &root)
        .unwrap();
    assert_eq!(html(&r, root), "<div><em>x</em></div>");
}

#[test]
fn fragments_flatten_into_parent() {
    let (r, root) = setup();
    let frag = |items: &[&str]| {
        h(
            fragment_type(),
            Bag::new(),
            items.iter().map(|s| Child::from(h("i", Bag::new(), vec![(*s).into()]))).collect(),
        )
    };
    r.render(h("p", Bag::new(), vec!["a".into(), frag(&["b", "c"]).into(), "d".into()]), &root)
        .unwrap();
    assert_eq!(html(&r, root), "<p>a<i>b</i><i>c</i>d</p>");

    r.render(h("p", Bag::new(), vec!["a".into(), frag(&["c"]).into(), "d".into()]), &root)
        .unwrap();
    assert_eq!(html(&r, root), "<p>a<i>c</i>d</p>");
}

#[test]
fn style_maps_patch_per_key() {
    let (r, root) = setup();
    let style = StyleMap::new()
        .set("width", 10)
        .set("opacity", 0.5)
        .set("zIndex", 2)
        .set("--gap", 4);
    r.render(h("div", Bag::new().with("style", style), vec![]), &root)
        .unwrap();
    {
        let host = r.host();
        let div = host.find(root, "div").unwrap();
        assert_eq!(host.style(div, "width").as_deref(), Some("10px"));
        assert_eq!(host.style(div, "opacity").as_deref(), Some("0.5"));
        assert_eq!(host.style(div, "zIndex").as_deref(), Some("2"));
        assert_eq!(host.style(div, "--gap").as_deref(), Some("4"));
    }

    r.render(
        h("div", Bag::new().with("style", StyleMap::new().set("width", "50%")), vec![]),
        &root,
    )
    .unwrap();
    insta::assert_snapshot!(html(&r, root), @r#"<div style="width: 50%"></div>"#);
}

#[test]
fn boolean_attributes_and_aria() {
    let (r, root) = setup();
    r.render(
        h(
            "div",
            Bag::new()
                .with("aria-hidden", false)
                .with("data-flag", false)
                .with("data-on", true),
            vec![],
        ),
        &root,
    )
    .unwrap();
    insta::assert_snapshot!(html(&r, root), @r#"<div aria-hidden="false" data-on="true"></div>"#);
}

#[test]
fn svg_children_use_namespace_and_attribute_names() {
    let (r, root) = setup();
    r.render(
        h(
            "svg",
            Bag::new().with("width", 10),
            vec![
                h("use", Bag::new().with("xlinkHref", "#a").with("className", "u"), vec![]).into(),
                h(
                    "foreignObject",
                    Bag::new(),
                    vec![h("div", Bag::new().with("className", "html"), vec![]).into()],
                )
                .into(),
            ],
        ),
        &root,
    )
    .unwrap();

    let host = r.host();
    let svg = host.find(root, "svg").unwrap();
    let use_el = host.find(root, "use").unwrap();
    let div = host.find(root, "div").unwrap();
    assert!(host.is_svg(&svg));
    assert!(host.is_svg(&use_el));
    assert!(!host.is_svg(&div));
    assert_eq!(host.attribute(use_el, "href").as_deref(), Some("#a"));
    assert_eq!(host.attribute(use_el, "class").as_deref(), Some("u"));
    assert_eq!(host.attribute(div, "class"), None);
    assert_eq!(host.property(&div, "className"), Some(PropValue::str("html")));
}

#[test]
fn events_capture_then_bubble() {
    let (r, root) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let push = |label: &'static str| {
        let log = log.clone();
        PropValue::handler(move |e: &Event| log.borrow_mut().push(format!("{label}:{}", e.name)))
    };
    r.render(
        h(
            "div",
            Bag::new()
                .with("onClickCapture", push("outer-capture"))
                .with("onClick", push("outer")),
            vec![h("button", Bag::new().with("onClick", push("button")), vec![]).into()],
        ),
        &root,
    )
    .unwrap();

    let button = r.host().find(root, "button").unwrap();
    assert_eq!(r.dispatch_event(&button, &Event::new("click")), 3);
    assert_eq!(
        *log.borrow(),
        vec!["outer-capture:click", "button:click", "outer:click"]
    );
}

#[test]
fn listener_registered_once_and_handler_swapped() {
    let (r, root) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let view = |tag: &'static str| {
        let seen = seen.clone();
        h(
            "button",
            Bag::new().with("onClick", PropValue::handler(move |_| seen.borrow_mut().push(tag))),
            vec![],
        )
    };
    r.render(view("first"), &root).unwrap();
    r.render(view("second"), &root).unwrap();

    let button = r.host().find(root, "button").unwrap();
    let adds = r
        .host()
        .ops()
        .iter()
        .filter(|op| matches!(op, HostOp::AddListener { .. }))
        .count();
    assert_eq!(adds, 1);
    r.dispatch_event(&button, &Event::new("click"));
    assert_eq!(*seen.borrow(), vec!["second"]);

    r.render(h("button", Bag::new(), vec![]), &root).unwrap();
    assert!(r.host().listeners(button).is_empty());
    assert_eq!(r.dispatch_event(&button, &Event::new("click")), 0);
}

#[test]
fn controlled_value_is_restored_after_children() {
    let (r, root) = setup();
    let view = || h("input", Bag::new().with("value", "a"), vec![]);
    r.render(view(), &root).unwrap();
    let input = r.host().find(root, "input").unwrap();
    assert_eq!(r.host().property(&input, "value"), Some(PropValue::str("a")));

    r.host_mut().set_property(&input, "value", &PropValue::str("ab"));
    r.render(view(), &root).unwrap();
    assert_eq!(r.host().property(&input, "value"), Some(PropValue::str("a")));
}

#[test]
fn hydrate_adopts_existing_nodes() {
    let r = Renderer::new(MemoryHost::new());
    let (root, div, text) = {
        let mut host = r.host_mut();
        let root = host.create_container();
        let div = host.build_element("div", &[("id", "x")]);
        let span = host.build_element("span", &[]);
        let text = host.build_text("hi");
        let stray = host.build_element("aside", &[]);
        host.append(root, div);
        host.append(div, span);
        host.append(span, text);
        host.append(root, stray);
        (root, div, text)
    };

    let clicks = Rc::new(RefCell::new(0));
    let c = clicks.clone();
    r.hydrate(
        h(
            "div",
            Bag::new()
                .with("id", "x")
                .with("onClick", PropValue::handler(move |_| *c.borrow_mut() += 1)),
            vec![h("span", Bag::new(), vec!["hi".into()]).into()],
        ),
        &root,
    )
    .unwrap();

    {
        let host = r.host();
        assert_eq!(host.created(), 0);
        assert_eq!(host.children(&root), vec![div]);
        assert_eq!(host.parent(&text).and_then(|s| host.parent(&s)), Some(div));
        assert_eq!(host.inner_html(root), r#"<div id="x"><span>hi</span></div>"#);
    }
    r.dispatch_event(&text, &Event::new("click"));
    assert_eq!(*clicks.borrow(), 1);
}

#[test]
fn unmount_clears_container_and_fibers() {
    let (r, root) = setup();
    r.render(list(&[1, 2, 3]), &root).unwrap();
    assert!(r.fiber_count() > 1);
    r.unmount(&root).unwrap();
    assert_eq!(html(&r, root), "");
    assert_eq!(r.fiber_count(), 1);
}

#[test]
fn describe_outlines_tree() {
    let (r, root) = setup();
    r.render(list(&[7, 8]), &root).unwrap();
    insta::assert_snapshot!(r.describe(&root).trim_end(), @r#"
    Fragment
      <ul>
        <li key=7>
          #text "7"
        <li key=8>
          #text "8"
    "#);
}

fn keys_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::btree_set(0u32..16, 0..10)
        .prop_map(|s| s.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #[test]
    fn keyed_updates_keep_surviving_nodes(a in keys_strategy(), b in keys_strategy()) {
        let (r, root) = setup();
        r.render(list(&a), &root).unwrap();
        r.host_mut().clear_ops();
        r.render(list(&b), &root).unwrap();

        let expected: String = b.iter().map(|k| format!("<li>{k}</li>")).collect();
        prop_assert_eq!(html(&r, root), format!("<ul>{expected}</ul>"));

        let old: BTreeSet<_> = a.iter().collect();
        let new: BTreeSet<_> = b.iter().collect();
        let host = r.host();
        prop_assert_eq!(host.created(), 2 * new.difference(&old).count());
        let removes = host.ops().iter().filter(|op| matches!(op, HostOp::Remove { .. })).count();
        prop_assert_eq!(removes, old.difference(&new).count());
    }
}
