#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::bindings::{PropertyTable, is_non_dimensional};
    use crate::component::Instance;
    use crate::effects::Dispose;
    use crate::node::*;
    use crate::patch::{style_value, svg_attribute_name};
    use crate::refs::NodeRef;
    use crate::scheduler::RenderQueue;
    use crate::tree::{NodeId, Tree};
    use crate::value::*;

    fn named(name: &'static str) -> ComponentType {
        ComponentType::function(|_cx, _props| Ok(Child::Empty.into())).with_name(name)
    }

    #[test]
    fn test_event_names() {
        let table = PropertyTable::standard();
        assert_eq!(table.event_name("onClick"), Some(("click".to_string(), false)));
        assert_eq!(table.event_name("onClickCapture"), Some(("click".to_string(), true)));
        assert_eq!(table.event_name("onMyEvent"), Some(("MyEvent".to_string(), false)));
        assert_eq!(table.event_name("on"), None);
        assert_eq!(table.event_name("title"), None);

        let custom = PropertyTable::standard().with_event("MyEvent");
        assert_eq!(custom.event_name("onMyEvent"), Some(("myevent".to_string(), false)));
    }

    #[test]
    fn test_property_table() {
        let table = PropertyTable::standard();
        assert!(table.is_property("input", "value"));
        assert!(table.is_property("div", "className"));
        assert!(!table.is_property("div", "value"));
        assert!(!table.is_property("a", "href"));
        assert!(!table.is_property("input", "width"));

        let empty = PropertyTable::empty();
        assert!(!empty.is_property("div", "className"));
        assert!(empty.with_property("video", "muted").is_property("video", "muted"));
    }

    #[test]
    fn test_unitless_style_keys() {
        for key in ["opacity", "zIndex", "flexGrow", "lineHeight", "order", "zoom", "gridRow"] {
            assert!(is_non_dimensional(key), "{key}");
        }
        for key in ["width", "marginTop", "fontSize", "left"] {
            assert!(!is_non_dimensional(key), "{key}");
        }
    }

    #[test]
    fn test_style_values() {
        assert_eq!(style_value("width", &PropValue::Int(10)), "10px");
        assert_eq!(style_value("opacity", &PropValue::Float(0.5)), "0.5");
        assert_eq!(style_value("--gap", &PropValue::Int(3)), "3");
        assert_eq!(style_value("width", &PropValue::str("50%")), "50%");
        assert_eq!(style_value("width", &PropValue::Null), "");
    }

    #[test]
    fn test_svg_attribute_names() {
        assert_eq!(svg_attribute_name("xlinkHref"), "href");
        assert_eq!(svg_attribute_name("xlink:href"), "href");
        assert_eq!(svg_attribute_name("className"), "class");
        assert_eq!(svg_attribute_name("viewBox"), "viewBox");
    }

    #[test]
    fn test_prop_identity() {
        assert!(PropValue::Int(1).same(&PropValue::Float(1.0)));
        assert!(PropValue::str("a").same(&PropValue::str("a")));
        assert!(!PropValue::Null.same(&PropValue::Bool(false)));

        let handler = EventHandler::new(|_| {});
        let a = PropValue::Handler(handler.clone());
        assert!(a.same(&PropValue::Handler(handler)));
        assert!(!a.same(&PropValue::handler(|_| {})));

        let style = StyleMap::new().set("color", "red");
        let shared = PropValue::from(style.clone());
        assert!(shared.same(&shared.clone()));
        assert!(!shared.same(&PropValue::from(style)));
    }

    #[test]
    fn test_attr_strings() {
        assert_eq!(PropValue::Float(3.0).to_attr_string().as_deref(), Some("3"));
        assert_eq!(PropValue::Bool(true).to_attr_string().as_deref(), Some("true"));
        assert_eq!(PropValue::Null.to_attr_string(), None);
        assert_eq!(PropValue::handler(|_| {}).to_attr_string(), None);
        let style = StyleMap::new().set("width", "1px").set("color", "red");
        assert_eq!(style.css_text(), "color: red; width: 1px");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-2.0), "-2");
    }

    #[test]
    fn test_shallow_equal_and_deps() {
        let a = Bag::new().with("x", 1).with("y", "s");
        assert!(shallow_equal(&a, &a.clone()));
        assert!(!shallow_equal(&a, &a.clone().with("z", true)));
        assert!(!shallow_equal(&a, &Bag::new().with("x", 2).with("y", "s")));

        let d1 = crate::deps![1, "a"];
        let d2 = crate::deps![1, "a"];
        assert!(!deps_changed(d1.as_ref(), d2.as_ref()));
        assert!(deps_changed(d1.as_ref(), crate::deps![1].as_ref()));
        assert!(deps_changed(None, d1.as_ref()));
        assert!(deps_changed(d1.as_ref(), None));
        assert!(!deps_changed(crate::deps![].as_ref(), crate::deps![].as_ref()));
    }

    #[test]
    fn test_create_element_lifts_key_and_ref() {
        let node_ref = NodeRef::new();
        let v = create_element(
            "li",
            Bag::new().with("key", 7).with("ref", node_ref.clone()).with("id", "x"),
            vec!["only".into()],
        );
        assert_eq!(v.key().map(Key::as_str), Some("7"));
        assert!(v.node_ref().is_some_and(|r| r.ptr_eq(&node_ref)));
        assert!(!v.props().contains("key"));
        assert!(!v.props().contains("ref"));
        assert!(matches!(v.props().children(), Some(Child::Text(t)) if &**t == "only"));

        let many = create_element("ul", Bag::new(), vec!["a".into(), "b".into()]);
        assert!(matches!(many.props().children(), Some(Child::List(l)) if l.len() == 2));
        assert!(create_element("br", Bag::new(), vec![]).props().children().is_none());
    }

    #[test]
    fn test_default_props_fill_missing() {
        let ty = named("Button").with_defaults(Bag::new().with("kind", "plain").with("size", 2));
        let v = create_element(&ty, Bag::new().with("kind", "primary"), vec![]);
        assert_eq!(v.props().str("kind"), Some("primary"));
        assert_eq!(v.props().int("size"), Some(2));
    }

    #[test]
    fn test_clone_element() {
        let original = create_element("a", Bag::new().with("key", "k").with("href", "/"), vec!["x".into()]);
        let copy = clone_element(&original, Bag::new().with("title", "t"), None);
        assert_eq!(copy.key().map(Key::as_str), Some("k"));
        assert_eq!(copy.props().str("href"), Some("/"));
        assert_eq!(copy.props().str("title"), Some("t"));
        assert!(copy.props().children().is_some());
        assert_ne!(copy.original(), original.original());

        let rekeyed = clone_element(&original, Bag::new().with("key", 3), Some(vec![]));
        assert_eq!(rekeyed.key().map(Key::as_str), Some("3"));
        assert!(matches!(rekeyed.props().children(), Some(Child::List(l)) if l.is_empty()));
    }

    #[test]
    fn test_children_helpers() {
        let list = Child::List(vec!["a".into(), Child::Empty, 3.into()]);
        assert_eq!(Children::count(Some(&list)), 3);
        assert_eq!(Children::count(None), 0);
        assert!(Children::only(Some(&list)).is_err());
        assert!(Children::only(Some(&Child::from("x"))).is_ok());
        let kinds = Children::map(Some(&list), |c| matches!(c, Child::Empty));
        assert_eq!(kinds, [false, true, false]);
    }

    #[test]
    fn test_component_identity() {
        struct Counter;
        impl crate::component::Component for Counter {
            fn create(_props: &Props) -> Self {
                Counter
            }
            fn render(
                &mut self,
                _cx: &mut crate::hooks::RenderCx<'_>,
                _props: &Props,
                _state: &crate::component::State,
            ) -> RenderResult {
                Ok(Child::Empty.into())
            }
        }

        let a = named("A");
        assert!(a.same(&a.clone().with_name("Renamed")));
        assert!(a.same(&a.clone().with_defaults(Bag::new().with("size", 1))));
        // same closure, separate components
        assert!(!a.same(&named("A")));
        assert!(!a.same(&named("B")));
        assert!(ComponentType::class::<Counter>().same(&ComponentType::class::<Counter>()));
        assert!(fragment_type().same(&fragment_type()));
        assert!(fragment_type().is_fragment());
    }

    #[test]
    fn test_dispose_runs_once() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let d = Dispose::new(move || c.set(c.get() + 1));
        let twin = d.clone();
        d.run();
        twin.run();
        assert_eq!(count.get(), 1);
        Dispose::none().run();
    }

    fn text_fiber(tree: &mut Tree<u32>, parent: NodeId, dom: u32) -> NodeId {
        let depth = tree[parent].depth + 1;
        let id = tree.insert(VNode::text(dom.to_string()), Some(parent), depth);
        tree[id].dom = Some(dom);
        id
    }

    #[test]
    fn test_dom_sibling_climbs_out_of_components() {
        let mut tree: Tree<u32> = Tree::new();
        let root = tree.insert(VNode::fragment(vec![]), None, 0);
        let inner = tree.insert(create_element(named("Inner"), Bag::new(), vec![]), Some(root), 1);
        let t1 = text_fiber(&mut tree, inner, 1);
        let t2 = text_fiber(&mut tree, root, 2);
        tree[inner].children = vec![Some(t1)];
        tree[inner].dom = Some(1);
        tree[root].children = vec![Some(inner), None, Some(t2)];

        assert_eq!(tree.dom_sibling(inner, None), Some(2));
        assert_eq!(tree.dom_sibling(t1, None), Some(2));
        assert_eq!(tree.dom_sibling(root, Some(0)), Some(1));
        assert_eq!(tree.dom_sibling(t2, None), None);
        assert_eq!(tree.host_nodes(root), vec![1, 2]);

        tree[t1].dom = Some(9);
        tree.update_parent_dom_pointers(t1);
        assert_eq!(tree[inner].dom, Some(9));
        assert_eq!(tree[root].dom, Some(9));
    }

    #[test]
    fn test_component_stack_and_outline() {
        let mut tree: Tree<u32> = Tree::new();
        let root = tree.insert(VNode::fragment(vec![]), None, 0);
        let app = tree.insert(create_element(named("App"), Bag::new(), vec![]), Some(root), 1);
        let div = tree.insert(create_element("div", Bag::new().with("key", "d"), vec![]), Some(app), 2);
        let leaf = tree.insert(create_element(named("Leaf"), Bag::new(), vec![]), Some(div), 3);
        tree[root].children = vec![Some(app)];
        tree[app].children = vec![Some(div)];
        tree[div].children = vec![Some(leaf)];

        assert_eq!(tree.component_stack(leaf), "Leaf\n  at App");
        insta::assert_snapshot!(tree.outline(root).trim_end(), @r"
        Fragment
          App
            <div key=d>
              Leaf
        ");
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_queue_drains_shallowest_first() {
        let queue = Rc::new(RenderQueue::default());
        let mut tree: Tree<u32> = Tree::new();
        let ty = named("Q");
        let props = Rc::new(Props::default());

        let mut mount = |depth: u32| {
            let c = Instance::mount(&ty, &props, queue.clone());
            let id = tree.insert(VNode::text(""), None, depth);
            c.attach(id, depth);
            c.dirty.set(false);
            c
        };
        let deep = mount(3);
        let shallow = mount(1);
        let mid = mount(2);
        let late = mount(0);

        for c in [&deep, &shallow, &mid] {
            queue.enqueue(c);
        }
        queue.enqueue(&mid);
        assert_eq!(queue.len(), 3);

        let order = RefCell::new(Vec::new());
        queue
            .drain(|c| {
                order.borrow_mut().push(c.depth());
                c.dirty.set(false);
                if c.depth() == 1 {
                    queue.enqueue(&late);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(*order.borrow(), [1, 0, 2, 3]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_queue_keeps_enqueue_order_within_depth() {
        let queue = Rc::new(RenderQueue::default());
        let mut tree: Tree<u32> = Tree::new();
        let props = Rc::new(Props::default());

        let mut mount = |name: &'static str, depth: u32| {
            let c = Instance::mount(&named(name), &props, queue.clone());
            let id = tree.insert(VNode::text(""), None, depth);
            c.attach(id, depth);
            c.dirty.set(false);
            c
        };
        let siblings: Vec<_> = ["a", "b", "c", "d"].into_iter().map(|n| mount(n, 2)).collect();
        let late = mount("e", 2);
        let parent = mount("p", 1);

        for c in siblings.iter().chain([&parent]) {
            queue.enqueue(c);
        }
        let order = RefCell::new(Vec::new());
        queue
            .drain(|c| {
                order.borrow_mut().push(c.name());
                c.dirty.set(false);
                if c.name() == "b" {
                    queue.enqueue(&late);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(*order.borrow(), ["p", "a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_batches_hold_flush_requests() {
        let queue = RenderQueue::default();
        let requests = Rc::new(Cell::new(0));
        let r = requests.clone();
        queue.set_requesters(Rc::new(move || r.set(r.get() + 1)), Rc::new(|| {}));

        let ty = named("B");
        let props = Rc::new(Props::default());
        let mut tree: Tree<u32> = Tree::new();
        let queue = Rc::new(queue);
        let c = Instance::mount(&ty, &props, queue.clone());
        c.attach(tree.insert(VNode::text(""), None, 0), 0);
        c.dirty.set(false);

        let outer = queue.batch();
        let inner = queue.batch();
        queue.enqueue(&c);
        assert!(!inner.close());
        assert_eq!(requests.get(), 0);
        assert!(outer.close());
        assert_eq!(queue.len(), 1);

        c.dirty.set(false);
        queue.enqueue(&c);
        assert_eq!(requests.get(), 1);

        queue
            .drain(|c| {
                c.dirty.set(false);
                Ok(())
            })
            .unwrap();
        drop(queue.batch());
        queue.enqueue(&c);
        assert_eq!(requests.get(), 2);
    }
}
