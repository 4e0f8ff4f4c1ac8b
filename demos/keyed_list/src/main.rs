use std::rc::Rc;

use anyhow::Context as _;
use vtree_core::prelude::*;
use vtree_devtools::Inspector;
use vtree_host::MemoryHost;

#[derive(Clone, PartialEq)]
struct Todo {
    id: usize,
    title: String,
    completed: bool,
}

fn row() -> ComponentType {
    let body = ComponentType::function(|_cx, props| {
        let mark = if props.bool("completed") == Some(true) { "✓" } else { "○" };
        Ok(h(
            "li",
            Bag::new().with("className", mark),
            vec![props.str("title").unwrap_or_default().into()],
        )
        .into())
    })
    .with_name("Row");
    memo(body, None)
}

fn app(row: ComponentType) -> ComponentType {
    ComponentType::function(move |cx, _props| {
        let (todos, set_todos) = cx.use_state(|| {
            (0..8)
                .map(|i| Todo {
                    id: i,
                    title: format!("Task #{}", i + 1),
                    completed: i % 3 == 0,
                })
                .collect::<Vec<_>>()
        });

        let rotate = PropValue::handler(move |_| {
            set_todos.update(|list| {
                let mut next = list.clone();
                next.rotate_left(1);
                next
            })
        });

        let items = todos
            .iter()
            .map(|t| {
                Child::from(h(
                    &row,
                    Bag::new()
                        .with("key", t.id)
                        .with("title", t.title.as_str())
                        .with("completed", t.completed),
                    vec![],
                ))
            })
            .collect();

        Ok(h(
            "section",
            Bag::new(),
            vec![
                h("button", Bag::new().with("onClick", rotate), vec!["rotate".into()]).into(),
                h("ul", Bag::new(), items).into(),
            ],
        )
        .into())
    })
    .with_name("App")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    log::info!("Starting keyed list demo");

    let inspector = Rc::new(Inspector::new());
    let renderer = Renderer::with_options(MemoryHost::new(), Options::new().observer(inspector.clone()));
    let root = renderer.host_mut().create_container();

    renderer.render(h(app(row()), Bag::new(), vec![]), &root)?;
    renderer.host_mut().clear_ops();

    let button = renderer
        .host()
        .find(root, "button")
        .context("no button rendered")?;
    for _ in 0..3 {
        renderer.dispatch_event(&button, &Event::new("click"));
        renderer.settle()?;
    }

    {
        let host = renderer.host();
        log::info!(
            "3 rotations: {} nodes created, {} moved",
            host.created(),
            host.moves()
        );
        println!("{}", host.inner_html(root));
    }
    println!("{}", renderer.describe(&root));
    println!("{}", inspector.summary());
    for (name, count) in inspector.hottest(3) {
        println!("{name}: {count}");
    }
    Ok(())
}
