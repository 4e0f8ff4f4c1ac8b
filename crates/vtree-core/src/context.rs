//! Context: values published by a provider to every descendant that reads
//! them, without threading props.

use std::collections::HashMap;
use std::rc::Rc;

use crate::component::Instance;
use crate::hooks::RenderCx;
use crate::node::{
    Child, ComponentKind, ComponentType, Props, RenderResult, VNode, create_element, next_unique,
};
use crate::value::{Bag, PropValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

type ConsumerFn<T> = Box<dyn Fn(Rc<T>) -> Child>;

pub struct Context<T: 'static> {
    id: ContextId,
    default: Rc<T>,
    provider: ComponentType,
    consumer: ComponentType,
}

impl<T: 'static> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
            provider: self.provider.clone(),
            consumer: self.consumer.clone(),
        }
    }
}

pub fn create_context<T: 'static>(default: T) -> Context<T> {
    let id = ContextId(next_unique());
    let default = Rc::new(default);
    let provider = ComponentType::unique("Provider", ComponentKind::Provider(id));

    let consumer_default = default.clone();
    let consumer = ComponentType::unique(
        "Consumer",
        ComponentKind::Function(Rc::new(move |cx: &mut RenderCx<'_>, props: &Props| -> RenderResult {
            let value = cx.read_context(id, &consumer_default);
            let out = props
                .get("render")
                .and_then(|r| r.downcast::<ConsumerFn<T>>())
                .map(|render| render(value))
                .unwrap_or_default();
            Ok(out.into())
        })),
    );

    Context {
        id,
        default,
        provider,
        consumer,
    }
}

impl<T: 'static> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn default_value(&self) -> Rc<T> {
        self.default.clone()
    }

    /// Publishes `value` to `children`. Consumers re-render when a later
    /// provider render carries a different `Rc`.
    pub fn provider(&self, value: Rc<T>, children: Vec<Child>) -> VNode {
        create_element(
            &self.provider,
            Bag::new().with("value", PropValue::opaque(value)),
            children,
        )
    }

    /// Render-prop reader.
    pub fn consumer(&self, render: impl Fn(Rc<T>) -> Child + 'static) -> VNode {
        let render: ConsumerFn<T> = Box::new(render);
        create_element(
            &self.consumer,
            Bag::new().with("render", PropValue::opaque(Rc::new(render))),
            vec![],
        )
    }
}

/// Providers visible at a point in the tree.
#[derive(Clone, Default)]
pub(crate) struct ContextMap(Rc<HashMap<ContextId, Rc<Instance>>>);

impl ContextMap {
    pub(crate) fn get(&self, id: ContextId) -> Option<&Rc<Instance>> {
        self.0.get(&id)
    }

    pub(crate) fn with(&self, id: ContextId, provider: Rc<Instance>) -> ContextMap {
        let mut map = (*self.0).clone();
        map.insert(id, provider);
        ContextMap(Rc::new(map))
    }
}

/// Current value of a provider instance.
pub(crate) fn provided_value<T: 'static>(provider: &Instance) -> Option<Rc<T>> {
    provider
        .props()
        .get("value")
        .and_then(|v| v.downcast::<T>())
}
