use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::Updater;
use crate::error::ComponentError;

/// What a ref points at once attached.
#[derive(Clone)]
pub enum RefValue {
    /// A host node, type-erased. Recover it with [`RefValue::host`].
    Host(Rc<dyn Any>),
    /// A class-like component instance.
    Component(Updater),
    /// Anything exposed through `use_imperative_handle`.
    Custom(Rc<dyn Any>),
}

impl RefValue {
    pub fn host<N: Clone + 'static>(&self) -> Option<N> {
        match self {
            RefValue::Host(h) => h.downcast_ref::<N>().cloned(),
            _ => None,
        }
    }

    pub fn custom<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            RefValue::Custom(v) => v.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefValue::Host(_) => write!(f, "Host"),
            RefValue::Component(_) => write!(f, "Component"),
            RefValue::Custom(_) => write!(f, "Custom"),
        }
    }
}

type RefCallback = Box<dyn Fn(Option<RefValue>) -> Result<(), ComponentError>>;

enum RefTarget {
    Object(RefCell<Option<RefValue>>),
    Callback(RefCallback),
}

/// Function-or-box ref handle attached to a node.
#[derive(Clone)]
pub struct NodeRef(Rc<RefTarget>);

impl NodeRef {
    /// A box ref, `current` starts empty.
    pub fn new() -> Self {
        NodeRef(Rc::new(RefTarget::Object(RefCell::new(None))))
    }

    pub fn callback(f: impl Fn(Option<RefValue>) -> Result<(), ComponentError> + 'static) -> Self {
        NodeRef(Rc::new(RefTarget::Callback(Box::new(f))))
    }

    /// Always `None` for callback refs.
    pub fn current(&self) -> Option<RefValue> {
        match &*self.0 {
            RefTarget::Object(cell) => cell.borrow().clone(),
            RefTarget::Callback(_) => None,
        }
    }

    pub fn host<N: Clone + 'static>(&self) -> Option<N> {
        self.current().and_then(|v| v.host::<N>())
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn assign(&self, value: Option<RefValue>) -> Result<(), ComponentError> {
        match &*self.0 {
            RefTarget::Object(cell) => {
                *cell.borrow_mut() = value;
                Ok(())
            }
            RefTarget::Callback(f) => f(value),
        }
    }

    /// Whether detaching on unmount is ours to do: the box is empty or still
    /// points at `dom`. Callback refs are always detached.
    pub(crate) fn detachable_from<N: PartialEq + 'static>(&self, dom: Option<&N>) -> bool {
        match &*self.0 {
            RefTarget::Callback(_) => true,
            RefTarget::Object(cell) => match &*cell.borrow() {
                None => true,
                Some(RefValue::Host(h)) => h.downcast_ref::<N>() == dom,
                Some(_) => false,
            },
        }
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_ref() -> NodeRef {
    NodeRef::new()
}
