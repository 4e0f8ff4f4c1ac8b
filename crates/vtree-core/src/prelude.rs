pub use crate::component::{Component, State, Updater, memo};
pub use crate::context::{Context, create_context};
pub use crate::deps;
pub use crate::effects::{Dispose, on_unmount};
pub use crate::error::{ComponentError, ErrorInfo, RenderError, Thrown};
pub use crate::hooks::{Dispatch, RenderCx, SetState};
pub use crate::host::HostTree;
pub use crate::node::{
    Child, Children, ComponentType, Props, RenderResult, Rendered, VNode, clone_element,
    create_element, fragment_type, h,
};
pub use crate::options::{Options, RenderObserver};
pub use crate::refs::{NodeRef, RefValue, create_ref};
pub use crate::root::{Renderer, create_portal};
pub use crate::suspense::{Pending, lazy, suspense};
pub use crate::value::{Bag, Event, PropValue, StyleMap};
