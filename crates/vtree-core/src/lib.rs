//! # Nodes, Components, and Reconciliation
//!
//! vtree keeps a host tree (anything implementing [`HostTree`]) in sync with
//! a description rebuilt on every render. There are three main pieces:
//!
//! - [`VNode`]: immutable description of desired output.
//! - Components: functions taking a [`RenderCx`] (hooks) or types
//!   implementing [`Component`] (lifecycle methods, property-bag state).
//! - [`Renderer`]: owns the host and the rendered tree, diffs new output
//!   against the old one and patches only what changed.
//!
//! ## Rendering
//!
//! ```rust,ignore
//! use vtree_core::prelude::*;
//!
//! let counter = ComponentType::function(|cx, props| {
//!     let (count, set_count) = cx.use_state(|| props.int("start").unwrap_or(0));
//!     let on_click = PropValue::handler(move |_| set_count.update(|c| c + 1));
//!     Ok(h("button", Bag::new().with("onClick", on_click), vec![(*count).into()]).into())
//! });
//!
//! let renderer = Renderer::new(host);
//! renderer.render(h(&counter, Bag::new().with("start", 1), vec![]), &container)?;
//! ```
//!
//! Rendering the same tree again only touches what differs. Returning the very
//! same node (cloned `VNode`) skips the subtree entirely.
//!
//! ## State updates
//!
//! Setters never render synchronously. They mark the instance dirty and ask
//! for a flush through [`Options::debounce_rendering`], else
//! [`Options::request_animation_frame`], else the renderer's own microtask
//! queue ([`Renderer::run_microtasks`]).
//! [`Renderer::settle`] drains everything: microtasks, flushes, passive
//! effects.
//!
//! - Hooks are order-based: the Nth hook call of a render refers to the Nth
//!   slot. A slot of the wrong kind is replaced with a warning.
//! - `use_effect` runs after paint; `use_layout_effect` runs during commit.
//!   Cleanups run before the next body and on unmount.
//!
//! ## Errors
//!
//! Render functions return `Result<Rendered, ComponentError>`. Failures and
//! suspensions travel up to the nearest boundary (`did_catch`,
//! `derive_state_from_error`, [`RenderCx::use_error_boundary`], [`suspense`]).
//! Whatever no boundary takes comes back as a [`RenderError`].

pub mod bindings;
mod catch;
mod commit;
pub mod component;
pub mod context;
mod diff;
pub mod effects;
pub mod error;
pub mod hooks;
pub mod host;
pub mod node;
pub mod options;
mod patch;
pub mod prelude;
pub mod refs;
pub mod root;
mod scheduler;
pub mod suspense;
pub mod tests;
mod tree;
mod unmount;
pub mod value;

pub use bindings::{PropertyTable, is_non_dimensional};
pub use component::{Component, State, Updater, memo};
pub use context::{Context, ContextId, create_context};
pub use effects::{Dispose, on_unmount};
pub use error::{ComponentError, ErrorInfo, RenderError, Thrown};
pub use hooks::{Dispatch, RenderCx, SetState, StartTransition, StateAction};
pub use host::{HostTree, SVG_NAMESPACE};
pub use node::{
    Child, Children, ComponentType, Key, NodeType, Props, RenderResult, Rendered, VNode,
    clone_element, create_element, fragment_type, h,
};
pub use options::{Options, RenderObserver, Schedule};
pub use refs::{NodeRef, RefValue, create_ref};
pub use root::{Renderer, create_portal};
pub use scheduler::Task;
pub use suspense::{LazyResolver, Pending, lazy, suspense};
pub use tree::NodeId;
pub use value::{Bag, Deps, Event, EventHandler, PropValue, StyleMap, deps_changed, shallow_equal};
