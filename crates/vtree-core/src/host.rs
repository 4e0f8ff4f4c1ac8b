use std::fmt::Debug;
use std::hash::Hash;

use crate::value::PropValue;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// The mutable output tree the reconciler patches.
///
/// Nodes are cheap handles. A handle stays valid after the node is detached;
/// `remove` on a detached node is a no-op.
pub trait HostTree: 'static {
    type Node: Clone + Eq + Hash + Debug + 'static;

    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn create_element_ns(&mut self, namespace: &str, tag: &str) -> Self::Node;
    fn create_text(&mut self, text: &str) -> Self::Node;

    fn set_text(&mut self, node: &Self::Node, text: &str);
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// `None` for text nodes.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn is_svg(&self, _node: &Self::Node) -> bool {
        false
    }

    /// Writes a live property; `PropValue::Null` resets it.
    fn set_property(&mut self, node: &Self::Node, name: &str, value: &PropValue);
    fn property(&self, node: &Self::Node, name: &str) -> Option<PropValue>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    /// An empty `value` clears the declaration.
    fn set_style(&mut self, node: &Self::Node, key: &str, value: &str);
    fn set_style_text(&mut self, node: &Self::Node, css: &str);

    /// Registers interest in `event`; the host forwards occurrences to
    /// `Renderer::dispatch_event`.
    fn add_listener(&mut self, node: &Self::Node, event: &str, capture: bool);
    fn remove_listener(&mut self, node: &Self::Node, event: &str, capture: bool);

    /// Moves `child` under `parent` before `before`, appending when `None`.
    fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, before: Option<&Self::Node>);
    fn remove(&mut self, node: &Self::Node);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
}
