//! Node model: the immutable per-render description of desired output.
//!
//! Nodes are cheap handles (`Rc` inside) so render functions can hand the same
//! subtree back across renders. A node carries an identity counter; cloning a
//! node keeps it, building a new one allocates a fresh one. Reconciliation
//! treats an unchanged counter as "same output, skip".

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::component::Component;
use crate::context::ContextId;
use crate::error::ComponentError;
use crate::hooks::RenderCx;
use crate::refs::NodeRef;
use crate::suspense::Pending;
use crate::value::{Bag, PropValue, format_number};

thread_local! {
    static NEXT_ORIGINAL: Cell<u64> = const { Cell::new(1) };
    static NEXT_UNIQUE: Cell<u64> = const { Cell::new(1) };
    static FRAGMENT: ComponentType = ComponentType::builtin("Fragment", ComponentKind::Fragment);
}

fn next_original() -> u64 {
    NEXT_ORIGINAL.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    })
}

pub(crate) fn next_unique() -> u64 {
    NEXT_UNIQUE.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    })
}

/// Stable key used for child matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(Rc::from(s))
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key(Rc::from(i.to_string()))
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key(Rc::from(i.to_string()))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key(Rc::from(i.to_string()))
    }
}

/// Output of a render function.
pub enum Rendered {
    Ready(Child),
    /// Suspend until the handle resolves; the nearest fallback boundary shows
    /// its fallback meanwhile.
    Pending(Pending),
}

pub type RenderResult = Result<Rendered, ComponentError>;

macro_rules! rendered_from {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Rendered {
            fn from(c: $t) -> Self {
                Rendered::Ready(c.into())
            }
        })*
    };
}

rendered_from!(Child, VNode, Option<VNode>, &str, String, Vec<Child>, Vec<VNode>);

pub(crate) type FunctionBody = Rc<dyn Fn(&mut RenderCx<'_>, &Props) -> RenderResult>;
pub(crate) type ForwardBody = Rc<dyn Fn(&mut RenderCx<'_>, &Props, Option<NodeRef>) -> RenderResult>;
pub(crate) type ClassFactory = Rc<dyn Fn(&Props) -> Box<dyn Component>>;

#[derive(Clone)]
pub(crate) enum ComponentKind {
    Function(FunctionBody),
    /// Function that receives the node's ref instead of having it attached.
    Forward(ForwardBody),
    Class(ClassFactory),
    Fragment,
    Provider(ContextId),
    Portal {
        container: Rc<dyn Any>,
        same_container: fn(&dyn Any, &dyn Any) -> bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Identity {
    Type(TypeId),
    Unique(u64),
}

pub(crate) struct ComponentDef {
    identity: Identity,
    name: Cow<'static, str>,
    pub(crate) kind: ComponentKind,
    default_props: Option<Bag>,
}

/// Opaque component reference used as a node tag.
///
/// Every `function`/`forward_ref` call makes a new component; clones and
/// `with_name`/`with_defaults` derivatives keep its identity. Build a type
/// once and reuse it: a type built inside a render is a different component
/// each time and remounts on every pass. `class::<C>()` is identified by `C`.
#[derive(Clone)]
pub struct ComponentType(Rc<ComponentDef>);

impl ComponentType {
    /// A plain function component.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>, &Props) -> RenderResult + 'static,
    {
        ComponentType(Rc::new(ComponentDef {
            identity: Identity::Unique(next_unique()),
            name: Cow::Borrowed(short_type_name::<F>()),
            kind: ComponentKind::Function(Rc::new(f)),
            default_props: None,
        }))
    }

    /// A class-like component, constructed once per mounted position.
    pub fn class<C: Component>() -> Self {
        ComponentType(Rc::new(ComponentDef {
            identity: Identity::Type(TypeId::of::<C>()),
            name: Cow::Borrowed(short_type_name::<C>()),
            kind: ComponentKind::Class(Rc::new(|props| Box::new(C::create(props)))),
            default_props: None,
        }))
    }

    /// A component whose `ref` is handed to the render function instead of
    /// being bound to an instance.
    pub fn forward_ref<F>(f: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>, &Props, Option<NodeRef>) -> RenderResult + 'static,
    {
        ComponentType(Rc::new(ComponentDef {
            identity: Identity::Unique(next_unique()),
            name: Cow::Owned(format!("ForwardRef({})", short_type_name::<F>())),
            kind: ComponentKind::Forward(Rc::new(f)),
            default_props: None,
        }))
    }

    /// Component type with its own identity (memo, lazy, contexts).
    pub(crate) fn unique(name: impl Into<Cow<'static, str>>, kind: ComponentKind) -> Self {
        ComponentType(Rc::new(ComponentDef {
            identity: Identity::Unique(next_unique()),
            name: name.into(),
            kind,
            default_props: None,
        }))
    }

    /// Component type whose identity is the Rust type `T`.
    pub(crate) fn of_type<T: 'static>(name: impl Into<Cow<'static, str>>, kind: ComponentKind) -> Self {
        ComponentType(Rc::new(ComponentDef {
            identity: Identity::Type(TypeId::of::<T>()),
            name: name.into(),
            kind,
            default_props: None,
        }))
    }

    fn builtin(name: &'static str, kind: ComponentKind) -> Self {
        Self::unique(name, kind)
    }

    pub fn with_name(self, name: impl Into<Cow<'static, str>>) -> Self {
        let def = &self.0;
        ComponentType(Rc::new(ComponentDef {
            identity: def.identity,
            name: name.into(),
            kind: def.kind.clone(),
            default_props: def.default_props.clone(),
        }))
    }

    /// Values filled into any prop the caller leaves out.
    pub fn with_defaults(self, defaults: Bag) -> Self {
        let def = &self.0;
        ComponentType(Rc::new(ComponentDef {
            identity: def.identity,
            name: def.name.clone(),
            kind: def.kind.clone(),
            default_props: Some(defaults),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub(crate) fn kind(&self) -> &ComponentKind {
        &self.0.kind
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.0.kind, ComponentKind::Fragment)
    }

    pub(crate) fn is_portal(&self) -> bool {
        matches!(self.0.kind, ComponentKind::Portal { .. })
    }

    pub(crate) fn is_forward(&self) -> bool {
        matches!(self.0.kind, ComponentKind::Forward(_))
    }

    pub fn same(&self, other: &ComponentType) -> bool {
        if self.0.identity != other.0.identity {
            return false;
        }
        match (&self.0.kind, &other.0.kind) {
            (
                ComponentKind::Portal {
                    container: a,
                    same_container,
                },
                ComponentKind::Portal { container: b, .. },
            ) => same_container(a.as_ref(), b.as_ref()),
            _ => true,
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    let head = head.trim_end_matches("::{{closure}}");
    head.rsplit("::").next().unwrap_or(head)
}

pub fn fragment_type() -> ComponentType {
    FRAGMENT.with(|f| f.clone())
}

/// Tag of a node.
#[derive(Clone)]
pub enum NodeType {
    Text(Rc<str>),
    Element(Rc<str>),
    Component(ComponentType),
}

impl NodeType {
    pub fn same(&self, other: &NodeType) -> bool {
        match (self, other) {
            (NodeType::Text(_), NodeType::Text(_)) => true,
            (NodeType::Element(a), NodeType::Element(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => a.same(b),
            _ => false,
        }
    }

    pub fn component(&self) -> Option<&ComponentType> {
        match self {
            NodeType::Component(c) => Some(c),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            NodeType::Element(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Text(t) => write!(f, "#text({t:?})"),
            NodeType::Element(t) => write!(f, "<{t}>"),
            NodeType::Component(c) => c.fmt(f),
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Element(Rc::from(tag))
    }
}

impl From<ComponentType> for NodeType {
    fn from(c: ComponentType) -> Self {
        NodeType::Component(c)
    }
}

impl From<&ComponentType> for NodeType {
    fn from(c: &ComponentType) -> Self {
        NodeType::Component(c.clone())
    }
}

/// Normalised property bag: everything but `key`/`ref`, plus `children`.
#[derive(Clone, Default)]
pub struct Props {
    pub(crate) attrs: Bag,
    pub(crate) children: Option<Child>,
}

impl Props {
    pub fn new(attrs: Bag, children: Option<Child>) -> Self {
        Self { attrs, children }
    }

    pub fn attrs(&self) -> &Bag {
        &self.attrs
    }

    pub fn children(&self) -> Option<&Child> {
        self.children.as_ref()
    }

    /// Children as render output, `Empty` when there are none.
    pub fn children_or_empty(&self) -> Child {
        self.children.clone().unwrap_or_default()
    }
}

impl Deref for Props {
    type Target = Bag;

    fn deref(&self) -> &Bag {
        &self.attrs
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.attrs.fmt(f)
    }
}

pub(crate) struct VNodeData {
    pub(crate) ty: NodeType,
    pub(crate) props: Rc<Props>,
    pub(crate) key: Option<Key>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) original: u64,
}

#[derive(Clone)]
pub struct VNode(pub(crate) Rc<VNodeData>);

impl VNode {
    pub(crate) fn from_parts(
        ty: NodeType,
        props: Rc<Props>,
        key: Option<Key>,
        node_ref: Option<NodeRef>,
    ) -> Self {
        VNode(Rc::new(VNodeData {
            ty,
            props,
            key,
            node_ref,
            original: next_original(),
        }))
    }

    pub fn text(s: impl AsRef<str>) -> Self {
        Self::from_parts(
            NodeType::Text(Rc::from(s.as_ref())),
            Rc::new(Props::default()),
            None,
            None,
        )
    }

    pub fn fragment(children: Vec<Child>) -> Self {
        Self::from_parts(
            NodeType::Component(fragment_type()),
            Rc::new(Props::new(Bag::new(), Some(Child::List(children)))),
            None,
            None,
        )
    }

    pub fn ty(&self) -> &NodeType {
        &self.0.ty
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.0.props
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.0.node_ref.as_ref()
    }

    /// Identity counter; equal counters mean identical render output.
    pub fn original(&self) -> u64 {
        self.0.original
    }

    pub fn with_key(self, key: impl Into<Key>) -> Self {
        let d = &self.0;
        VNode::from_parts(d.ty.clone(), d.props.clone(), Some(key.into()), d.node_ref.clone())
    }

    pub fn with_ref(self, node_ref: NodeRef) -> Self {
        let d = &self.0;
        VNode::from_parts(d.ty.clone(), d.props.clone(), d.key.clone(), Some(node_ref))
    }

    pub(crate) fn text_content(&self) -> Option<&str> {
        match &self.0.ty {
            NodeType::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("VNode");
        d.field("type", &self.0.ty);
        if let Some(k) = &self.0.key {
            d.field("key", &k.as_str());
        }
        d.field("props", &self.0.props).finish()
    }
}

/// Raw render output before normalisation.
#[derive(Clone, Default)]
pub enum Child {
    /// `null`/booleans: an empty slot.
    #[default]
    Empty,
    Text(Rc<str>),
    Number(f64),
    Node(VNode),
    List(Vec<Child>),
}

impl Child {
    /// Turns a raw child into a node. Empty slots stay `None`.
    pub(crate) fn into_vnode(self) -> Option<VNode> {
        match self {
            Child::Empty => None,
            Child::Text(t) => Some(VNode::text(t)),
            Child::Number(n) => Some(VNode::text(format_number(n))),
            Child::Node(v) => Some(v),
            Child::List(children) => Some(VNode::fragment(children)),
        }
    }

    /// Render output as a child list: lists flatten one level, anything else
    /// becomes a single slot.
    pub(crate) fn into_list(self) -> Vec<Child> {
        match self {
            Child::List(v) => v,
            other => vec![other],
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Empty => write!(f, "Empty"),
            Child::Text(t) => write!(f, "{t:?}"),
            Child::Number(n) => write!(f, "{}", format_number(*n)),
            Child::Node(v) => v.fmt(f),
            Child::List(l) => f.debug_list().entries(l).finish(),
        }
    }
}

impl From<VNode> for Child {
    fn from(v: VNode) -> Self {
        Child::Node(v)
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Text(Rc::from(s))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Text(Rc::from(s))
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<i32> for Child {
    fn from(n: i32) -> Self {
        Child::Number(n as f64)
    }
}

impl From<i64> for Child {
    fn from(n: i64) -> Self {
        Child::Number(n as f64)
    }
}

impl From<usize> for Child {
    fn from(n: usize) -> Self {
        Child::Number(n as f64)
    }
}

impl From<f64> for Child {
    fn from(n: f64) -> Self {
        Child::Number(n)
    }
}

impl From<Vec<Child>> for Child {
    fn from(v: Vec<Child>) -> Self {
        Child::List(v)
    }
}

impl From<Vec<VNode>> for Child {
    fn from(v: Vec<VNode>) -> Self {
        Child::List(v.into_iter().map(Child::Node).collect())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Child::Empty)
    }
}

/// Element construction. `key` and `ref` entries are lifted out of `props`;
/// positional children collapse into one `children` value (the child itself
/// when there is exactly one, a list otherwise); a component's default props
/// fill anything omitted.
pub fn create_element(ty: impl Into<NodeType>, mut props: Bag, children: Vec<Child>) -> VNode {
    let ty = ty.into();
    let key = props.remove("key").and_then(|k| match k {
        PropValue::Str(s) => Some(Key(s)),
        PropValue::Int(i) => Some(Key::from(i)),
        PropValue::Float(f) => Some(Key::from(format_number(f))),
        _ => None,
    });
    let node_ref = match props.remove("ref") {
        Some(PropValue::Ref(r)) => Some(r),
        _ => None,
    };

    let children = match children.len() {
        0 => None,
        1 => children.into_iter().next(),
        _ => Some(Child::List(children)),
    };

    if let NodeType::Component(c) = &ty
        && let Some(defaults) = &c.0.default_props
    {
        for (name, value) in defaults.iter() {
            if !props.contains(name) {
                props.insert(name, value.clone());
            }
        }
    }

    VNode::from_parts(ty, Rc::new(Props::new(props, children)), key, node_ref)
}

/// Short alias for [`create_element`].
pub fn h(ty: impl Into<NodeType>, props: Bag, children: Vec<Child>) -> VNode {
    create_element(ty, props, children)
}

/// Copy of `vnode` with `props` merged over its own. `key`/`ref` in `props`
/// replace the originals; `children`, when given, replace the old ones.
pub fn clone_element(vnode: &VNode, mut props: Bag, children: Option<Vec<Child>>) -> VNode {
    let d = &vnode.0;
    let key = match props.remove("key") {
        Some(PropValue::Str(s)) => Some(Key(s)),
        Some(PropValue::Int(i)) => Some(Key::from(i)),
        _ => d.key.clone(),
    };
    let node_ref = match props.remove("ref") {
        Some(PropValue::Ref(r)) => Some(r),
        _ => d.node_ref.clone(),
    };
    let mut attrs = d.props.attrs.clone();
    attrs.merge(&props);
    let children = match children {
        Some(c) if c.len() == 1 => c.into_iter().next(),
        Some(c) => Some(Child::List(c)),
        None => d.props.children.clone(),
    };
    VNode::from_parts(d.ty.clone(), Rc::new(Props::new(attrs, children)), key, node_ref)
}

/// Helpers over a `children` value.
pub struct Children;

impl Children {
    pub fn to_array(children: Option<&Child>) -> Vec<Child> {
        match children {
            None | Some(Child::Empty) => Vec::new(),
            Some(Child::List(v)) => v.clone(),
            Some(c) => vec![c.clone()],
        }
    }

    pub fn count(children: Option<&Child>) -> usize {
        Self::to_array(children).len()
    }

    pub fn only(children: Option<&Child>) -> Result<Child, ComponentError> {
        let mut all = Self::to_array(children);
        if all.len() != 1 {
            return Err(ComponentError::msg("Children::only expects exactly one child"));
        }
        Ok(all.remove(0))
    }

    pub fn map<T>(children: Option<&Child>, f: impl FnMut(Child) -> T) -> Vec<T> {
        Self::to_array(children).into_iter().map(f).collect()
    }
}
