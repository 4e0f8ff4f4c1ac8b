//! Dynamic property values.
//!
//! Property bags, state bags and hook dependency lists all hold `PropValue`s.
//! Equality between values follows reference semantics for anything
//! heap-allocated (handlers, style maps, refs, opaque payloads) and value
//! semantics for scalars and strings.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::refs::NodeRef;

#[derive(Clone, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Style(Rc<StyleMap>),
    Handler(EventHandler),
    Ref(NodeRef),
    Opaque(Rc<dyn Any>),
}

impl PropValue {
    pub fn str(s: impl AsRef<str>) -> Self {
        PropValue::Str(Rc::from(s.as_ref()))
    }

    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        PropValue::Handler(EventHandler::new(f))
    }

    pub fn opaque<T: Any>(value: Rc<T>) -> Self {
        PropValue::Opaque(value)
    }

    /// Identity of an `Rc`, usable as a dependency.
    pub fn ptr<T: Any>(value: &Rc<T>) -> Self {
        PropValue::Opaque(value.clone())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, PropValue::Handler(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            PropValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(i) => Some(*i as f64),
            PropValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Opaque(v) => v.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Strict identity: the comparison used for props, state and deps.
    pub fn same(&self, other: &PropValue) -> bool {
        use PropValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (Style(a), Style(b)) => Rc::ptr_eq(a, b),
            (Handler(a), Handler(b)) => a.ptr_eq(b),
            (Ref(a), Ref(b)) => a.ptr_eq(b),
            (Opaque(a), Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Serialised attribute text. Handlers, refs and opaque payloads have none.
    pub fn to_attr_string(&self) -> Option<String> {
        match self {
            PropValue::Null => None,
            PropValue::Bool(b) => Some(b.to_string()),
            PropValue::Int(i) => Some(i.to_string()),
            PropValue::Float(f) => Some(format_number(*f)),
            PropValue::Str(s) => Some(s.to_string()),
            PropValue::Style(s) => Some(s.css_text()),
            PropValue::Handler(_) | PropValue::Ref(_) | PropValue::Opaque(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{}", format_number(*x)),
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::Style(s) => write!(f, "style({})", s.css_text()),
            PropValue::Handler(_) => write!(f, "<handler>"),
            PropValue::Ref(_) => write!(f, "<ref>"),
            PropValue::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

/// Integral floats print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

macro_rules! prop_from {
    ($($t:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(impl From<$t> for PropValue {
            fn from(v: $t) -> Self {
                PropValue::$variant(v as $conv)
            }
        })*
    };
}

prop_from! {
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Int as i64,
    usize => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(Rc::from(v))
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(Rc::from(v))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(v: Rc<str>) -> Self {
        PropValue::Str(v)
    }
}

impl From<StyleMap> for PropValue {
    fn from(v: StyleMap) -> Self {
        PropValue::Style(Rc::new(v))
    }
}

impl From<EventHandler> for PropValue {
    fn from(v: EventHandler) -> Self {
        PropValue::Handler(v)
    }
}

impl From<NodeRef> for PropValue {
    fn from(v: NodeRef) -> Self {
        PropValue::Ref(v)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PropValue::Null)
    }
}

/// Ordered name → value map. Used for element/component props and for class
/// component state.
#[derive(Clone, Default, PartialEq)]
pub struct Bag {
    entries: BTreeMap<String, PropValue>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow merge: every entry of `other` overwrites ours.
    pub fn merge(&mut self, other: &Bag) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Bag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Bag {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Shallow equality of two bags: same key set, pairwise `same` values.
pub fn shallow_equal(a: &Bag, b: &Bag) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| v.same(other)))
}

/// CSS-like style object; values are strings or numbers.
#[derive(Clone, Default, PartialEq)]
pub struct StyleMap {
    entries: BTreeMap<String, PropValue>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn css_text(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.to_attr_string().map(|v| format!("{k}: {v}")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Host event as delivered to handlers.
#[derive(Clone, Debug, Default)]
pub struct Event {
    pub name: String,
    pub value: PropValue,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropValue::Null,
        }
    }

    pub fn with_value(mut self, value: impl Into<PropValue>) -> Self {
        self.value = value.into();
        self
    }
}

#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Hook dependency list.
pub type Deps = SmallVec<[PropValue; 4]>;

/// Builds `Some(Deps)` for effect/memo hooks. `deps![]` runs once.
#[macro_export]
macro_rules! deps {
    () => {
        Some($crate::value::Deps::new())
    };
    ($($d:expr),+ $(,)?) => {
        Some({
            let mut d = $crate::value::Deps::new();
            $(d.push($crate::value::PropValue::from($d));)+
            d
        })
    };
}

/// `None` on either side, a length change or any element that is not
/// `same` counts as changed.
pub fn deps_changed(old: Option<&Deps>, new: Option<&Deps>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => {
            old.len() != new.len() || old.iter().zip(new.iter()).any(|(a, b)| !a.same(b))
        }
        _ => true,
    }
}
