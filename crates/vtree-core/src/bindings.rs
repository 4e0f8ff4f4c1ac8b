//! Host capability table: which named props are written as live node
//! properties, which stay plain attributes, and which event names the host
//! knows in lowercase.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

/// Style keys that take bare numbers (no `px` suffix).
static NON_DIMENSIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)acit|ex(?:s|g|n|p|$)|rph|grid|ows|mnc|ntw|ine[ch]|zoo|^ord|itera")
        .expect("static pattern")
});

pub fn is_non_dimensional(key: &str) -> bool {
    NON_DIMENSIONAL.is_match(key)
}

const GLOBAL_PROPERTIES: &[&str] = &["className", "id", "title", "lang", "dir", "hidden"];

const TAG_PROPERTIES: &[(&str, &[&str])] = &[
    (
        "input",
        &["value", "checked", "disabled", "placeholder", "readOnly", "type", "name"],
    ),
    ("textarea", &["value", "disabled", "placeholder", "readOnly"]),
    ("select", &["value", "disabled", "multiple"]),
    ("option", &["value", "selected", "disabled"]),
    ("button", &["disabled", "type"]),
    ("progress", &["value", "max"]),
];

const ATTRIBUTE_ONLY: &[&str] = &[
    "width", "height", "href", "list", "form", "tabIndex", "download",
];

const KNOWN_EVENTS: &[&str] = &[
    "click", "dblclick", "contextmenu", "input", "change", "submit", "reset",
    "focus", "blur", "keydown", "keyup", "keypress", "mousedown", "mouseup",
    "mousemove", "mouseover", "mouseout", "mouseenter", "mouseleave",
    "pointerdown", "pointerup", "pointermove", "pointerenter", "pointerleave",
    "touchstart", "touchmove", "touchend", "scroll", "wheel", "load", "error",
];

#[derive(Clone, Debug)]
pub struct PropertyTable {
    global: HashSet<String>,
    per_tag: HashMap<String, HashSet<String>>,
    attribute_only: HashSet<String>,
    events: HashSet<String>,
}

impl PropertyTable {
    /// A table with nothing bound as a property and no known events.
    pub fn empty() -> Self {
        Self {
            global: HashSet::new(),
            per_tag: HashMap::new(),
            attribute_only: HashSet::new(),
            events: HashSet::new(),
        }
    }

    /// Document-like defaults.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.global = GLOBAL_PROPERTIES.iter().map(|s| s.to_string()).collect();
        for (tag, names) in TAG_PROPERTIES {
            for name in names.iter() {
                table = table.with_property(tag, name);
            }
        }
        table.attribute_only = ATTRIBUTE_ONLY.iter().map(|s| s.to_string()).collect();
        table.events = KNOWN_EVENTS.iter().map(|s| s.to_string()).collect();
        table
    }

    pub fn with_property(mut self, tag: &str, name: &str) -> Self {
        self.per_tag
            .entry(tag.to_string())
            .or_default()
            .insert(name.to_string());
        self
    }

    pub fn with_global_property(mut self, name: &str) -> Self {
        self.global.insert(name.to_string());
        self
    }

    pub fn with_event(mut self, name: &str) -> Self {
        self.events.insert(name.to_ascii_lowercase());
        self
    }

    pub fn is_property(&self, tag: &str, name: &str) -> bool {
        if self.attribute_only.contains(name) {
            return false;
        }
        self.global.contains(name) || self.per_tag.get(tag).is_some_and(|s| s.contains(name))
    }

    /// Splits an `on*` prop name into the host event name and the capture
    /// flag. Known events are lowercased; unknown ones keep their casing.
    pub fn event_name(&self, prop: &str) -> Option<(String, bool)> {
        let rest = prop.strip_prefix("on")?;
        if rest.is_empty() {
            return None;
        }
        let (rest, capture) = match rest.strip_suffix("Capture") {
            Some(r) if !r.is_empty() => (r, true),
            _ => (rest, false),
        };
        let lower = rest.to_ascii_lowercase();
        if self.events.contains(&lower) {
            Some((lower, capture))
        } else {
            Some((rest.to_string(), capture))
        }
    }
}

impl Default for PropertyTable {
    fn default() -> Self {
        Self::standard()
    }
}
