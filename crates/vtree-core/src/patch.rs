//! Host element patching: creating/adopting element and text nodes and
//! writing the difference between two prop bags.

use std::borrow::Cow;

use crate::bindings::is_non_dimensional;
use crate::context::ContextMap;
use crate::diff::{DiffMode, Excess, Reconciler};
use crate::error::{ComponentError, Thrown};
use crate::host::{HostTree, SVG_NAMESPACE};
use crate::node::NodeType;
use crate::tree::NodeId;
use crate::value::{Bag, PropValue, StyleMap};

impl<H: HostTree> Reconciler<'_, H> {
    /// Diffs an element or text node, returning its host node.
    pub(crate) fn diff_element(
        &mut self,
        new: NodeId,
        old: Option<NodeId>,
        ctx: &ContextMap,
        mut mode: DiffMode,
        excess: &mut Excess<H::Node>,
    ) -> Result<H::Node, Thrown> {
        let vnode = self.tree[new].vnode.clone();
        let old_vnode = old.map(|o| self.tree[o].vnode.clone());
        let tag = vnode.ty().tag().map(str::to_string);
        if tag.as_deref() == Some("svg") {
            mode |= DiffMode::SVG;
        }

        let mut dom = old.and_then(|o| self.tree[o].dom.clone());
        let mut adopting = excess.is_some();
        if let Some(ex) = excess.as_mut() {
            for slot in ex.iter_mut() {
                let Some(candidate) = slot.as_ref() else { continue };
                let matches = match &tag {
                    Some(t) => self
                        .host
                        .tag_name(candidate)
                        .is_some_and(|name| name.eq_ignore_ascii_case(t)),
                    None => self.host.tag_name(candidate).is_none(),
                };
                if matches {
                    dom = slot.take();
                    break;
                }
            }
        }

        let mut hydrating = mode.contains(DiffMode::HYDRATE);
        let dom = match dom {
            Some(d) => d,
            None => {
                adopting = false;
                hydrating = false;
                match vnode.ty() {
                    NodeType::Text(text) => return Ok(self.host.create_text(text)),
                    NodeType::Element(t) if mode.contains(DiffMode::SVG) => {
                        self.host.create_element_ns(SVG_NAMESPACE, t)
                    }
                    NodeType::Element(t) => self.host.create_element(t),
                    NodeType::Component(c) => {
                        let e = ComponentError::msg(format!("{} is not a host element", c.name()));
                        return Err(Thrown::Error(e));
                    }
                }
            }
        };

        if let NodeType::Text(text) = vnode.ty() {
            let old_text = old_vnode.as_ref().and_then(|v| v.text_content());
            if old_text != Some(&**text) && (!hydrating || self.host.text(&dom).as_deref() != Some(&**text)) {
                self.host.set_text(&dom, text);
            }
            return Ok(dom);
        }

        let tag = tag.unwrap_or_default();
        let svg = mode.contains(DiffMode::SVG);
        let mut child_excess: Excess<H::Node> =
            adopting.then(|| self.host.children(&dom).into_iter().map(Some).collect());

        let old_attrs: Bag = if adopting && !hydrating {
            self.host
                .attributes(&dom)
                .into_iter()
                .map(|(k, v)| (k, PropValue::from(v)))
                .collect()
        } else {
            old_vnode
                .as_ref()
                .map(|v| v.props().attrs().clone())
                .unwrap_or_default()
        };
        let new_attrs = vnode.props().attrs().clone();
        self.diff_props(&dom, &tag, &new_attrs, &old_attrs, svg, hydrating);

        let mut child_mode = mode;
        child_mode.set(DiffMode::HYDRATE, hydrating);
        if tag == "foreignObject" {
            child_mode.remove(DiffMode::SVG);
        }
        let anchor = match &child_excess {
            Some(ex) => ex.first().cloned().flatten(),
            None => old.and_then(|o| self.tree.dom_sibling(o, Some(0))),
        };
        let children = vnode.props().children_or_empty().into_list();
        self.diff_children(&dom, children, new, old, ctx, child_mode, &mut child_excess, anchor)?;

        if let Some(leftover) = child_excess {
            for node in leftover.into_iter().rev().flatten() {
                self.host.remove(&node);
            }
        }

        if !hydrating {
            self.sync_controlled(&dom, &tag, "value", &new_attrs, &old_attrs);
            self.sync_controlled(&dom, &tag, "checked", &new_attrs, &old_attrs);
        }
        Ok(dom)
    }

    /// `value`/`checked` are written after children so an `<option>` list
    /// exists before a `<select>` picks from it, and are compared against
    /// the live node rather than the previous props.
    fn sync_controlled(&mut self, dom: &H::Node, tag: &str, name: &str, new: &Bag, old: &Bag) {
        let Some(value) = new.get(name) else { return };
        let live = self.host.property(dom, name);
        let differs = live.as_ref().is_none_or(|l| !l.same(value));
        let progress_reset = name == "value" && tag == "progress" && !truthy(value);
        let option_changed = name == "value" && tag == "option" && old.get(name).is_none_or(|o| !o.same(value));
        if differs || progress_reset || option_changed {
            self.set_property(dom, tag, name, value, old.get(name), false);
        }
    }

    pub(crate) fn diff_props(
        &mut self,
        dom: &H::Node,
        tag: &str,
        new: &Bag,
        old: &Bag,
        svg: bool,
        hydrating: bool,
    ) {
        for (name, old_value) in old.iter() {
            if !new.contains(name) {
                self.set_property(dom, tag, name, &PropValue::Null, Some(old_value), svg);
            }
        }
        for (name, value) in new.iter() {
            if (hydrating && !value.is_handler()) || name == "value" || name == "checked" {
                continue;
            }
            let old_value = old.get(name);
            if old_value.is_none_or(|o| !o.same(value)) {
                self.set_property(dom, tag, name, value, old_value, svg);
            }
        }
    }

    pub(crate) fn set_property(
        &mut self,
        dom: &H::Node,
        tag: &str,
        name: &str,
        value: &PropValue,
        old: Option<&PropValue>,
        svg: bool,
    ) {
        let name: Cow<'_, str> = if svg && name == "className" {
            Cow::Borrowed("class")
        } else {
            Cow::Borrowed(name)
        };

        if name == "style" {
            self.patch_style(dom, value, old);
            return;
        }

        let properties = self.options.properties.clone();
        if let Some((event, capture)) = properties.event_name(&name) {
            let listeners = self.tree.listeners.entry(dom.clone()).or_default();
            let key = (event.clone(), capture);
            match value {
                PropValue::Handler(h) => {
                    if listeners.insert(key, h.clone()).is_none() {
                        self.host.add_listener(dom, &event, capture);
                    }
                }
                _ => {
                    if listeners.remove(&key).is_some() {
                        self.host.remove_listener(dom, &event, capture);
                    }
                }
            }
            return;
        }

        let name = if svg { Cow::Owned(svg_attribute_name(&name)) } else { name };
        if !svg && properties.is_property(tag, &name) {
            let value = if value.is_null() { PropValue::str("") } else { value.clone() };
            self.host.set_property(dom, &name, &value);
            return;
        }

        if value.is_handler() {
            return;
        }
        let keep_false = name.starts_with("ar");
        match value.to_attr_string() {
            Some(text) if !matches!(value, PropValue::Bool(false)) || keep_false => {
                self.host.set_attribute(dom, &name, &text)
            }
            _ => self.host.remove_attribute(dom, &name),
        }
    }

    fn patch_style(&mut self, dom: &H::Node, value: &PropValue, old: Option<&PropValue>) {
        if let PropValue::Str(css) = value {
            self.host.set_style_text(dom, css);
            return;
        }

        let old_map: Option<&StyleMap> = match old {
            Some(PropValue::Style(m)) => Some(&**m),
            Some(PropValue::Str(_)) => {
                self.host.set_style_text(dom, "");
                None
            }
            _ => None,
        };
        let new_map: Option<&StyleMap> = match value {
            PropValue::Style(m) => Some(&**m),
            _ => None,
        };

        if let Some(old_map) = old_map {
            for (key, _) in old_map.iter() {
                if new_map.is_none_or(|n| n.get(key).is_none()) {
                    self.host.set_style(dom, key, "");
                }
            }
        }
        if let Some(new_map) = new_map {
            for (key, v) in new_map.iter() {
                if old_map.is_none_or(|o| o.get(key).is_none_or(|ov| !ov.same(v))) {
                    self.host.set_style(dom, key, &style_value(key, v));
                }
            }
        }
    }
}

/// Numbers get a `px` suffix unless the key is unitless; custom properties
/// (`--x`) are passed through.
pub(crate) fn style_value(key: &str, value: &PropValue) -> String {
    match value {
        PropValue::Null => String::new(),
        PropValue::Int(_) | PropValue::Float(_) if !key.starts_with('-') && !is_non_dimensional(key) => {
            format!("{}px", value.to_attr_string().unwrap_or_default())
        }
        other => other.to_attr_string().unwrap_or_default(),
    }
}

/// `xlinkHref`/`xlink:href` become `href`, a trailing `sName` becomes `s`.
pub(crate) fn svg_attribute_name(name: &str) -> String {
    let mut out = name.replacen("xlinkH", "h", 1).replacen("xlink:h", "h", 1);
    if out.ends_with("sName") {
        out.truncate(out.len() - "Name".len());
    }
    out
}

fn truthy(v: &PropValue) -> bool {
    match v {
        PropValue::Null => false,
        PropValue::Bool(b) => *b,
        PropValue::Int(i) => *i != 0,
        PropValue::Float(f) => *f != 0.0 && !f.is_nan(),
        PropValue::Str(s) => !s.is_empty(),
        _ => true,
    }
}
