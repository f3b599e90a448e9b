//! Host interface.
//!
//! The renderer never touches an output medium directly. Everything it does
//! goes through a [`Host`]: create nodes, insert/move/remove them, set text,
//! and patch props. Inserting a node that is already attached moves it.

use std::fmt;
use std::hash::Hash;

use super::vnode::PropValue;

/// Primitive operations of an output medium.
pub trait Host {
    /// Handle to a host node.
    type Node: Clone + Eq + Hash + fmt::Debug;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Replace all content of `el` with `text`.
    fn set_element_text(&mut self, el: &Self::Node, text: &str);

    /// Set the value of a text node.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Insert `node` into `parent` before `anchor` (at the end when `None`).
    fn insert(&mut self, node: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node);

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Apply a prop change. `next == None` removes the prop.
    ///
    /// Implementations classify the key (see [`classify_prop`]). Event
    /// bindings must rebind without registering twice, and must ignore
    /// events created before the binding was attached.
    fn patch_prop(
        &mut self,
        el: &Self::Node,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    );

    /// Resolve a selector to a node, for teleports.
    fn query_target(&self, selector: &str) -> Option<Self::Node> {
        let _ = selector;
        None
    }
}

/// How a prop key is applied to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropKind {
    /// `onClick` style binding; carries the lowercase event name.
    Event(String),
    Class,
    Style,
    /// Set as a property of the element object.
    DomProperty,
    /// Set as a string attribute.
    Attribute,
}

/// Properties a host element exposes directly.
const DOM_PROPERTIES: &[&str] = &[
    "value",
    "checked",
    "disabled",
    "selected",
    "multiple",
    "hidden",
    "readOnly",
    "id",
    "type",
    "tabIndex",
    "textContent",
    "innerHTML",
];

/// Properties whose host type is boolean.
const BOOLEAN_PROPERTIES: &[&str] = &["checked", "disabled", "selected", "multiple", "hidden", "readOnly"];

/// Classify a prop key on an element with tag `tag`.
pub fn classify_prop(tag: &str, key: &str) -> PropKind {
    if let Some(event) = key.strip_prefix("on") {
        if event.starts_with(|c: char| c.is_ascii_uppercase()) {
            return PropKind::Event(event.to_ascii_lowercase());
        }
    }
    match key {
        "class" => PropKind::Class,
        "style" => PropKind::Style,
        // `form` is read-only on inputs and can only be set as an attribute.
        "form" if tag == "input" => PropKind::Attribute,
        _ if DOM_PROPERTIES.contains(&key) => PropKind::DomProperty,
        _ => PropKind::Attribute,
    }
}

/// Normalize a value for a DOM property: an empty string on a boolean
/// property means `true` (`<button disabled>`).
pub fn normalize_property(key: &str, value: &PropValue) -> PropValue {
    match value {
        PropValue::Str(s) if s.is_empty() && BOOLEAN_PROPERTIES.contains(&key) => {
            PropValue::Bool(true)
        }
        other => other.clone(),
    }
}
