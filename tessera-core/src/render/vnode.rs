//! Virtual Nodes
//!
//! A [`VNode`] describes one unit of desired output. A fresh tree is built on
//! every render; the renderer reconciles it against the previous tree and
//! copies host handles (`el`) from matched old nodes into the new ones.
//!
//! `N` is the host's node handle type (see [`super::Host`]).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::Component;

/// Identity of a child within its sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(key.into())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Str(key.into())
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Key::Int(key)
    }
}

impl From<i32> for Key {
    fn from(key: i32) -> Self {
        Key::Int(key.into())
    }
}

impl From<usize> for Key {
    fn from(key: usize) -> Self {
        Key::Int(key as i64)
    }
}

/// Event passed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: Rc<str>,
    /// Logical time at which the event was created.
    pub timestamp: u64,
}

/// An event handler. Two handlers are equal only if they are the same
/// closure.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Value of a prop.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Handler(EventHandler),
    Handlers(Vec<EventHandler>),
}

impl PropValue {
    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        PropValue::Handler(EventHandler::new(f))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Handlers carried by this value, if it is an event binding.
    pub fn handlers(&self) -> Vec<EventHandler> {
        match self {
            PropValue::Handler(handler) => vec![handler.clone()],
            PropValue::Handlers(handlers) => handlers.clone(),
            _ => Vec::new(),
        }
    }

    /// Text form used for attributes.
    pub fn to_text(&self) -> Rc<str> {
        match self {
            PropValue::Bool(b) => b.to_string().into(),
            PropValue::Number(n) => n.to_string().into(),
            PropValue::Str(s) => s.clone(),
            PropValue::Handler(_) | PropValue::Handlers(_) => "".into(),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(value.into())
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        PropValue::Handler(handler)
    }
}

pub type Props = IndexMap<Rc<str>, PropValue>;

/// What a virtual node stands for.
pub enum NodeType<N> {
    /// Host element with the given tag.
    Element(Rc<str>),
    /// Text node; the text lives in `children`.
    Text,
    /// A list of siblings with no host node of its own.
    Fragment,
    /// A pluggable node kind.
    Component(Rc<dyn Component<N>>),
}

impl<N> NodeType<N> {
    /// Same variant, same tag, same component instance.
    pub fn same_as(&self, other: &NodeType<N>) -> bool {
        match (self, other) {
            (NodeType::Element(a), NodeType::Element(b)) => a == b,
            (NodeType::Text, NodeType::Text) | (NodeType::Fragment, NodeType::Fragment) => true,
            (NodeType::Component(a), NodeType::Component(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl<N> Clone for NodeType<N> {
    fn clone(&self) -> Self {
        match self {
            NodeType::Element(tag) => NodeType::Element(tag.clone()),
            NodeType::Text => NodeType::Text,
            NodeType::Fragment => NodeType::Fragment,
            NodeType::Component(component) => NodeType::Component(component.clone()),
        }
    }
}

impl<N> fmt::Debug for NodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Element(tag) => write!(f, "Element({tag})"),
            NodeType::Text => f.write_str("Text"),
            NodeType::Fragment => f.write_str("Fragment"),
            NodeType::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

/// Children of a virtual node.
#[derive(Debug, Clone)]
pub enum Children<N> {
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode<N>>),
}

impl<N> Default for Children<N> {
    fn default() -> Self {
        Children::None
    }
}

/// A virtual node.
#[derive(Debug, Clone)]
pub struct VNode<N> {
    pub node_type: NodeType<N>,
    pub props: Props,
    pub children: Children<N>,
    pub key: Option<Key>,
    /// Host node, set once mounted.
    pub el: Option<N>,
    /// A component's rendered tree.
    pub subtree: Option<Box<VNode<N>>>,
}

impl<N> VNode<N> {
    fn new(node_type: NodeType<N>) -> Self {
        Self {
            node_type,
            props: Props::new(),
            children: Children::None,
            key: None,
            el: None,
            subtree: None,
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::new(NodeType::Element(tag.into()))
    }

    pub fn text(text: &str) -> Self {
        let mut node = Self::new(NodeType::Text);
        node.children = Children::Text(text.into());
        node
    }

    pub fn fragment(children: Vec<VNode<N>>) -> Self {
        let mut node = Self::new(NodeType::Fragment);
        node.children = Children::Nodes(children);
        node
    }

    pub fn component(component: Rc<dyn Component<N>>) -> Self {
        Self::new(NodeType::Component(component))
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<VNode<N>>) -> Self {
        self.children = Children::Nodes(children);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children = Children::Text(text.into());
        self
    }

    /// Whether `other` can be patched into this node in place.
    pub fn same_type(&self, other: &VNode<N>) -> bool {
        self.node_type.same_as(&other.node_type)
    }

    /// Elements and text nodes own exactly one host node in `el`.
    pub fn is_host_node(&self) -> bool {
        matches!(self.node_type, NodeType::Element(_) | NodeType::Text)
    }

    /// Text of a text node, or text children of an element.
    pub fn text_content(&self) -> Option<&str> {
        match &self.children {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Child nodes, if any.
    pub fn child_nodes(&self) -> &[VNode<N>] {
        match &self.children {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

impl<N: Clone> VNode<N> {
    /// First host node this vnode occupies in its container.
    pub fn first_el(&self) -> Option<N> {
        match &self.node_type {
            NodeType::Fragment => self.child_nodes().iter().find_map(VNode::first_el),
            NodeType::Component(_) => match &self.subtree {
                Some(subtree) => subtree.first_el(),
                None => self.el.clone(),
            },
            _ => self.el.clone(),
        }
    }

    /// Last host node this vnode occupies in its container.
    pub fn last_el(&self) -> Option<N> {
        match &self.node_type {
            NodeType::Fragment => self.child_nodes().iter().rev().find_map(VNode::last_el),
            NodeType::Component(_) => match &self.subtree {
                Some(subtree) => subtree.last_el(),
                None => self.el.clone(),
            },
            _ => self.el.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_compares_tags() {
        let a: VNode<u32> = VNode::element("div");
        assert!(a.same_type(&VNode::element("div")));
        assert!(!a.same_type(&VNode::element("p")));
        assert!(!a.same_type(&VNode::text("div")));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler = EventHandler::new(|_| {});
        assert_eq!(PropValue::Handler(handler.clone()), PropValue::Handler(handler));
        assert_ne!(PropValue::handler(|_| {}), PropValue::handler(|_| {}));
    }

    #[test]
    fn fragment_bounds_come_from_children() {
        let mut first: VNode<u32> = VNode::text("a");
        first.el = Some(1);
        let mut last = VNode::text("b");
        last.el = Some(2);
        let fragment = VNode::fragment(vec![VNode::fragment(vec![]), first, last]);

        assert_eq!(fragment.first_el(), Some(1));
        assert_eq!(fragment.last_el(), Some(2));
    }
}
