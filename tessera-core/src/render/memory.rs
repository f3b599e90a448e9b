//! In-process host.
//!
//! [`MemoryHost`] keeps an arena-backed node tree and logs every mutation as
//! a [`HostOp`], which makes it the backend for tests and benchmarks. It also
//! models event dispatch: listeners are stamped with a logical time when
//! bound, and events older than the binding are ignored.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::host::{classify_prop, normalize_property, Host, PropKind};
use super::vnode::{Event, EventHandler, PropValue};
use super::Renderer;

/// Handle to a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(usize);

impl MemoryNode {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: MemoryNode, tag: String },
    CreateText { node: MemoryNode, text: String },
    /// A detached node was attached.
    Insert {
        node: MemoryNode,
        parent: MemoryNode,
        anchor: Option<MemoryNode>,
    },
    /// An attached node was re-inserted.
    Move {
        node: MemoryNode,
        parent: MemoryNode,
        anchor: Option<MemoryNode>,
    },
    Remove { node: MemoryNode },
    SetElementText { node: MemoryNode, text: String },
    SetText { node: MemoryNode, text: String },
    PatchProp { node: MemoryNode, key: String },
    AddListener { node: MemoryNode, event: String },
    RemoveListener { node: MemoryNode, event: String },
}

#[derive(Debug)]
struct Invoker {
    handlers: Vec<EventHandler>,
    attached: u64,
}

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, PropValue>,
    class: Option<String>,
    style: Option<String>,
    invokers: IndexMap<String, Invoker>,
}

#[derive(Debug)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct Slot {
    data: NodeData,
    parent: Option<MemoryNode>,
    children: Vec<MemoryNode>,
}

fn element_in<'a>(nodes: &'a mut [Slot], node: &MemoryNode) -> Option<&'a mut ElementData> {
    match nodes.get_mut(node.0).map(|slot| &mut slot.data) {
        Some(NodeData::Element(element)) => Some(element),
        _ => None,
    }
}

/// Arena-backed host with an operation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Slot>,
    ops: Vec<HostOp>,
    clock: u64,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> MemoryNode {
        let node = MemoryNode(self.nodes.len());
        self.nodes.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        node
    }

    fn slot(&self, node: &MemoryNode) -> Option<&Slot> {
        self.nodes.get(node.0)
    }

    fn element(&self, node: &MemoryNode) -> Option<&ElementData> {
        match self.slot(node).map(|slot| &slot.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn detach(&mut self, node: &MemoryNode) -> Option<MemoryNode> {
        let parent = self.nodes.get_mut(node.0)?.parent.take()?;
        if let Some(slot) = self.nodes.get_mut(parent.0) {
            slot.children.retain(|child| child != node);
        }
        Some(parent)
    }

    /// Create a detached `div` to render into.
    pub fn create_root(&mut self) -> MemoryNode {
        self.create_element("div")
    }

    /// Current logical time.
    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Advance the logical clock and return the new time.
    pub fn advance_clock(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
        self.slot(node).and_then(|slot| slot.parent)
    }

    pub fn children(&self, node: &MemoryNode) -> Vec<MemoryNode> {
        self.slot(node)
            .map(|slot| slot.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: &MemoryNode) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    /// Value of a text node.
    pub fn text(&self, node: &MemoryNode) -> Option<&str> {
        match self.slot(node).map(|slot| &slot.data) {
            Some(NodeData::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn attribute(&self, node: &MemoryNode, key: &str) -> Option<&str> {
        self.element(node)
            .and_then(|element| element.attributes.get(key))
            .map(String::as_str)
    }

    pub fn property(&self, node: &MemoryNode, key: &str) -> Option<&PropValue> {
        self.element(node)
            .and_then(|element| element.properties.get(key))
    }

    pub fn class(&self, node: &MemoryNode) -> Option<&str> {
        self.element(node).and_then(|element| element.class.as_deref())
    }

    pub fn style(&self, node: &MemoryNode) -> Option<&str> {
        self.element(node).and_then(|element| element.style.as_deref())
    }

    /// Number of handlers bound for `event` on `node`.
    pub fn listener_count(&self, node: &MemoryNode, event: &str) -> usize {
        self.element(node)
            .and_then(|element| element.invokers.get(event))
            .map_or(0, |invoker| invoker.handlers.len())
    }

    /// Handlers on `node` that accept an event created at `timestamp`.
    pub fn listeners(&self, node: &MemoryNode, event: &str, timestamp: u64) -> Vec<EventHandler> {
        match self.element(node).and_then(|element| element.invokers.get(event)) {
            Some(invoker) if timestamp >= invoker.attached => invoker.handlers.clone(),
            Some(invoker) => {
                tracing::trace!(
                    ?node,
                    event,
                    timestamp,
                    attached = invoker.attached,
                    "ignoring event older than its binding"
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Dispatch an event at `node`, bubbling to the root.
    ///
    /// Handlers run while the host is borrowed. When handlers may re-render
    /// synchronously, use [`dispatch_in`] instead.
    pub fn dispatch(&self, node: &MemoryNode, event: &str, timestamp: u64) -> usize {
        let payload = Event {
            name: event.into(),
            timestamp,
        };
        let mut called = 0;
        let mut cursor = Some(*node);
        while let Some(current) = cursor {
            for handler in self.listeners(&current, event, timestamp) {
                handler.call(&payload);
                called += 1;
            }
            cursor = self.parent(&current);
        }
        called
    }

    /// Markup of the subtree at `node`.
    pub fn serialize(&self, node: &MemoryNode) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: &MemoryNode, out: &mut String) {
        let Some(slot) = self.slot(node) else {
            return;
        };
        match &slot.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(element) => {
                let _ = write!(out, "<{}", element.tag);
                if let Some(class) = &element.class {
                    let _ = write!(out, " class=\"{class}\"");
                }
                if let Some(style) = &element.style {
                    let _ = write!(out, " style=\"{style}\"");
                }
                for (key, value) in &element.attributes {
                    let _ = write!(out, " {key}=\"{value}\"");
                }
                out.push('>');
                for child in &slot.children {
                    self.write_node(child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }

    fn patch_listener(&mut self, el: &MemoryNode, event: String, next: Option<&PropValue>) {
        let handlers = next.map(PropValue::handlers).unwrap_or_default();
        let now = self.clock;
        let Some(element) = element_in(&mut self.nodes, el) else {
            return;
        };

        if handlers.is_empty() {
            if element.invokers.shift_remove(&event).is_some() {
                self.ops.push(HostOp::RemoveListener { node: *el, event });
            }
            return;
        }

        match element.invokers.get_mut(&event) {
            Some(invoker) => {
                invoker.handlers = handlers;
                invoker.attached = now;
            }
            None => {
                element.invokers.insert(
                    event.clone(),
                    Invoker {
                        handlers,
                        attached: now,
                    },
                );
                self.ops.push(HostOp::AddListener { node: *el, event });
            }
        }
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;

    fn create_element(&mut self, tag: &str) -> MemoryNode {
        let node = self.alloc(NodeData::Element(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        }));
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> MemoryNode {
        let node = self.alloc(NodeData::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_element_text(&mut self, el: &MemoryNode, text: &str) {
        for child in self.children(el) {
            self.detach(&child);
        }
        if !text.is_empty() {
            let content = self.alloc(NodeData::Text(text.to_string()));
            if let Some(slot) = self.nodes.get_mut(content.0) {
                slot.parent = Some(*el);
            }
            if let Some(slot) = self.nodes.get_mut(el.0) {
                slot.children.push(content);
            }
        }
        self.ops.push(HostOp::SetElementText {
            node: *el,
            text: text.to_string(),
        });
    }

    fn set_text(&mut self, node: &MemoryNode, text: &str) {
        if let Some(Slot {
            data: NodeData::Text(value),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *value = text.to_string();
        }
        self.ops.push(HostOp::SetText {
            node: *node,
            text: text.to_string(),
        });
    }

    fn insert(&mut self, node: &MemoryNode, parent: &MemoryNode, anchor: Option<&MemoryNode>) {
        let moved = self.detach(node).is_some();
        let Some(slot) = self.nodes.get_mut(parent.0) else {
            return;
        };
        let position = anchor
            .and_then(|anchor| slot.children.iter().position(|child| child == anchor))
            .unwrap_or(slot.children.len());
        slot.children.insert(position, *node);
        if let Some(slot) = self.nodes.get_mut(node.0) {
            slot.parent = Some(*parent);
        }

        let (node, parent, anchor) = (*node, *parent, anchor.copied());
        self.ops.push(if moved {
            HostOp::Move {
                node,
                parent,
                anchor,
            }
        } else {
            HostOp::Insert {
                node,
                parent,
                anchor,
            }
        });
    }

    fn remove(&mut self, node: &MemoryNode) {
        self.detach(node);
        self.ops.push(HostOp::Remove { node: *node });
    }

    fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
        let parent = self.parent(node)?;
        let siblings = &self.slot(&parent)?.children;
        let position = siblings.iter().position(|child| child == node)?;
        siblings.get(position + 1).copied()
    }

    fn patch_prop(
        &mut self,
        el: &MemoryNode,
        key: &str,
        _prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) {
        let Some(tag) = self.tag(el).map(str::to_string) else {
            return;
        };
        self.ops.push(HostOp::PatchProp {
            node: *el,
            key: key.to_string(),
        });

        let kind = classify_prop(&tag, key);
        if let PropKind::Event(event) = kind {
            self.patch_listener(el, event, next);
            return;
        }
        let Some(element) = element_in(&mut self.nodes, el) else {
            return;
        };
        match (kind, next) {
            (PropKind::Class, next) => element.class = next.map(|value| value.to_text().to_string()),
            (PropKind::Style, next) => element.style = next.map(|value| value.to_text().to_string()),
            (PropKind::DomProperty, Some(value)) => {
                element
                    .properties
                    .insert(key.to_string(), normalize_property(key, value));
            }
            (PropKind::DomProperty, None) => {
                element.properties.shift_remove(key);
            }
            (_, None | Some(PropValue::Bool(false))) => {
                element.attributes.shift_remove(key);
            }
            (_, Some(value)) => {
                element
                    .attributes
                    .insert(key.to_string(), value.to_text().to_string());
            }
        }
    }

    /// Resolves `#id` against element `id` properties and attributes.
    fn query_target(&self, selector: &str) -> Option<MemoryNode> {
        let id = selector.strip_prefix('#')?;
        self.nodes.iter().enumerate().find_map(|(index, slot)| {
            let NodeData::Element(element) = &slot.data else {
                return None;
            };
            let matches = element
                .properties
                .get("id")
                .map(|value| &*value.to_text() == id)
                .unwrap_or(false)
                || element.attributes.get("id").map(String::as_str) == Some(id);
            matches.then_some(MemoryNode(index))
        })
    }
}

/// Dispatch an event through a shared renderer, releasing the borrow while
/// each level's handlers run so they may trigger renders.
pub fn dispatch_in(
    renderer: &RefCell<Renderer<MemoryHost>>,
    node: &MemoryNode,
    event: &str,
    timestamp: u64,
) -> usize {
    let payload = Event {
        name: event.into(),
        timestamp,
    };
    let mut called = 0;
    let mut cursor = Some(*node);
    while let Some(current) = cursor {
        let handlers = renderer.borrow().host().listeners(&current, event, timestamp);
        for handler in handlers {
            handler.call(&payload);
            called += 1;
        }
        cursor = renderer.borrow().host().parent(&current);
    }
    called
}
