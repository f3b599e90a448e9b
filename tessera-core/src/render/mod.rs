//! Virtual Tree Reconciler
//!
//! A [`Renderer`] owns a [`Host`] and remembers the last tree rendered into
//! each container. Rendering a new tree patches it against the old one:
//!
//! - nodes of different types are replaced (unmount, then mount in place);
//! - elements are updated in place: props diffed, children reconciled;
//! - text nodes update only when their text changed;
//! - fragments reconcile their children directly in the parent container;
//! - components are handed to their [`Component`] implementation.
//!
//! Keyed child lists are reconciled with the algorithm selected by
//! [`DiffStrategy`] (see [`diff`]).
//!
//! [`render_effect`] ties a renderer to the reactive engine: the view is
//! re-rendered, batched through the job queue, whenever state it read
//! changes.

pub mod component;
pub mod diff;
pub mod host;
pub mod lis;
pub mod memory;
pub mod vnode;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use component::{Component, FunctionalComponent, Internals, Teleport};
pub use host::{classify_prop, normalize_property, Host, PropKind};
pub use memory::{dispatch_in, HostOp, MemoryHost, MemoryNode};
pub use vnode::{Children, Event, EventHandler, Key, NodeType, PropValue, Props, VNode};

use crate::config::{self, DiffStrategy};
use crate::error::RenderError;
use crate::reactive::{effect_with, Effect, EffectOptions};

/// Reconciles virtual trees into a host.
pub struct Renderer<H: Host> {
    host: H,
    roots: HashMap<H::Node, VNode<H::Node>>,
    strategy: DiffStrategy,
}

impl<H: Host> Renderer<H> {
    /// Create a renderer using the thread's configured diff strategy.
    pub fn new(host: H) -> Self {
        Self {
            host,
            roots: HashMap::new(),
            strategy: config::current().diff,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: DiffStrategy) {
        self.strategy = strategy;
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: &H::Node) -> Option<&VNode<H::Node>> {
        self.roots.get(container)
    }

    /// Render `vnode` into `container`, patching against the previous tree.
    /// `None` unmounts whatever was rendered there.
    pub fn render(
        &mut self,
        vnode: Option<VNode<H::Node>>,
        container: &H::Node,
    ) -> Result<(), RenderError> {
        let old = self.roots.remove(container);
        match vnode {
            Some(mut vnode) => {
                let result = self.patch_node(old, &mut vnode, container, None);
                // Stored even on failure: its handles are what is mounted now
                self.roots.insert(container.clone(), vnode);
                result
            }
            None => match old {
                Some(old) => self.unmount_node(old),
                None => Ok(()),
            },
        }
    }

    fn patch_node(
        &mut self,
        old: Option<VNode<H::Node>>,
        new: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        let old = match old {
            Some(old) if !old.same_type(new) => {
                tracing::debug!(old = ?old.node_type, new = ?new.node_type, "replacing node");
                let anchor = old
                    .last_el()
                    .and_then(|el| self.host.next_sibling(&el))
                    .or_else(|| anchor.cloned());
                self.unmount_node(old)?;
                return self.patch_node(None, new, container, anchor.as_ref());
            }
            // Left unmounted by an earlier failed render
            Some(old) if old.el.is_none() && old.is_host_node() => None,
            other => other,
        };

        match new.node_type.clone() {
            NodeType::Element(tag) => match old {
                None => self.mount_element(&tag, new, container, anchor),
                Some(old) => self.patch_element(old, new),
            },
            NodeType::Text => match old {
                None => {
                    let el = self.host.create_text(new.text_content().unwrap_or_default());
                    self.host.insert(&el, container, anchor);
                    new.el = Some(el);
                    Ok(())
                }
                Some(old) => {
                    let el = old
                        .el
                        .clone()
                        .ok_or_else(|| RenderError::MissingHandle("text node".into()))?;
                    if old.text_content() != new.text_content() {
                        self.host
                            .set_text(&el, new.text_content().unwrap_or_default());
                    }
                    new.el = Some(el);
                    Ok(())
                }
            },
            NodeType::Fragment => match old {
                None => match &mut new.children {
                    Children::Nodes(children) => self.mount_list(children, container, anchor),
                    _ => Ok(()),
                },
                Some(old) => {
                    let end = old
                        .last_el()
                        .and_then(|el| self.host.next_sibling(&el))
                        .or_else(|| anchor.cloned());
                    self.patch_child_list(old.children, &mut new.children, container, end.as_ref())
                }
            },
            NodeType::Component(component) => {
                component.process(old, new, container, anchor, self)
            }
        }
    }

    fn mount_element(
        &mut self,
        tag: &str,
        vnode: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        let el = self.host.create_element(tag);
        match &mut vnode.children {
            Children::Text(text) => self.host.set_element_text(&el, text),
            Children::Nodes(children) => self.mount_list(children, &el, None)?,
            Children::None => {}
        }
        for (key, value) in &vnode.props {
            self.host.patch_prop(&el, key, None, Some(value));
        }
        self.host.insert(&el, container, anchor);
        tracing::debug!(tag, ?el, "mounted element");
        vnode.el = Some(el);
        Ok(())
    }

    fn patch_element(
        &mut self,
        old: VNode<H::Node>,
        new: &mut VNode<H::Node>,
    ) -> Result<(), RenderError> {
        let VNode {
            props: old_props,
            children: old_children,
            el,
            ..
        } = old;
        let el = el.ok_or_else(|| RenderError::MissingHandle(format!("{:?}", new.node_type)))?;

        for (key, next) in &new.props {
            let prev = old_props.get(key);
            if prev != Some(next) {
                self.host.patch_prop(&el, key, prev, Some(next));
            }
        }
        for (key, prev) in &old_props {
            if !new.props.contains_key(key) {
                self.host.patch_prop(&el, key, Some(prev), None);
            }
        }

        new.el = Some(el.clone());
        self.patch_child_list(old_children, &mut new.children, &el, None)
    }

    fn mount_list(
        &mut self,
        children: &mut [VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        for child in children {
            self.patch_node(None, child, container, anchor)?;
        }
        Ok(())
    }

    fn patch_child_list(
        &mut self,
        old: Children<H::Node>,
        new: &mut Children<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        match new {
            Children::Text(text) => {
                match old {
                    Children::Text(prev) if prev == *text => return Ok(()),
                    Children::Nodes(nodes) => self.unmount_all(nodes)?,
                    _ => {}
                }
                self.host.set_element_text(container, text);
                Ok(())
            }
            Children::Nodes(children) => match old {
                Children::Nodes(old) => match self.strategy {
                    DiffStrategy::DoubleEnded => {
                        diff::diff_double_ended(self, old, children, container, anchor)
                    }
                    DiffStrategy::Fast => diff::diff_fast(self, old, children, container, anchor),
                },
                Children::Text(_) => {
                    self.host.set_element_text(container, "");
                    self.mount_list(children, container, anchor)
                }
                Children::None => self.mount_list(children, container, anchor),
            },
            Children::None => match old {
                Children::Nodes(nodes) => self.unmount_all(nodes),
                Children::Text(_) => {
                    self.host.set_element_text(container, "");
                    Ok(())
                }
                Children::None => Ok(()),
            },
        }
    }

    fn unmount_all(&mut self, nodes: Vec<VNode<H::Node>>) -> Result<(), RenderError> {
        for node in nodes {
            self.unmount_node(node)?;
        }
        Ok(())
    }

    fn unmount_node(&mut self, vnode: VNode<H::Node>) -> Result<(), RenderError> {
        match vnode.node_type.clone() {
            NodeType::Component(component) => component.unmount(vnode, self),
            NodeType::Fragment => match vnode.children {
                Children::Nodes(children) => self.unmount_all(children),
                _ => Ok(()),
            },
            NodeType::Element(_) | NodeType::Text => {
                match vnode.el {
                    Some(el) => {
                        self.host.remove(&el);
                        tracing::debug!(?el, "unmounted");
                    }
                    None => tracing::debug!(node = ?vnode.node_type, "never mounted, nothing to remove"),
                }
                // Components below may own host nodes outside this subtree.
                if let Children::Nodes(children) = vnode.children {
                    for child in children {
                        self.release_components(child)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn release_components(&mut self, vnode: VNode<H::Node>) -> Result<(), RenderError> {
        match vnode.node_type {
            NodeType::Component(_) => self.unmount_node(vnode),
            _ => match vnode.children {
                Children::Nodes(children) => {
                    for child in children {
                        self.release_components(child)?;
                    }
                    Ok(())
                }
                _ => Ok(()),
            },
        }
    }

    fn move_vnode(
        &mut self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        match &vnode.node_type {
            NodeType::Component(component) => {
                component.clone().move_to(vnode, container, anchor, self)
            }
            NodeType::Fragment => {
                for child in vnode.child_nodes() {
                    self.move_vnode(child, container, anchor)?;
                }
                Ok(())
            }
            NodeType::Element(_) | NodeType::Text => {
                let el = vnode
                    .el
                    .as_ref()
                    .ok_or_else(|| RenderError::MissingHandle(format!("{:?}", vnode.node_type)))?;
                tracing::debug!(?el, ?anchor, "moving node");
                self.host.insert(el, container, anchor);
                Ok(())
            }
        }
    }
}

impl<H: Host> Internals<H::Node> for Renderer<H> {
    fn patch(
        &mut self,
        old: Option<VNode<H::Node>>,
        new: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        self.patch_node(old, new, container, anchor)
    }

    fn mount_children(
        &mut self,
        children: &mut [VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        self.mount_list(children, container, anchor)
    }

    fn patch_children(
        &mut self,
        old: Children<H::Node>,
        new: &mut Children<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        self.patch_child_list(old, new, container, anchor)
    }

    fn unmount(&mut self, vnode: VNode<H::Node>) -> Result<(), RenderError> {
        self.unmount_node(vnode)
    }

    fn move_node(
        &mut self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<(), RenderError> {
        self.move_vnode(vnode, container, anchor)
    }

    fn mount_placeholder(&mut self, container: &H::Node, anchor: Option<&H::Node>) -> H::Node {
        let placeholder = self.host.create_text("");
        self.host.insert(&placeholder, container, anchor);
        placeholder
    }

    fn insert_handle(&mut self, node: &H::Node, container: &H::Node, anchor: Option<&H::Node>) {
        self.host.insert(node, container, anchor);
    }

    fn remove_handle(&mut self, node: &H::Node) {
        self.host.remove(node);
    }

    fn next_sibling(&self, node: &H::Node) -> Option<H::Node> {
        self.host.next_sibling(node)
    }

    fn query_target(&self, selector: &str) -> Option<H::Node> {
        self.host.query_target(selector)
    }
}

/// Render `view` into `container` now, and again after every job flush in
/// which state read by `view` changed.
///
/// Re-renders are queued jobs: nothing updates until the host calls
/// [`flush_jobs`](crate::scheduler::flush_jobs) (or [`tick`](crate::scheduler::tick)),
/// or a hook installed with [`set_flush_hook`](crate::scheduler::set_flush_hook)
/// arranges that call.
///
/// Errors are logged; the tree stored for `container` always matches what
/// is mounted.
#[must_use = "dropping the effect stops re-rendering"]
pub fn render_effect<H, F>(
    renderer: Rc<RefCell<Renderer<H>>>,
    container: H::Node,
    view: F,
) -> Effect
where
    H: Host + 'static,
    H::Node: 'static,
    F: Fn() -> VNode<H::Node> + 'static,
{
    effect_with(
        move || {
            let tree = view();
            let Ok(mut renderer) = renderer.try_borrow_mut() else {
                tracing::error!(?container, "renderer is busy, skipping render");
                return;
            };
            if let Err(error) = renderer.render(Some(tree), &container) {
                tracing::error!(%error, ?container, "render failed");
            }
        },
        EffectOptions::default().queued(),
    )
}
