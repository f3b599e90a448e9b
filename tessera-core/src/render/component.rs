//! Pluggable node kinds.
//!
//! A component-typed [`VNode`] is not interpreted by the renderer. It is
//! routed to its [`Component`], which receives the [`Internals`] capability
//! bundle and drives reconciliation of whatever it renders through it.
//!
//! Two reference kinds live here: [`FunctionalComponent`], which renders a
//! subtree from its props, and [`Teleport`], which mounts its children into
//! a different container.

use std::fmt;
use std::rc::Rc;

use super::vnode::{Children, Props, VNode};
use crate::error::RenderError;

/// Reconciliation operations offered to component implementations.
pub trait Internals<N> {
    /// Patch `old` into `new` (mount when `old` is `None`).
    fn patch(
        &mut self,
        old: Option<VNode<N>>,
        new: &mut VNode<N>,
        container: &N,
        anchor: Option<&N>,
    ) -> Result<(), RenderError>;

    fn mount_children(
        &mut self,
        children: &mut [VNode<N>],
        container: &N,
        anchor: Option<&N>,
    ) -> Result<(), RenderError>;

    /// Reconcile a child list against the previous one. `anchor` bounds the
    /// list from the right when it shares its container with later siblings.
    fn patch_children(
        &mut self,
        old: Children<N>,
        new: &mut Children<N>,
        container: &N,
        anchor: Option<&N>,
    ) -> Result<(), RenderError>;

    fn unmount(&mut self, vnode: VNode<N>) -> Result<(), RenderError>;

    fn move_node(
        &mut self,
        vnode: &VNode<N>,
        container: &N,
        anchor: Option<&N>,
    ) -> Result<(), RenderError>;

    /// Insert an empty text node to mark a position.
    fn mount_placeholder(&mut self, container: &N, anchor: Option<&N>) -> N;

    /// Insert (or move) a single host node.
    fn insert_handle(&mut self, node: &N, container: &N, anchor: Option<&N>);

    /// Detach a single host node.
    fn remove_handle(&mut self, node: &N);

    fn next_sibling(&self, node: &N) -> Option<N>;

    fn query_target(&self, selector: &str) -> Option<N>;
}

/// A pluggable node kind.
pub trait Component<N> {
    fn name(&self) -> &str;

    /// Mount (`old == None`) or update `new`.
    fn process(
        &self,
        old: Option<VNode<N>>,
        new: &mut VNode<N>,
        container: &N,
        anchor: Option<&N>,
        internals: &mut dyn Internals<N>,
    ) -> Result<(), RenderError>;

    /// Release everything `vnode` mounted. Defaults to unmounting the
    /// rendered subtree.
    fn unmount(&self, vnode: VNode<N>, internals: &mut dyn Internals<N>) -> Result<(), RenderError> {
        match vnode.subtree {
            Some(subtree) => internals.unmount(*subtree),
            None => Ok(()),
        }
    }

    /// Move what `vnode` mounted. Defaults to moving the rendered subtree.
    fn move_to(
        &self,
        vnode: &VNode<N>,
        container: &N,
        anchor: Option<&N>,
        internals: &mut dyn Internals<N>,
    ) -> Result<(), RenderError> {
        match &vnode.subtree {
            Some(subtree) => internals.move_node(subtree, container, anchor),
            None => Ok(()),
        }
    }
}

type RenderFn<N> = dyn Fn(&Props) -> VNode<N>;

/// A stateless component: a function from props to a subtree.
pub struct FunctionalComponent<N> {
    name: Rc<str>,
    render: Box<RenderFn<N>>,
}

impl<N> FunctionalComponent<N> {
    pub fn new(name: &str, render: impl Fn(&Props) -> VNode<N> + 'static) -> Self {
        Self {
            name: name.into(),
            render: Box::new(render),
        }
    }
}

impl<N> fmt::Debug for FunctionalComponent<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalComponent")
            .field("name", &self.name)
            .finish()
    }
}

impl<N: Clone> Component<N> for FunctionalComponent<N> {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        old: Option<VNode<N>>,
        new: &mut VNode<N>,
        container: &N,
        anchor: Option<&N>,
        internals: &mut dyn Internals<N>,
    ) -> Result<(), RenderError> {
        let mut tree = (self.render)(&new.props);
        let previous = old.and_then(|old| old.subtree).map(|subtree| *subtree);
        internals.patch(previous, &mut tree, container, anchor)?;

        new.el = tree.first_el();
        new.subtree = Some(Box::new(tree));
        Ok(())
    }
}

/// Renders its children into the container named by its `to` prop.
///
/// An empty placeholder marks the teleport's own position in its parent, so
/// siblings can still be anchored against it. Changing `to` moves the
/// mounted children to the new target.
#[derive(Debug, Default)]
pub struct Teleport;

impl Teleport {
    fn target<N>(vnode: &VNode<N>, internals: &dyn Internals<N>) -> Result<N, RenderError> {
        let selector = vnode
            .props
            .get("to")
            .and_then(|to| to.as_str())
            .unwrap_or_default();
        internals
            .query_target(selector)
            .ok_or_else(|| RenderError::TeleportTarget(selector.to_string()))
    }
}

impl<N: Clone + fmt::Debug> Component<N> for Teleport {
    fn name(&self) -> &str {
        "Teleport"
    }

    fn process(
        &self,
        old: Option<VNode<N>>,
        new: &mut VNode<N>,
        container: &N,
        anchor: Option<&N>,
        internals: &mut dyn Internals<N>,
    ) -> Result<(), RenderError> {
        // A teleport whose earlier mount failed has nothing to patch
        let Some(old) = old.filter(|old| old.el.is_some()) else {
            let target = Self::target(new, internals)?;
            new.el = Some(internals.mount_placeholder(container, anchor));
            if let Children::Nodes(children) = &mut new.children {
                internals.mount_children(children, &target, None)?;
            }
            return Ok(());
        };

        let target_changed = old.props.get("to") != new.props.get("to");
        let targets = Self::target(&old, internals).and_then(|old_target| {
            let new_target = if target_changed {
                Some(Self::target(new, internals)?)
            } else {
                None
            };
            Ok((old_target, new_target))
        });
        let (old_target, new_target) = match targets {
            Ok(targets) => targets,
            Err(error) => {
                // Nothing of the new tree is mounted; drop the old one too
                self.unmount(old, internals)?;
                return Err(error);
            }
        };

        new.el = old.el.clone();
        internals.patch_children(old.children, &mut new.children, &old_target, None)?;

        if let Some(target) = new_target {
            tracing::debug!(?target, "teleport target changed, moving children");
            for child in new.child_nodes() {
                internals.move_node(child, &target, None)?;
            }
        }
        Ok(())
    }

    fn unmount(&self, vnode: VNode<N>, internals: &mut dyn Internals<N>) -> Result<(), RenderError> {
        if let Some(placeholder) = &vnode.el {
            internals.remove_handle(placeholder);
        }
        if let Children::Nodes(children) = vnode.children {
            for child in children {
                internals.unmount(child)?;
            }
        }
        Ok(())
    }

    fn move_to(
        &self,
        vnode: &VNode<N>,
        container: &N,
        anchor: Option<&N>,
        internals: &mut dyn Internals<N>,
    ) -> Result<(), RenderError> {
        match &vnode.el {
            Some(placeholder) => {
                internals.insert_handle(placeholder, container, anchor);
                Ok(())
            }
            None => Err(RenderError::MissingHandle("teleport placeholder".into())),
        }
    }
}
