//! Keyed-children diff.
//!
//! Both algorithms reconcile an old child list against a new one in the same
//! container. Matched nodes are patched in place (their host handles carried
//! over), unmatched old nodes are unmounted, unmatched new nodes are mounted,
//! and surviving nodes are moved into their new order.
//!
//! `end_anchor` is the host node that follows the list in its container, if
//! any. Fragments need it because their children share the parent's
//! container with later siblings.

use std::collections::HashMap;

use super::component::Internals;
use super::lis::longest_increasing_subsequence;
use super::vnode::{Key, VNode};
use crate::error::RenderError;

fn same_key<N>(old: &Option<VNode<N>>, new: &VNode<N>) -> bool {
    matches!(old, Some(old) if old.key == new.key)
}

fn take<N>(slot: &mut Option<VNode<N>>) -> Result<VNode<N>, RenderError> {
    slot.take()
        .ok_or_else(|| RenderError::MissingHandle("old child already consumed".into()))
}

/// First host node of `nodes`, else `end_anchor`.
fn following_anchor<N: Clone>(nodes: &[VNode<N>], end_anchor: Option<&N>) -> Option<N> {
    nodes
        .iter()
        .find_map(VNode::first_el)
        .or_else(|| end_anchor.cloned())
}

/// Four-pointer diff comparing the ends of both lists.
pub fn diff_double_ended<N, I>(
    internals: &mut I,
    old: Vec<VNode<N>>,
    new: &mut [VNode<N>],
    container: &N,
    end_anchor: Option<&N>,
) -> Result<(), RenderError>
where
    N: Clone,
    I: Internals<N> + ?Sized,
{
    let mut old: Vec<Option<VNode<N>>> = old.into_iter().map(Some).collect();
    let (mut old_start, mut old_end) = (0, old.len());
    let (mut new_start, mut new_end) = (0, new.len());

    while old_start < old_end && new_start < new_end {
        if old[old_start].is_none() {
            old_start += 1;
        } else if old[old_end - 1].is_none() {
            old_end -= 1;
        } else if same_key(&old[old_start], &new[new_start]) {
            let node = take(&mut old[old_start])?;
            internals.patch(Some(node), &mut new[new_start], container, None)?;
            old_start += 1;
            new_start += 1;
        } else if same_key(&old[old_end - 1], &new[new_end - 1]) {
            let node = take(&mut old[old_end - 1])?;
            internals.patch(Some(node), &mut new[new_end - 1], container, None)?;
            old_end -= 1;
            new_end -= 1;
        } else if same_key(&old[old_start], &new[new_end - 1]) {
            // Front to back: goes right after the current old end.
            let anchor = match old[old_end - 1].as_ref().and_then(VNode::last_el) {
                Some(last) => internals.next_sibling(&last),
                None => end_anchor.cloned(),
            };
            let node = take(&mut old[old_start])?;
            let target = &mut new[new_end - 1];
            internals.patch(Some(node), target, container, None)?;
            internals.move_node(target, container, anchor.as_ref())?;
            old_start += 1;
            new_end -= 1;
        } else if same_key(&old[old_end - 1], &new[new_start]) {
            // Back to front: goes right before the current old start.
            let anchor = old[old_start].as_ref().and_then(VNode::first_el);
            let node = take(&mut old[old_end - 1])?;
            let target = &mut new[new_start];
            internals.patch(Some(node), target, container, None)?;
            internals.move_node(target, container, anchor.as_ref())?;
            old_end -= 1;
            new_start += 1;
        } else {
            let anchor = old[old_start].as_ref().and_then(VNode::first_el);
            let found = (old_start + 1..old_end).find(|&i| same_key(&old[i], &new[new_start]));
            let target = &mut new[new_start];
            match found {
                Some(index) => {
                    let node = take(&mut old[index])?;
                    internals.patch(Some(node), target, container, None)?;
                    internals.move_node(target, container, anchor.as_ref())?;
                }
                None => internals.patch(None, target, container, anchor.as_ref())?,
            }
            new_start += 1;
        }
    }

    if new_start < new_end {
        let anchor = following_anchor(&new[new_end..], end_anchor);
        for node in &mut new[new_start..new_end] {
            internals.patch(None, node, container, anchor.as_ref())?;
        }
    } else {
        for slot in &mut old[old_start..old_end] {
            if let Some(node) = slot.take() {
                internals.unmount(node)?;
            }
        }
    }
    Ok(())
}

/// Prefix/suffix trimming, then a keyed match of the middle with moves
/// limited to nodes outside the longest increasing subsequence.
pub fn diff_fast<N, I>(
    internals: &mut I,
    old: Vec<VNode<N>>,
    new: &mut [VNode<N>],
    container: &N,
    end_anchor: Option<&N>,
) -> Result<(), RenderError>
where
    N: Clone,
    I: Internals<N> + ?Sized,
{
    let mut old: Vec<Option<VNode<N>>> = old.into_iter().map(Some).collect();
    let mut start = 0;
    let (mut old_end, mut new_end) = (old.len(), new.len());

    while start < old_end && start < new_end && same_key(&old[start], &new[start]) {
        let node = take(&mut old[start])?;
        internals.patch(Some(node), &mut new[start], container, None)?;
        start += 1;
    }

    while start < old_end && start < new_end && same_key(&old[old_end - 1], &new[new_end - 1]) {
        let node = take(&mut old[old_end - 1])?;
        internals.patch(Some(node), &mut new[new_end - 1], container, None)?;
        old_end -= 1;
        new_end -= 1;
    }

    if start >= old_end {
        let anchor = following_anchor(&new[new_end..], end_anchor);
        for node in &mut new[start..new_end] {
            internals.patch(None, node, container, anchor.as_ref())?;
        }
        return Ok(());
    }

    if start >= new_end {
        for slot in &mut old[start..old_end] {
            if let Some(node) = slot.take() {
                internals.unmount(node)?;
            }
        }
        return Ok(());
    }

    let count = new_end - start;
    let mut key_index: HashMap<Key, usize> = HashMap::with_capacity(count);
    for (index, node) in new.iter().enumerate().take(new_end).skip(start) {
        if let Some(key) = &node.key {
            if key_index.contains_key(key) {
                tracing::warn!(?key, "duplicate key among siblings, later node remounts");
                continue;
            }
            key_index.insert(key.clone(), index);
        }
    }

    // Old index of each middle node, in new order.
    let mut source: Vec<Option<usize>> = vec![None; count];
    let mut moved = false;
    let mut furthest = 0;
    let mut patched = 0;

    for (old_index, slot) in old.iter_mut().enumerate().take(old_end).skip(start) {
        let Some(node) = slot.take() else {
            continue;
        };
        if patched >= count {
            internals.unmount(node)?;
            continue;
        }

        let matched = node
            .key
            .as_ref()
            .and_then(|key| key_index.get(key).copied())
            .filter(|&new_index| source[new_index - start].is_none());
        let Some(new_index) = matched else {
            internals.unmount(node)?;
            continue;
        };

        source[new_index - start] = Some(old_index);
        if new_index < furthest {
            moved = true;
        } else {
            furthest = new_index;
        }
        internals.patch(Some(node), &mut new[new_index], container, None)?;
        patched += 1;
    }

    let stable = if moved {
        longest_increasing_subsequence(&source)
    } else {
        Vec::new()
    };
    tracing::debug!(count, patched, moved, stable = stable.len(), "keyed diff");

    let mut stable = stable.iter().rev().peekable();
    for offset in (0..count).rev() {
        let index = start + offset;
        let (node, rest) = new[index..].split_at_mut(1);
        let anchor = following_anchor(rest, end_anchor);
        let node = &mut node[0];

        match source[offset] {
            None => internals.patch(None, node, container, anchor.as_ref())?,
            Some(_) if !moved => {}
            Some(_) => {
                if stable.peek() == Some(&&offset) {
                    stable.next();
                } else {
                    internals.move_node(node, container, anchor.as_ref())?;
                }
            }
        }
    }
    Ok(())
}
