//! Keyed Child Reconciliation
//!
//! Reconciles two sibling lists with the fewest host moves.
//!
//! # Algorithm
//!
//! 1. Patch the common prefix of matching nodes in place.
//! 2. Patch the common suffix in place, from the tail.
//! 3. If only new nodes remain, mount them before the first node of the
//!    suffix.
//! 4. If only old nodes remain, unmount them.
//! 5. Otherwise map each key of the new middle section to its position. Walk
//!    the old middle section: an old node whose key is gone is unmounted, an
//!    old node whose key is found is patched against its new counterpart and
//!    its old position recorded in `sources`. If a matched position is ever
//!    lower than the highest one seen so far, something has to move.
//! 6. Walk the new middle section back to front. Slots with no source are
//!    mounted. If something has to move, slots on the longest increasing
//!    subsequence of `sources` stay where they are and every other matched
//!    slot is moved.
//!
//! Every insertion and move is anchored on the next sibling in the new list.
//! Going right to left guarantees that sibling is already in its final
//! position.

use std::collections::HashMap;

use super::host::{HostNode, HostOps};
use super::renderer::RendererInner;
use super::vnode::{anchor_after, VNode};
use crate::error::Result;
use crate::reactive::Key;

impl<H: HostOps + 'static> RendererInner<H> {
    /// Reconcile `old` into `new` inside `container`. Nodes appended past
    /// the end of the list go before `end`.
    pub(crate) fn patch_keyed_children(
        &self,
        old: &mut [VNode],
        new: &mut [VNode],
        container: HostNode,
        end: Option<HostNode>,
    ) -> Result<()> {
        let mut j = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        // 1. Common prefix
        while j < old_end && j < new_end && old[j].is_same(&new[j]) {
            let anchor = anchor_after(&old[j + 1..], end);
            self.patch(Some(&mut old[j]), &mut new[j], container, anchor)?;
            j += 1;
        }

        // 2. Common suffix
        while j < old_end && j < new_end && old[old_end - 1].is_same(&new[new_end - 1]) {
            let anchor = anchor_after(&new[new_end..], end);
            self.patch(Some(&mut old[old_end - 1]), &mut new[new_end - 1], container, anchor)?;
            old_end -= 1;
            new_end -= 1;
        }

        // 3. Only additions left
        if j == old_end {
            let anchor = anchor_after(&new[new_end..], end);
            for node in &mut new[j..new_end] {
                self.patch(None, node, container, anchor)?;
            }
            return Ok(());
        }

        // 4. Only removals left
        if j == new_end {
            for node in &old[j..old_end] {
                self.unmount(node, container, true)?;
            }
            return Ok(());
        }

        // 5. Unsorted middle section
        let count = new_end - j;
        let key_index: HashMap<Key, usize> = (j..new_end)
            .filter_map(|index| {
                let key = new[index].key.as_ref().filter(|key| key.is_truthy())?;
                Some((key.clone(), index))
            })
            .collect();

        let mut sources: Vec<Option<usize>> = vec![None; count];
        let mut moved = false;
        let mut max_position = 0;
        let mut patched = 0;

        for i in j..old_end {
            let matched = (patched < count)
                .then(|| old[i].key.as_ref())
                .flatten()
                .and_then(|key| key_index.get(key).copied())
                .filter(|&k| sources[k - j].is_none() && old[i].is_same(&new[k]));

            match matched {
                Some(k) => {
                    let anchor = anchor_after(&old[i + 1..], end);
                    self.patch(Some(&mut old[i]), &mut new[k], container, anchor)?;
                    sources[k - j] = Some(i);
                    patched += 1;
                    if k < max_position {
                        moved = true;
                    } else {
                        max_position = k;
                    }
                }
                None => self.unmount(&old[i], container, true)?,
            }
        }

        // 6. Mount and move, right to left
        let stable = if moved {
            longest_increasing_subsequence(&sources)
        } else {
            Vec::new()
        };
        let mut cursor = stable.len();

        for i in (0..count).rev() {
            let position = j + i;
            let anchor = anchor_after(&new[position + 1..], end);

            match sources[i] {
                None => self.patch(None, &mut new[position], container, anchor)?,
                Some(_) if !moved => {}
                Some(_) if cursor > 0 && stable[cursor - 1] == i => cursor -= 1,
                Some(_) => self.move_node(&new[position], container, anchor),
            }
        }

        tracing::trace!(moved, patched, mounted = count - patched, "keyed diff");
        Ok(())
    }
}

/// Positions (into `sources`) of a longest strictly increasing subsequence of
/// the present entries. Unset entries never take part.
///
/// Runs in `O(n log n)`: `tails[len]` holds the position of the smallest value
/// that ends an increasing run of length `len + 1`.
pub fn longest_increasing_subsequence(sources: &[Option<usize>]) -> Vec<usize> {
    let mut predecessors: Vec<Option<usize>> = vec![None; sources.len()];
    let mut tails: Vec<usize> = Vec::new();

    for (position, value) in sources.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };

        let len = tails.partition_point(|&tail| sources[tail].is_some_and(|tail_value| tail_value < value));
        if len > 0 {
            predecessors[position] = Some(tails[len - 1]);
        }
        if len == tails.len() {
            tails.push(position);
        } else {
            tails[len] = position;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut next = tails.last().copied();
    while let Some(position) = next {
        result.push(position);
        next = predecessors[position];
    }
    result.reverse();
    result
}
