//! Dependency Store
//!
//! Maps `(target, key)` to the set of subscribers that read it. The store is
//! pure bookkeeping: deciding *who* must re-run after a mutation happens here,
//! actually re-running them is the runtime's job.
//!
//! Subscriber sets are shared (`Rc`) with the subscribers themselves so an
//! effect can remove itself from every set it joined in one pass before it
//! re-runs. Entries are created lazily on first tracked read and never pruned;
//! a set that empties out stays in place.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::subscriber::{SubscriberId, TargetId};
use super::value::{ContainerKind, Key};

/// A set of subscribers shared between the store and its members.
pub(crate) type DepSet = Rc<RefCell<IndexSet<SubscriberId>>>;

/// What a read depended on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A single field, index or entry.
    Key(Key),
    /// The length of a sequence.
    Length,
    /// The full iteration result of a container.
    Iterate,
    /// The key set of an associative map.
    MapKeyIterate,
    /// The value of a computed.
    Value,
}

impl From<Key> for TrackKey {
    fn from(key: Key) -> Self {
        TrackKey::Key(key)
    }
}

/// Classification of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Add,
    Set,
    Delete,
}

/// A mutation about to be announced to the store.
#[derive(Debug, Clone)]
pub(crate) struct Mutation {
    pub(crate) target: TargetId,
    /// Kind of the mutated container; `None` for computed values.
    pub(crate) shape: Option<ContainerKind>,
    pub(crate) key: TrackKey,
    pub(crate) kind: TriggerKind,
    /// New length, when `key` is [`TrackKey::Length`].
    pub(crate) new_len: Option<usize>,
}

impl Mutation {
    pub(crate) fn new(target: TargetId, shape: Option<ContainerKind>, key: TrackKey, kind: TriggerKind) -> Self {
        Self {
            target,
            shape,
            key,
            kind,
            new_len: None,
        }
    }

    pub(crate) fn truncate(target: TargetId, new_len: usize) -> Self {
        Self {
            target,
            shape: Some(ContainerKind::Sequence),
            key: TrackKey::Length,
            kind: TriggerKind::Set,
            new_len: Some(new_len),
        }
    }
}

/// `target -> key -> subscribers`.
#[derive(Default)]
pub(crate) struct DependencyStore {
    targets: HashMap<TargetId, HashMap<TrackKey, DepSet>>,
}

impl DependencyStore {
    /// The subscriber set for `(target, key)`, created on first use.
    pub(crate) fn dep_set(&mut self, target: TargetId, key: TrackKey) -> DepSet {
        self.targets
            .entry(target)
            .or_default()
            .entry(key)
            .or_default()
            .clone()
    }

    /// Every subscriber that must re-run after `mutation`, in the order they
    /// subscribed. Direct subscribers come first, then iteration, key
    /// iteration, length and truncated-slot subscribers.
    pub(crate) fn collect(&self, mutation: &Mutation) -> IndexSet<SubscriberId> {
        let mut out = IndexSet::new();
        let Some(deps) = self.targets.get(&mutation.target) else {
            return out;
        };

        let mut extend = |key: &TrackKey| {
            if let Some(set) = deps.get(key) {
                out.extend(set.borrow().iter().copied());
            }
        };

        extend(&mutation.key);

        let is_map = mutation.shape == Some(ContainerKind::Map);
        let changes_membership = matches!(mutation.kind, TriggerKind::Add | TriggerKind::Delete);

        if changes_membership || (mutation.kind == TriggerKind::Set && is_map) {
            extend(&TrackKey::Iterate);
        }

        if changes_membership && is_map {
            extend(&TrackKey::MapKeyIterate);
        }

        if mutation.shape == Some(ContainerKind::Sequence) {
            if mutation.kind == TriggerKind::Add {
                extend(&TrackKey::Length);
            }

            if let (TrackKey::Length, Some(new_len)) = (&mutation.key, mutation.new_len) {
                let mut dropped: SmallVec<[(usize, &DepSet); 8]> = deps
                    .iter()
                    .filter_map(|(key, set)| match key {
                        TrackKey::Key(Key::Index(index)) if *index >= new_len => Some((*index, set)),
                        _ => None,
                    })
                    .collect();
                dropped.sort_by_key(|(index, _)| *index);
                for (_, set) in dropped {
                    out.extend(set.borrow().iter().copied());
                }
            }
        }

        out
    }

    /// Number of targets with at least one tracked key.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Number of subscribers currently recorded for `(target, key)`.
    pub(crate) fn subscriber_count(&self, target: TargetId, key: &TrackKey) -> usize {
        self.targets
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map_or(0, |set| set.borrow().len())
    }

    pub(crate) fn clear(&mut self) {
        self.targets.clear();
    }
}
