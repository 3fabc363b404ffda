//! Reactive Container Wrapper
//!
//! A [`Reactive`] wraps exactly one raw [`Container`] and exposes typed
//! accessors over it. Every accessor performs the same track/trigger contract:
//! reads record `(container, key)` against the running subscriber, writes
//! classify the mutation (add, set or delete) and announce it.
//!
//! # Flavors
//!
//! Wrappers come in four flavors, deep or shallow, mutable or read-only:
//!
//! - Deep wrappers hand out wrapped nested containers on read; shallow ones
//!   return raw nested containers.
//! - Read-only wrappers do not track, and reject writes with a diagnostic
//!   while still reporting success to the caller.
//!
//! Deep wrappers are cached by container identity, so wrapping the same
//! container twice yields the same handle while the first one is alive.
//!
//! # Per-kind behavior
//!
//! - Records track each field; adding or removing a field also reaches
//!   whoever iterated the record.
//! - Sequences track indices and their length. Appending reaches length
//!   readers, and shrinking the length reaches readers of every dropped slot.
//! - Maps track entries, their iteration and their key set separately:
//!   overwriting a value reaches iteration readers but not key-only readers.
//! - Sets track membership and iteration.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::diagnostic::Diagnostic;
use super::runtime::{Runtime, WrapperCache};
use super::store::{Mutation, TrackKey, TriggerKind};
use super::subscriber::TargetId;
use super::value::{Container, ContainerKind, Key, Value};

pub(crate) struct ReactiveInner {
    raw: Container,
    shallow: bool,
    readonly: bool,
    runtime: Runtime,
}

/// An observable view over a raw container.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

impl Runtime {
    /// Deep, mutable wrapper. Cached by container identity.
    pub fn reactive(&self, container: &Container) -> Reactive {
        self.cached_wrapper(&self.inner.reactive_cache, container, false)
    }

    /// Deep, read-only wrapper. Cached by container identity.
    pub fn readonly(&self, container: &Container) -> Reactive {
        self.cached_wrapper(&self.inner.readonly_cache, container, true)
    }

    /// Shallow, mutable wrapper: nested containers are returned raw.
    pub fn shallow_reactive(&self, container: &Container) -> Reactive {
        Reactive::new(self.clone(), container.clone(), true, false)
    }

    /// Shallow, read-only wrapper.
    pub fn shallow_readonly(&self, container: &Container) -> Reactive {
        Reactive::new(self.clone(), container.clone(), true, true)
    }

    fn cached_wrapper(&self, cache: &WrapperCache, container: &Container, readonly: bool) -> Reactive {
        if let Some(inner) = cache.borrow().get(&container.id()).and_then(std::rc::Weak::upgrade) {
            return Reactive { inner };
        }

        let wrapper = Reactive::new(self.clone(), container.clone(), false, readonly);
        let mut cache = cache.borrow_mut();
        cache.retain(|_, weak| weak.strong_count() > 0);
        cache.insert(container.id(), Rc::downgrade(&wrapper.inner));
        wrapper
    }
}

impl Reactive {
    fn new(runtime: Runtime, raw: Container, shallow: bool, readonly: bool) -> Self {
        Self {
            inner: Rc::new(ReactiveInner {
                raw,
                shallow,
                readonly,
                runtime,
            }),
        }
    }

    /// The wrapped container. Access through it is untracked.
    pub fn raw(&self) -> &Container {
        &self.inner.raw
    }

    pub fn id(&self) -> TargetId {
        self.inner.raw.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.raw.kind()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Whether both handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn track(&self, key: TrackKey) {
        if !self.inner.readonly {
            self.inner.runtime.track(self.id(), key);
        }
    }

    fn trigger(&self, key: TrackKey, kind: TriggerKind) {
        self.inner
            .runtime
            .trigger(Mutation::new(self.id(), Some(self.kind()), key, kind));
    }

    /// Wrap a nested container according to this wrapper's flavor.
    fn wrap(&self, value: Value) -> Value {
        if self.inner.shallow {
            return value;
        }
        match value {
            Value::Object(container) if self.inner.readonly => {
                Value::Reactive(self.inner.runtime.readonly(&container))
            }
            Value::Object(container) => Value::Reactive(self.inner.runtime.reactive(&container)),
            other => other,
        }
    }

    fn reject(&self, diagnostic: Diagnostic) -> bool {
        self.inner.runtime.report(diagnostic);
        true
    }

    /// Read a field, index or entry. Missing keys read as null.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let value = self.inner.raw.get_raw(&key).unwrap_or_default();
        self.track(TrackKey::Key(key));
        self.wrap(value)
    }

    /// Write a field, index or entry.
    ///
    /// Writing a value that is the same as the current one announces
    /// nothing. Returns `false` only when the key cannot address this kind of
    /// container.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.inner.readonly {
            return self.reject(Diagnostic::ReadonlyWrite { key: key.to_string() });
        }
        if self.kind() == ContainerKind::Set {
            self.add(key);
            return true;
        }

        let value = value.into().into_raw();
        let had = self.inner.raw.has_raw(&key);
        let Ok(previous) = self.inner.raw.set_raw(key.clone(), value.clone()) else {
            return false;
        };

        if !had {
            self.trigger(TrackKey::Key(key), TriggerKind::Add);
        } else if !previous.is_some_and(|previous| previous.same_value(&value)) {
            self.trigger(TrackKey::Key(key), TriggerKind::Set);
        }
        true
    }

    /// Whether a field, index, entry or member exists.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let present = self.inner.raw.has_raw(&key);
        self.track(TrackKey::Key(key));
        present
    }

    /// Delete a field, entry or member; on a sequence this leaves a null
    /// hole. Only announces when something was actually removed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.inner.readonly {
            return self.reject(Diagnostic::ReadonlyDelete { key: key.to_string() });
        }

        let had = self.inner.raw.has_raw(&key);
        let removed = self.inner.raw.delete_raw(&key);
        if had && removed {
            self.trigger(TrackKey::Key(key), TriggerKind::Delete);
        }
        removed
    }

    /// Own keys in iteration order.
    ///
    /// Sequences depend on their length, maps on their key set, records and
    /// sets on their iteration.
    pub fn keys(&self) -> Vec<Key> {
        self.track(self.iteration_key(true));
        self.inner.raw.keys_raw()
    }

    /// Number of fields, items, entries or members.
    pub fn len(&self) -> usize {
        self.track(self.iteration_key(false));
        self.inner.raw.len_raw()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iteration_key(&self, keys_only: bool) -> TrackKey {
        match self.kind() {
            ContainerKind::Sequence => TrackKey::Length,
            ContainerKind::Map if keys_only => TrackKey::MapKeyIterate,
            _ => TrackKey::Iterate,
        }
    }

    /// Entries in iteration order, nested containers wrapped.
    ///
    /// Maps and sets depend on their iteration as a whole. Records and
    /// sequences also depend on every field or index they yield.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        let keys = self.keys_for_iteration();
        match self.kind() {
            ContainerKind::Record | ContainerKind::Sequence => keys
                .into_iter()
                .map(|key| {
                    let value = self.get(key.clone());
                    (key, value)
                })
                .collect(),
            ContainerKind::Map => keys
                .into_iter()
                .map(|key| {
                    let value = self.inner.raw.get_raw(&key).unwrap_or_default();
                    (key, self.wrap(value))
                })
                .collect(),
            ContainerKind::Set => keys
                .into_iter()
                .map(|key| {
                    let value = Value::from(key.clone());
                    (key, value)
                })
                .collect(),
        }
    }

    fn keys_for_iteration(&self) -> Vec<Key> {
        self.track(self.iteration_key(false));
        self.inner.raw.keys_raw()
    }

    /// Values in iteration order.
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Call `f` with every `(value, key)` pair. The container may be mutated
    /// from inside `f`; iteration covers the snapshot taken up front.
    pub fn for_each(&self, mut f: impl FnMut(Value, Key)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    /// Add a member to a set. Announces only when the member is new.
    pub fn add(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.inner.readonly {
            return self.reject(Diagnostic::ReadonlyWrite { key: key.to_string() });
        }

        let had = self.inner.raw.has_raw(&key);
        if self.inner.raw.set_raw(key.clone(), Value::Bool(true)).is_err() {
            return false;
        }
        if !had {
            self.trigger(TrackKey::Key(key), TriggerKind::Add);
        }
        true
    }

    // ------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------

    /// Append an item. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        if self.inner.readonly {
            self.reject(Diagnostic::ReadonlyWrite { key: "push".into() });
            return self.inner.raw.len_raw();
        }

        let _pause = self.inner.runtime.inner.context.pause();
        let len = self.inner.raw.len_raw();
        self.set(len, value);
        self.inner.raw.len_raw()
    }

    /// Remove and return the last item, or null when empty.
    pub fn pop(&self) -> Value {
        if self.inner.readonly {
            self.reject(Diagnostic::ReadonlyWrite { key: "pop".into() });
            return Value::Null;
        }

        let _pause = self.inner.runtime.inner.context.pause();
        let len = self.inner.raw.len_raw();
        if len == 0 {
            return Value::Null;
        }
        let last = self.inner.raw.get_raw(&Key::Index(len - 1)).unwrap_or_default();
        self.set_len(len - 1);
        self.wrap(last)
    }

    /// Insert an item at `index`, shifting later items right.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> bool {
        if self.inner.readonly {
            return self.reject(Diagnostic::ReadonlyWrite { key: index.to_string() });
        }

        let _pause = self.inner.runtime.inner.context.pause();
        let before = self.inner.raw.values_raw();
        if !self.inner.raw.insert_raw(index, value.into()) {
            return false;
        }
        let after = self.inner.raw.values_raw();

        for slot in index..before.len() {
            if !before[slot].same_value(&after[slot]) {
                self.trigger(TrackKey::Key(Key::Index(slot)), TriggerKind::Set);
            }
        }
        self.trigger(TrackKey::Key(Key::Index(before.len())), TriggerKind::Add);
        true
    }

    /// Remove the item at `index`, shifting later items left.
    pub fn remove(&self, index: usize) -> Value {
        if self.inner.readonly {
            self.reject(Diagnostic::ReadonlyDelete { key: index.to_string() });
            return Value::Null;
        }

        let _pause = self.inner.runtime.inner.context.pause();
        let before = self.inner.raw.values_raw();
        let Some(removed) = self.inner.raw.remove_raw(index) else {
            return Value::Null;
        };
        let after = self.inner.raw.values_raw();

        for slot in index..after.len() {
            if !before[slot].same_value(&after[slot]) {
                self.trigger(TrackKey::Key(Key::Index(slot)), TriggerKind::Set);
            }
        }
        self.inner
            .runtime
            .trigger(Mutation::truncate(self.id(), after.len()));
        self.wrap(removed)
    }

    /// Assign the sequence length. Shrinking announces the dropped slots.
    pub fn set_len(&self, len: usize) -> bool {
        if self.inner.readonly {
            return self.reject(Diagnostic::ReadonlyWrite { key: "length".into() });
        }

        match self.inner.raw.resize_raw(len) {
            Some(previous) if previous != len => {
                self.inner.runtime.trigger(Mutation::truncate(self.id(), len));
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Position of the first item that is the same value as `needle`.
    ///
    /// Wrappers and raw containers match each other, so searching for a
    /// value read through a deep wrapper finds the raw item.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        let len = self.len();
        (0..len).find(|&index| self.get(index).same_value(needle))
    }

    pub fn includes(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    /// Read every nested value so the running subscriber depends on all of
    /// them. Containers already visited are skipped.
    pub(crate) fn traverse(&self, seen: &mut HashSet<TargetId>) {
        if !seen.insert(self.id()) {
            return;
        }
        for (_, value) in self.entries() {
            let nested = match value {
                Value::Reactive(reactive) => reactive,
                Value::Object(container) => self.inner.runtime.reactive(&container),
                _ => continue,
            };
            nested.traverse(seen);
        }
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("raw", &self.inner.raw)
            .field("shallow", &self.inner.shallow)
            .field("readonly", &self.inner.readonly)
            .finish()
    }
}
