//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. Nothing runs on creation. The getter first runs on the first read.
//!
//! 2. Later reads return the cached value as long as nothing the getter read
//!    has changed.
//!
//! 3. When a dependency changes, the computed is only marked dirty and its own
//!    readers are notified. It does not recompute yet.
//!
//! 4. The next read recomputes and caches again.
//!
//! A computed nobody reads never recomputes, no matter how often its inputs
//! change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{Effect, EffectOptions};
use super::runtime::{Runtime, WeakRuntime};
use super::store::{Mutation, TrackKey, TriggerKind};
use super::subscriber::TargetId;

/// A lazily evaluated, cached derived value.
///
/// Cloning a `Computed` creates another handle to the same cache.
pub struct Computed<T: 'static> {
    /// Identity readers track against.
    target: TargetId,
    runtime: WeakRuntime,
    getter: Rc<dyn Fn() -> T>,
    value: Rc<RefCell<Option<T>>>,
    dirty: Rc<Cell<bool>>,
    effect: Effect,
}

impl Runtime {
    /// Create a computed value from `getter`. The getter does not run until
    /// the first [`Computed::get`].
    pub fn computed<T: Clone + 'static>(&self, getter: impl Fn() -> T + 'static) -> Computed<T> {
        let target = TargetId::new();
        let getter: Rc<dyn Fn() -> T> = Rc::new(getter);
        let value = Rc::new(RefCell::new(None));
        let dirty = Rc::new(Cell::new(true));

        let body = {
            let getter = getter.clone();
            let value = value.clone();
            move || {
                let next = getter();
                *value.borrow_mut() = Some(next);
            }
        };

        let scheduler = {
            let dirty = dirty.clone();
            let runtime = self.downgrade();
            move |_: &Effect| {
                if dirty.replace(true) {
                    return;
                }
                if let Some(runtime) = runtime.upgrade() {
                    runtime.trigger(Mutation::new(target, None, TrackKey::Value, TriggerKind::Set));
                }
            }
        };

        let effect = self.effect_with(body, EffectOptions::default().lazy().scheduler(scheduler));

        Computed {
            target,
            runtime: self.downgrade(),
            getter,
            value,
            dirty,
            effect,
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing if a dependency changed since the
    /// last read. Inside an effect, the read is tracked.
    pub fn get(&self) -> T {
        if self.dirty.replace(false) {
            self.effect.run();
        }

        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track(self.target, TrackKey::Value);
        }

        let cached = self.value.borrow().clone();
        match cached {
            Some(value) => value,
            // The runtime is gone, so the effect can no longer run.
            None => (self.getter)(),
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Identity readers of this computed track against.
    pub fn id(&self) -> TargetId {
        self.target
    }

    /// Stop following dependencies. The last cached value stays readable.
    pub fn stop(&self) {
        self.effect.stop();
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            runtime: self.runtime.clone(),
            getter: self.getter.clone(),
            value: self.value.clone(),
            dirty: self.dirty.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("target", &self.target)
            .field("value", &self.value.borrow())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
