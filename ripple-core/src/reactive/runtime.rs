//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects containers, effects,
//! computed values and the job queue. It owns the dependency store and
//! decides who re-runs when state changes.
//!
//! # How It Works
//!
//! 1. When an effect runs, it is pushed onto the runtime's context stack.
//!
//! 2. When a reactive container is read, the runtime records the innermost
//!    running effect against `(container, key)`.
//!
//! 3. When a reactive container is written, the runtime:
//!    a. Collects every subscriber affected by the mutation
//!    b. Skips the subscriber that is currently running
//!    c. Hands each one to its scheduler, or runs it on the spot
//!
//! # Ownership
//!
//! A `Runtime` is a cheap handle; clones share state. Nothing is global, so
//! several runtimes can live side by side (one per application instance, or
//! one per test). The runtime is single-threaded by contract: it is built on
//! `Rc`/`RefCell` and is neither `Send` nor `Sync`, so no locking is needed.
//!
//! The registry holds subscribers weakly. Dropping the last handle to an
//! effect detaches it; the runtime never keeps computations alive on its own.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::container::ReactiveInner;
use super::context::ContextStack;
use super::diagnostic::Diagnostic;
use super::effect::{Effect, EffectInner};
use super::store::{DependencyStore, Mutation, TrackKey};
use super::subscriber::{SubscriberId, TargetId};
use crate::config::RuntimeConfig;
use crate::scheduler::JobQueue;

/// Identity-keyed cache of deep wrappers.
pub(crate) type WrapperCache = RefCell<HashMap<TargetId, Weak<ReactiveInner>>>;

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) store: RefCell<DependencyStore>,
    pub(crate) context: ContextStack,
    pub(crate) registry: RefCell<HashMap<SubscriberId, Weak<EffectInner>>>,
    pub(crate) reactive_cache: WrapperCache,
    pub(crate) readonly_cache: WrapperCache,
    pub(crate) queue: RefCell<JobQueue>,
    pub(crate) diagnostics: RefCell<Vec<Diagnostic>>,
}

/// Handle to a reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// Non-owning handle to a runtime.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                store: RefCell::new(DependencyStore::default()),
                context: ContextStack::default(),
                registry: RefCell::new(HashMap::new()),
                reactive_cache: RefCell::new(HashMap::new()),
                readonly_cache: RefCell::new(HashMap::new()),
                queue: RefCell::new(JobQueue::new()),
                diagnostics: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a subscriber so triggers can find it by ID.
    pub(crate) fn register(&self, effect: &Rc<EffectInner>) {
        self.inner
            .registry
            .borrow_mut()
            .insert(effect.id, Rc::downgrade(effect));
    }

    /// Forget a subscriber.
    pub(crate) fn unregister(&self, id: SubscriberId) {
        if let Ok(mut registry) = self.inner.registry.try_borrow_mut() {
            registry.remove(&id);
        }
    }

    /// Record that the running subscriber read `(target, key)`.
    ///
    /// A no-op outside of any subscriber or while tracking is paused.
    pub(crate) fn track(&self, target: TargetId, key: TrackKey) {
        if !self.inner.context.is_tracking() {
            return;
        }
        let Some(entry) = self.inner.context.current() else {
            return;
        };
        let Some(effect) = entry.effect.upgrade() else {
            return;
        };

        let set = self.inner.store.borrow_mut().dep_set(target, key);
        let inserted = set.borrow_mut().insert(entry.subscriber_id);
        if inserted {
            tracing::trace!(subscriber = %entry.subscriber_id, %target, "track");
            effect.deps.borrow_mut().push(set);
        }
    }

    /// Announce a mutation and re-run everything that depends on it.
    ///
    /// The subscriber that is currently running is never re-entered, so an
    /// effect that writes state it also reads does not loop on itself.
    pub(crate) fn trigger(&self, mutation: Mutation) {
        let active = self.inner.context.current_subscriber();
        let ids = self.inner.store.borrow().collect(&mutation);
        if ids.is_empty() {
            return;
        }

        tracing::trace!(
            target = %mutation.target,
            kind = ?mutation.kind,
            subscribers = ids.len(),
            "trigger"
        );

        let effects: Vec<Effect> = {
            let registry = self.inner.registry.borrow();
            ids.into_iter()
                .filter(|id| Some(*id) != active)
                .filter_map(|id| registry.get(&id).and_then(Weak::upgrade))
                .map(Effect::from_inner)
                .collect()
        };

        for effect in effects {
            effect.notify();
        }
    }

    /// The innermost running subscriber, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_subscriber()
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_tracking()
    }

    /// Run `f` without recording any of its reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.inner.context.pause();
        f()
    }

    /// Run `f` as if no subscriber were running: nothing is tracked, and
    /// writes notify the subscriber that is running outside as well.
    pub(crate) fn detached<R>(&self, f: impl FnOnce() -> R) -> R {
        let _detached = self.inner.context.detach();
        f()
    }

    /// Report a tolerated policy violation.
    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(%diagnostic, "ripple diagnostic");
        if self.inner.config.record_diagnostics {
            self.inner.diagnostics.borrow_mut().push(diagnostic);
        }
    }

    /// Drain the recorded diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.diagnostics.borrow_mut())
    }

    /// Number of subscribers recorded for `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &TrackKey) -> usize {
        self.inner.store.borrow().subscriber_count(target, key)
    }

    /// Number of live subscribers known to the runtime.
    pub fn live_subscribers(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Full teardown: forget every dependency, wrapper and pending job.
    ///
    /// Existing handles keep working as plain values but nothing they do
    /// reaches subscribers registered before the teardown.
    pub fn dispose(&self) {
        tracing::debug!("disposing runtime");
        self.inner.store.borrow_mut().clear();
        self.inner.registry.borrow_mut().clear();
        self.inner.reactive_cache.borrow_mut().clear();
        self.inner.readonly_cache.borrow_mut().clear();
        self.inner.queue.borrow_mut().clear();
        self.inner.diagnostics.borrow_mut().clear();
        if self.inner.context.depth() == 0 {
            self.inner.context.clear();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("targets", &self.inner.store.borrow().target_count())
            .field("subscribers", &self.live_subscribers())
            .field("pending_jobs", &self.inner.queue.borrow().len())
            .finish()
    }
}
