//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive state it
//! read during its previous run changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazy, the effect runs immediately to collect its first
//!    set of dependencies.
//!
//! 2. Every run first leaves every dependency set it joined last time, then
//!    runs with itself on top of the runtime's context stack. Dependencies
//!    are therefore exactly what the latest run read, which keeps branches
//!    that stopped being taken from waking the effect up.
//!
//! 3. When a dependency changes, the effect is handed to its scheduler if it
//!    has one, or re-run on the spot otherwise. The scheduler is the only
//!    place where deferral happens; effects know nothing about ticks.
//!
//! # Lifetime
//!
//! The runtime only holds effects weakly. Dropping the last `Effect` handle
//! detaches it from every dependency set, the same as calling [`Effect::stop`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::runtime::{Runtime, WeakRuntime};
use super::store::DepSet;
use super::subscriber::SubscriberId;

/// Custom scheduler: receives the triggered effect instead of it being run.
pub type SchedulerFn = Rc<dyn Fn(&Effect)>;

/// Options for [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Called instead of running the effect when a dependency changes.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

pub(crate) struct EffectInner {
    pub(crate) id: SubscriberId,
    runtime: WeakRuntime,
    body: Box<dyn Fn()>,
    /// Every dependency set this effect joined during its last run.
    pub(crate) deps: RefCell<SmallVec<[DepSet; 4]>>,
    scheduler: Option<SchedulerFn>,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    /// Leave every dependency set.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for set in deps {
            set.borrow_mut().shift_remove(&self.id);
        }
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.cleanup();
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.unregister(self.id);
        }
    }
}

/// A re-runnable computation whose dependencies are collected automatically.
///
/// Cloning an `Effect` creates another handle to the same computation.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the computation now, collecting a fresh set of dependencies.
    pub fn run(&self) {
        if self.inner.stopped.get() {
            return;
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };

        self.inner.cleanup();
        let _ctx = runtime
            .inner
            .context
            .enter(self.inner.id, Rc::downgrade(&self.inner));
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        (self.inner.body)();
    }

    /// A dependency changed: defer to the scheduler, or run immediately.
    pub(crate) fn notify(&self) {
        if self.inner.stopped.get() {
            return;
        }
        match &self.inner.scheduler {
            Some(scheduler) => scheduler(self),
            None => self.run(),
        }
    }

    /// Detach from every dependency and never run again.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        self.inner.cleanup();
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.unregister(self.inner.id);
        }
    }

    /// Whether the effect can still run.
    pub fn is_active(&self) -> bool {
        !self.inner.stopped.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependency sets the effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Whether both handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Runtime {
    /// Create an effect that runs now and again whenever what it read changes.
    #[must_use = "dropping an Effect detaches it"]
    pub fn effect(&self, body: impl Fn() + 'static) -> Effect {
        self.effect_with(body, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    #[must_use = "dropping an Effect detaches it"]
    pub fn effect_with(&self, body: impl Fn() + 'static, options: EffectOptions) -> Effect {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            runtime: self.downgrade(),
            body: Box::new(body),
            deps: RefCell::new(SmallVec::new()),
            scheduler: options.scheduler,
            stopped: Cell::new(false),
            run_count: Cell::new(0),
        });
        self.register(&inner);

        let effect = Effect::from_inner(inner);
        if !options.lazy {
            effect.run();
        }
        effect
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
