//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a container is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each runtime owns a stack of running subscribers. When an effect starts a
//! run we push it, when the run completes the guard pops it. Nested runs (a
//! computed read from inside an effect) therefore attribute reads to the
//! innermost subscriber.
//!
//! Tracking can also be paused. Bulk sequence operations pause it so their
//! internal reads do not subscribe whoever happens to be running.

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use super::effect::EffectInner;
use super::subscriber::SubscriberId;

/// An entry in the reactive context stack.
#[derive(Clone)]
pub(crate) struct ContextEntry {
    /// The subscriber ID of the running computation.
    pub(crate) subscriber_id: SubscriberId,
    /// The computation itself, so reads can record their dependency set on it.
    pub(crate) effect: Weak<EffectInner>,
}

/// Stack of running subscribers plus the tracking pause depth.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: RefCell<Vec<ContextEntry>>,
    paused: Cell<usize>,
}

impl ContextStack {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is exited when the returned guard is dropped, which also
    /// happens when the computation panics. A pause in effect outside does not
    /// apply inside; it is restored on exit.
    pub(crate) fn enter(&self, subscriber_id: SubscriberId, effect: Weak<EffectInner>) -> ContextGuard<'_> {
        self.entries.borrow_mut().push(ContextEntry {
            subscriber_id,
            effect,
        });

        ContextGuard {
            stack: self,
            subscriber_id,
            paused: self.paused.replace(0),
        }
    }

    /// Enter a context that belongs to no subscriber. Reads inside it are not
    /// recorded, and writes inside it reach every subscriber, including the
    /// one running outside.
    pub(crate) fn detach(&self) -> ContextGuard<'_> {
        self.enter(SubscriberId::new(), Weak::new())
    }

    /// Pause tracking until the returned guard is dropped. Pauses nest.
    pub(crate) fn pause(&self) -> PauseGuard<'_> {
        self.paused.set(self.paused.get() + 1);
        PauseGuard { stack: self }
    }

    /// Whether reads should currently be recorded.
    pub(crate) fn is_tracking(&self) -> bool {
        self.paused.get() == 0 && !self.entries.borrow().is_empty()
    }

    /// The innermost running subscriber, if any.
    pub(crate) fn current(&self) -> Option<ContextEntry> {
        self.entries.borrow().last().cloned()
    }

    /// The innermost running subscriber ID, if any.
    pub(crate) fn current_subscriber(&self) -> Option<SubscriberId> {
        self.entries.borrow().last().map(|entry| entry.subscriber_id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.paused.set(0);
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ContextGuard<'a> {
    stack: &'a ContextStack,
    subscriber_id: SubscriberId,
    paused: usize,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.entries.borrow_mut().pop();
        self.stack.paused.set(self.paused);

        // Catch mismatched enter/exit pairs.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, entry.subscriber_id
            );
        }
    }
}

/// Guard that resumes tracking when dropped.
pub(crate) struct PauseGuard<'a> {
    stack: &'a ContextStack,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.stack.paused.set(self.stack.paused.get().saturating_sub(1));
    }
}
