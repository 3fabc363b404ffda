//! Watch Implementation
//!
//! A watch observes a source and calls back with the new and previous value
//! whenever the source changes. It is built on a lazy [`Effect`] whose
//! scheduler is the watch job:
//!
//! 1. Re-evaluate the source (this also re-collects its dependencies).
//! 2. Run the invalidation hook the previous callback registered, if any.
//! 3. Call back with `(new, old, on_invalidate)`.
//! 4. Roll the new value into the old one.
//!
//! Without `immediate`, setup only evaluates the source to capture the
//! initial value; the callback first runs on the first change.
//!
//! The invalidation hook is how callbacks that start long-running work learn
//! that their result went stale: the hook runs right before the next callback
//! and when the watch is stopped.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::container::Reactive;
use super::effect::{Effect, EffectOptions};
use super::runtime::{Runtime, WeakRuntime};
use crate::scheduler::JobId;

/// When a triggered watch job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flush {
    /// Inside the write that triggered it.
    #[default]
    Sync,
    /// On the next scheduler flush, deduplicated with other triggers.
    Tick,
}

/// Options for [`Runtime::watch`] and [`Runtime::watch_reactive`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call back once during setup, with no previous value.
    pub immediate: bool,
    pub flush: Flush,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }
}

type CleanupSlot = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

/// Handed to watch callbacks to register an invalidation hook.
pub struct OnInvalidate {
    slot: CleanupSlot,
}

impl OnInvalidate {
    /// Run `hook` before the next callback, or when the watch stops.
    /// Registering again replaces the previous hook.
    pub fn register(&self, hook: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(hook));
    }
}

fn run_cleanup(slot: &CleanupSlot) {
    let hook = slot.borrow_mut().take();
    if let Some(hook) = hook {
        hook();
    }
}

struct WatchState<T, C> {
    /// Latest source value, written by the effect.
    value: RefCell<Option<T>>,
    old: RefCell<Option<T>>,
    callback: RefCell<C>,
    cleanup: CleanupSlot,
    flush: Flush,
    runtime: WeakRuntime,
}

impl<T, C> WatchState<T, C>
where
    T: Clone + 'static,
    C: FnMut(&T, Option<&T>, &OnInvalidate) + 'static,
{
    /// Route a trigger according to the flush mode.
    fn dispatch(self: &Rc<Self>, effect: &Effect) {
        match self.flush {
            Flush::Sync => self.run_job(effect),
            Flush::Tick => self.defer(effect),
        }
    }

    fn defer(self: &Rc<Self>, effect: &Effect) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let state = self.clone();
        let effect = effect.clone();
        runtime.queue_job(JobId::from(effect.id()), move || state.run_job(&effect));
    }

    fn run_job(self: &Rc<Self>, effect: &Effect) {
        if !effect.is_active() {
            return;
        }
        // Triggered from inside its own callback: go through the queue.
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            tracing::trace!(subscriber = %effect.id(), "re-entrant watch deferred");
            self.defer(effect);
            return;
        };

        effect.run();
        let Some(new) = self.value.borrow().clone() else {
            return;
        };
        let old = self.old.borrow().clone();

        run_cleanup(&self.cleanup);
        let on_invalidate = OnInvalidate {
            slot: self.cleanup.clone(),
        };
        callback(&new, old.as_ref(), &on_invalidate);
        *self.old.borrow_mut() = Some(new);
    }
}

/// Handle to a running watch. Dropping it stops the watch.
#[must_use = "dropping a WatchHandle stops the watch"]
pub struct WatchHandle {
    effect: Effect,
    cleanup: CleanupSlot,
}

impl WatchHandle {
    /// Stop watching and run the pending invalidation hook.
    pub fn stop(&self) {
        self.effect.stop();
        run_cleanup(&self.cleanup);
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

impl Runtime {
    /// Watch the value produced by `getter`. The callback runs on every
    /// trigger of the getter's dependencies, even if the value it produces
    /// compares equal to the previous one.
    pub fn watch<T, G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        T: Clone + 'static,
        G: Fn() -> T + 'static,
        C: FnMut(&T, Option<&T>, &OnInvalidate) + 'static,
    {
        self.watch_with(getter, callback, options)
    }

    /// Watch every nested value reachable from `source`. Any change anywhere
    /// calls back, with the same wrapper as both new and old value.
    pub fn watch_reactive<C>(&self, source: &Reactive, callback: C, options: WatchOptions) -> WatchHandle
    where
        C: FnMut(&Reactive, Option<&Reactive>, &OnInvalidate) + 'static,
    {
        let source = source.clone();
        let getter = move || {
            source.traverse(&mut HashSet::new());
            source.clone()
        };
        self.watch_with(getter, callback, options)
    }

    fn watch_with<T, G, C>(
        &self,
        getter: G,
        callback: C,
        options: WatchOptions,
    ) -> WatchHandle
    where
        T: Clone + 'static,
        G: Fn() -> T + 'static,
        C: FnMut(&T, Option<&T>, &OnInvalidate) + 'static,
    {
        let state = Rc::new(WatchState {
            value: RefCell::new(None),
            old: RefCell::new(None),
            callback: RefCell::new(callback),
            cleanup: Rc::new(RefCell::new(None)),
            flush: options.flush,
            runtime: self.downgrade(),
        });

        let body = {
            let state = state.clone();
            move || {
                let next = getter();
                *state.value.borrow_mut() = Some(next);
            }
        };
        let scheduler = {
            let state = state.clone();
            move |effect: &Effect| state.dispatch(effect)
        };
        let effect = self.effect_with(body, EffectOptions::default().lazy().scheduler(scheduler));

        if options.immediate {
            state.run_job(&effect);
        } else {
            effect.run();
            let initial = state.value.borrow().clone();
            *state.old.borrow_mut() = initial;
        }

        WatchHandle {
            effect,
            cleanup: state.cleanup.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Container, Value};
    use std::cell::Cell;

    fn counter_state(rt: &Runtime) -> Reactive {
        rt.reactive(&Container::record([("count", Value::from(0))]))
    }

    #[test]
    fn watch_is_lazy_by_default() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _watch = {
            let state = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || state.get("count"),
                move |new, old, _| calls.borrow_mut().push((new.clone(), old.cloned())),
                WatchOptions::default(),
            )
        };
        assert!(calls.borrow().is_empty());

        state.set("count", 1);
        assert_eq!(*calls.borrow(), vec![(Value::from(1), Some(Value::from(0)))]);
    }

    #[test]
    fn immediate_calls_back_without_old_value() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _watch = {
            let state = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || state.get("count"),
                move |new, old, _| calls.borrow_mut().push((new.clone(), old.cloned())),
                WatchOptions::default().immediate(),
            )
        };

        assert_eq!(*calls.borrow(), vec![(Value::from(0), None)]);
    }

    #[test]
    fn equal_derived_value_still_calls_back() {
        let rt = Runtime::new();
        let state = rt.reactive(&Container::record([("a", Value::from(1)), ("b", Value::from(2))]));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _watch = {
            let state = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || {
                    state.get("a").as_number().unwrap_or_default() + state.get("b").as_number().unwrap_or_default()
                },
                move |new: &f64, old: Option<&f64>, _| calls.borrow_mut().push((*new, old.copied())),
                WatchOptions::default().flush(Flush::Tick),
            )
        };

        state.set("a", 2);
        state.set("b", 1);
        rt.flush();

        assert_eq!(*calls.borrow(), vec![(3.0, Some(3.0))]);
    }

    #[test]
    fn tick_flush_batches_changes() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _watch = {
            let state = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || state.get("count"),
                move |new, old, _| calls.borrow_mut().push((new.clone(), old.cloned())),
                WatchOptions::default().flush(Flush::Tick),
            )
        };

        state.set("count", 1);
        state.set("count", 2);
        assert!(calls.borrow().is_empty());

        rt.flush();
        assert_eq!(*calls.borrow(), vec![(Value::from(2), Some(Value::from(0)))]);
    }

    #[test]
    fn invalidation_hook_runs_before_next_callback() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let log = Rc::new(RefCell::new(Vec::new()));

        let watch = {
            let state = state.clone();
            let log = log.clone();
            rt.watch(
                move || state.get("count"),
                move |new, _, on_invalidate| {
                    let n = new.as_number().unwrap_or_default();
                    log.borrow_mut().push(format!("run {n}"));
                    let log = log.clone();
                    on_invalidate.register(move || log.borrow_mut().push(format!("expire {n}")));
                },
                WatchOptions::default(),
            )
        };

        state.set("count", 1);
        state.set("count", 2);
        watch.stop();

        assert_eq!(*log.borrow(), vec!["run 1", "expire 1", "run 2", "expire 2"]);
        assert!(!watch.is_active());
    }

    #[test]
    fn watch_reactive_sees_nested_writes() {
        let rt = Runtime::new();
        let inner = Container::record([("x", Value::from(1))]);
        let state = rt.reactive(&Container::record([("inner", Value::from(inner.clone()))]));
        let calls = Rc::new(Cell::new(0));

        let _watch = {
            let calls = calls.clone();
            rt.watch_reactive(&state, move |_, _, _| calls.set(calls.get() + 1), WatchOptions::default())
        };

        rt.reactive(&inner).set("x", 2);
        assert_eq!(calls.get(), 1);

        state.set("extra", true);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn watch_reactive_handles_cycles() {
        let rt = Runtime::new();
        let node = Container::record(Vec::<(&str, Value)>::new());
        node.set_raw("self".into(), Value::from(node.clone())).unwrap();
        let state = rt.reactive(&node);
        let calls = Rc::new(Cell::new(0));

        let _watch = {
            let calls = calls.clone();
            rt.watch_reactive(&state, move |_, _, _| calls.set(calls.get() + 1), WatchOptions::default())
        };

        state.set("n", 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn self_triggering_sync_watch_is_deferred() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let calls = Rc::new(Cell::new(0));

        let _watch = {
            let state = state.clone();
            let writer = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || state.get("count"),
                move |new, _, _| {
                    calls.set(calls.get() + 1);
                    let n = new.as_number().unwrap_or_default();
                    if n < 3.0 {
                        writer.set("count", n + 1.0);
                    }
                },
                WatchOptions::default(),
            )
        };

        state.set("count", 1);
        assert_eq!(calls.get(), 1);

        rt.run_until_idle().unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(state.raw().get_raw(&"count".into()), Some(Value::from(3)));
    }

    #[test]
    fn dropping_handle_stops_watch() {
        let rt = Runtime::new();
        let state = counter_state(&rt);
        let calls = Rc::new(Cell::new(0));

        let watch = {
            let state = state.clone();
            let calls = calls.clone();
            rt.watch(
                move || state.get("count"),
                move |_, _, _| calls.set(calls.get() + 1),
                WatchOptions::default(),
            )
        };
        drop(watch);

        state.set("count", 1);
        assert_eq!(calls.get(), 0);
    }
}
