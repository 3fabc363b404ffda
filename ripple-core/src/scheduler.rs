//! Job Scheduler
//!
//! The scheduler batches deferred work into ticks. Enqueuing a job never runs
//! it; the host calls [`Runtime::flush`] at its own event-loop boundary and
//! every job enqueued before that point runs once.
//!
//! # Algorithm
//!
//! 1. `enqueue(id, job)` inserts into an insertion-ordered map keyed by job
//!    identity. Enqueuing an id that is already pending is a no-op, so any
//!    number of triggers within a tick collapse into one run.
//!
//! 2. `flush` pops jobs from the front one at a time, with no borrow held
//!    while a job runs. Jobs enqueued by other jobs during the drain land at
//!    the back and are picked up by the same sweep.
//!
//! 3. A job that is enqueued again after it already ran in the current drain
//!    is parked and becomes pending for the next tick. This keeps a job from
//!    running twice per tick without losing the later request.
//!
//! Order across distinct jobs is first-enqueued-first-run. There are no
//! priorities.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::reactive::{Effect, Runtime, SubscriberId};

/// Identity used to deduplicate jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// A fresh job identity, never shared with any subscriber.
    pub fn new() -> Self {
        Self(SubscriberId::new().raw())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SubscriberId> for JobId {
    fn from(id: SubscriberId) -> Self {
        Self(id.raw())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// A unit of deferred work.
pub type Job = Rc<dyn Fn()>;

/// Pending jobs of one runtime.
#[derive(Default)]
pub(crate) struct JobQueue {
    pending: IndexMap<JobId, Job>,
    /// Jobs that already ran in the drain in progress.
    ran: HashSet<JobId>,
    /// Re-enqueued after running this tick; pending again next tick.
    deferred: IndexMap<JobId, Job>,
    flushing: bool,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting, including those parked for the next tick.
    pub(crate) fn len(&self) -> usize {
        self.pending.len() + self.deferred.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.deferred.clear();
        self.ran.clear();
    }

    /// Add a job unless it is already waiting. Returns whether it was added.
    pub(crate) fn enqueue(&mut self, id: JobId, job: Job) -> bool {
        let slot = if self.flushing && self.ran.contains(&id) {
            &mut self.deferred
        } else {
            &mut self.pending
        };
        if slot.contains_key(&id) {
            return false;
        }
        slot.insert(id, job);
        true
    }

    fn next(&mut self) -> Option<Job> {
        let (id, job) = self.pending.shift_remove_index(0)?;
        self.ran.insert(id);
        Some(job)
    }

    /// End the drain in progress: forget what ran and promote parked jobs.
    fn finish(&mut self) {
        self.flushing = false;
        self.ran.clear();
        let deferred = std::mem::take(&mut self.deferred);
        for (id, job) in deferred {
            self.pending.entry(id).or_insert(job);
        }
    }
}

/// Ends the drain even if a job panics, so the queue stays usable.
struct FlushGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.runtime.inner.queue.borrow_mut().finish();
    }
}

impl Runtime {
    /// Schedule `job` for the next flush. Deduplicated by `id`.
    pub fn queue_job(&self, id: JobId, job: impl Fn() + 'static) {
        let added = self.inner.queue.borrow_mut().enqueue(id, Rc::new(job));
        if added {
            tracing::trace!(%id, "job queued");
        }
    }

    /// Schedule a run of `effect` for the next flush.
    ///
    /// This is the scheduler most render and watch effects use: any number
    /// of triggers before the flush end up as a single run.
    pub fn queue_effect(&self, effect: &Effect) {
        let effect = effect.clone();
        self.queue_job(JobId::from(effect.id()), move || effect.run());
    }

    /// Drain one tick. Returns the number of jobs run.
    ///
    /// Calling `flush` from inside a job is a no-op; the outer drain picks up
    /// whatever that job enqueued.
    pub fn flush(&self) -> usize {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if queue.flushing {
                return 0;
            }
            queue.flushing = true;
        }
        let _guard = FlushGuard { runtime: self };

        let mut count = 0;
        loop {
            let next = self.inner.queue.borrow_mut().next();
            let Some(job) = next else {
                break;
            };
            job();
            count += 1;
        }

        tracing::debug!(jobs = count, "flushed tick");
        count
    }

    /// Flush until no jobs are left. Returns the total number of jobs run.
    ///
    /// Fails with [`Error::FlushLimit`] once `max_flush_ticks` ticks have run
    /// and jobs are still pending.
    pub fn run_until_idle(&self) -> Result<usize> {
        let limit = self.inner.config.max_flush_ticks;
        let mut ticks = 0;
        let mut total = 0;

        while self.has_pending_jobs() {
            if ticks >= limit {
                tracing::error!(ticks, "scheduler did not settle");
                return Err(Error::FlushLimit { ticks });
            }
            total += self.flush();
            ticks += 1;
        }

        Ok(total)
    }

    /// Whether anything is waiting for a flush.
    pub fn has_pending_jobs(&self) -> bool {
        self.inner.queue.borrow().len() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::{Container, EffectOptions, Value};
    use std::cell::{Cell, RefCell};

    #[test]
    fn same_job_three_times_runs_once() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let id = JobId::new();

        for _ in 0..3 {
            let runs = runs.clone();
            rt.queue_job(id, move || runs.set(runs.get() + 1));
        }

        // Nothing runs before the flush
        assert_eq!(runs.get(), 0);
        assert!(rt.has_pending_jobs());

        assert_eq!(rt.flush(), 1);
        assert_eq!(runs.get(), 1);
        assert!(!rt.has_pending_jobs());
    }

    #[test]
    fn jobs_run_in_insertion_order() {
        let rt = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = order.clone();
            rt.queue_job(JobId::new(), move || order.borrow_mut().push(label));
        }
        rt.flush();

        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn jobs_added_during_flush_run_in_same_tick() {
        let rt = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        {
            let rt2 = rt.clone();
            let order = order.clone();
            rt.queue_job(JobId::new(), move || {
                order.borrow_mut().push("first");
                let order = order.clone();
                rt2.queue_job(JobId::new(), move || order.borrow_mut().push("nested"));
            });
        }

        assert_eq!(rt.flush(), 2);
        assert_eq!(*order.borrow(), vec!["first", "nested"]);
    }

    #[test]
    fn requeue_after_run_waits_for_next_tick() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let id = JobId::new();

        fn requeue(rt: Runtime, id: JobId, runs: Rc<Cell<usize>>) {
            let rt2 = rt.clone();
            rt.queue_job(id, move || {
                runs.set(runs.get() + 1);
                if runs.get() < 3 {
                    requeue(rt2.clone(), id, runs.clone());
                }
            });
        }
        requeue(rt.clone(), id, runs.clone());

        assert_eq!(rt.flush(), 1);
        assert_eq!(runs.get(), 1);
        assert!(rt.has_pending_jobs());

        assert_eq!(rt.run_until_idle().unwrap(), 2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn run_until_idle_gives_up() {
        let rt = Runtime::with_config(RuntimeConfig::default().max_flush_ticks(5));
        let id = JobId::new();

        fn forever(rt: Runtime, id: JobId) {
            let rt2 = rt.clone();
            rt.queue_job(id, move || forever(rt2.clone(), id));
        }
        forever(rt.clone(), id);

        let err = rt.run_until_idle().unwrap_err();
        assert!(matches!(err, Error::FlushLimit { ticks: 5 }));
    }

    #[test]
    fn queued_effect_sees_final_state() {
        let rt = Runtime::new();
        let state = rt.reactive(&Container::record([("n", Value::from(0))]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _effect = {
            let state = state.clone();
            let seen = seen.clone();
            let rt2 = rt.clone();
            rt.effect_with(
                move || seen.borrow_mut().push(state.get("n")),
                EffectOptions::default().scheduler(move |effect| rt2.queue_effect(effect)),
            )
        };

        state.set("n", 1);
        state.set("n", 2);
        state.set("n", 3);
        assert_eq!(seen.borrow().len(), 1);

        rt.flush();
        assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(3)]);
    }

    #[test]
    fn panicking_job_leaves_queue_usable() {
        let rt = Runtime::new();
        rt.queue_job(JobId::new(), || panic!("job failed"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| rt.flush()));
        assert!(result.is_err());

        let runs = Rc::new(Cell::new(0));
        {
            let runs = runs.clone();
            rt.queue_job(JobId::new(), move || runs.set(runs.get() + 1));
        }
        assert_eq!(rt.flush(), 1);
        assert_eq!(runs.get(), 1);
    }
}
