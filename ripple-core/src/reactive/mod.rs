//! Reactive Primitives
//!
//! This module implements the reactive state engine: observable containers,
//! effects, computed values and watches. These primitives drive every render
//! update in Ripple.
//!
//! # Concepts
//!
//! ## Reactive containers
//!
//! A [`Reactive`] wraps a plain [`Container`] (record, sequence, map or set).
//! When it is read inside a running effect, the read is recorded as a
//! dependency of that effect. When it is written, every effect that read the
//! written location re-runs.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as a host rendering tree.
//!
//! ## Computed values
//!
//! A [`Computed`] is a derived value that caches its result and recomputes
//! only when read after one of its dependencies changed.
//!
//! ## Watches
//!
//! A watch calls back with the new and previous value of a source whenever it
//! changes, with a hook for invalidating work started by the previous call.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: every read consults the runtime's
//! context stack to find the running effect. There is no global state; each
//! [`Runtime`] owns its dependency store, context stack and job queue.

mod computed;
mod container;
mod context;
mod diagnostic;
mod effect;
mod runtime;
mod store;
mod subscriber;
mod value;
mod watch;

pub use computed::Computed;
pub use container::Reactive;
pub use diagnostic::Diagnostic;
pub use effect::{Effect, EffectOptions, SchedulerFn};
pub use runtime::{Runtime, WeakRuntime};
pub use store::{TrackKey, TriggerKind};
pub use subscriber::{SubscriberId, TargetId};
pub use value::{Container, ContainerKind, Key, Value};
pub use watch::{Flush, OnInvalidate, WatchHandle, WatchOptions};
