//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple UI framework.
//! It implements:
//!
//! - Fine-grained reactive state (containers, effects, computed values,
//!   watches)
//! - A deduplicating job scheduler that batches updates into ticks
//! - Keyed tree reconciliation with minimal host moves
//! - A component model driven by render effects
//!
//! Everything is single-threaded. A [`Runtime`](reactive::Runtime) owns the
//! dependency store, the active subscriber stack and the job queue; handles
//! created from it are `!Send`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: reactive containers and dependency tracking
//! - `scheduler`: the job queue and its flush loop
//! - `render`: tree snapshots, reconciliation and components
//! - `config`: runtime limits and switches
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use ripple_core::reactive::{Container, Runtime, Value};
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(&Container::record([("count", Value::from(1))]));
//!
//! // Derived value
//! let doubled = {
//!     let state = state.clone();
//!     rt.computed(move || state.get("count").as_number().unwrap_or(0.0) * 2.0)
//! };
//!
//! // Effect that re-runs whenever `count` changes
//! let seen = Rc::new(Cell::new(0.0));
//! let _effect = {
//!     let seen = seen.clone();
//!     let doubled = doubled.clone();
//!     rt.effect(move || seen.set(doubled.get()))
//! };
//! assert_eq!(seen.get(), 2.0);
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 10.0);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use scheduler::JobId;
