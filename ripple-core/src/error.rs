//! Error Types
//!
//! Hard failures of the runtime. Policy violations (writing through a
//! read-only wrapper, emitting an event nobody listens to, ...) are not
//! errors: they are [`Diagnostic`](crate::reactive::Diagnostic)s and the
//! operation degrades gracefully instead.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The job queue kept refilling itself for more ticks than allowed.
    ///
    /// This almost always means two effects write state the other one reads.
    #[error("scheduler did not settle after {ticks} ticks")]
    FlushLimit {
        /// Number of ticks drained before giving up.
        ticks: usize,
    },

    /// A mounted tree node has no host artifact.
    ///
    /// This is an invariant violation inside the reconciler: every node that
    /// went through a mount must carry the host node it produced.
    #[error("tree node has no host artifact while {context}")]
    MissingHostNode {
        /// What the reconciler was doing when the node was found empty.
        context: &'static str,
    },

    /// The runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
