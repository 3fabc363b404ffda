//! Runtime Configuration
//!
//! A [`RuntimeConfig`] is handed to [`Runtime::with_config`](crate::reactive::Runtime::with_config).
//! It can be built in code or parsed from JSON; missing fields fall back to
//! their defaults.

use serde::Deserialize;

use crate::error::Result;

/// Default upper bound on scheduler ticks drained by `run_until_idle`.
pub const DEFAULT_MAX_FLUSH_TICKS: usize = 100;

/// Tunables for a reactive runtime instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many ticks `Runtime::run_until_idle` drains before reporting
    /// `Error::FlushLimit`.
    pub max_flush_ticks: usize,

    /// Keep emitted diagnostics in memory so they can be inspected with
    /// `Runtime::take_diagnostics`. They are logged either way.
    pub record_diagnostics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_ticks: DEFAULT_MAX_FLUSH_TICKS,
            record_diagnostics: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Set the flush tick limit.
    pub fn max_flush_ticks(mut self, ticks: usize) -> Self {
        self.max_flush_ticks = ticks;
        self
    }

    /// Enable or disable in-memory diagnostics.
    pub fn record_diagnostics(mut self, record: bool) -> Self {
        self.record_diagnostics = record;
        self
    }
}
