//! Process Runtime Configuration Module
//!
//! Provides global process-control configuration loaded from TOML files,
//! replacing every hardcoded threshold spec.md names with an
//! operator-tunable value.
//!
//! ## Loading Order
//!
//! 1. `FLUIDICS_CONFIG` environment variable (path to TOML file)
//! 2. `process_config.toml` in the current working directory
//! 3. Built-in defaults (matching spec.md's documented values)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(ProcessRuntimeConfig::load());
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().alarms.over_pressure_psi;
//! ```
//!
//! Config is stored behind an [`arc_swap::ArcSwap`] rather than a plain
//! `OnceLock` so [`watcher`] can hot-swap it when the backing file changes
//! without readers ever observing a torn value.

mod process_config;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use process_config::*;

use arc_swap::ArcSwap;
use std::sync::OnceLock;

static PROCESS_CONFIG: OnceLock<ArcSwap<ProcessRuntimeConfig>> = OnceLock::new();

/// Initialize the global process configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: ProcessRuntimeConfig) {
    if PROCESS_CONFIG.set(ArcSwap::from_pointee(config)).is_err() {
        tracing::warn!("config::init() called more than once - ignoring");
    }
}

/// Get a snapshot of the current process configuration.
///
/// Panics if `init()` has not been called. This is by design - a missing
/// config is a fatal startup error, not a recoverable condition.
pub fn get() -> arc_swap::Guard<std::sync::Arc<ProcessRuntimeConfig>> {
    PROCESS_CONFIG
        .get()
        .expect("config::get() called before config::init() - this is a startup bug")
        .load()
}

/// Replace the live configuration, e.g. after a validated file reload.
pub fn reload(config: ProcessRuntimeConfig) {
    if let Some(cell) = PROCESS_CONFIG.get() {
        cell.store(std::sync::Arc::new(config));
    }
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PROCESS_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_is_observed_by_subsequent_get() {
        // Each test module gets its own OnceLock instance only at the crate
        // level, so this test exercises init/get/reload against whatever
        // state earlier tests in this binary left behind - use is_initialized
        // to make the test robust to ordering.
        if !is_initialized() {
            init(ProcessRuntimeConfig::default());
        }
        let mut custom = ProcessRuntimeConfig::default();
        custom.alarms.over_pressure_psi = 99.0;
        reload(custom);
        assert_eq!(get().alarms.over_pressure_psi, 99.0);
    }
}
