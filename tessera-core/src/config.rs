//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the engine state. A thread
//! that never installs one uses [`RuntimeConfig::default`].
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{ "diff": "double-ended" }"#)?;
//! config.install();
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Keyed-children diff algorithm used by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffStrategy {
    /// Four-pointer comparison from both ends.
    DoubleEnded,
    /// Prefix/suffix trimming plus longest increasing subsequence.
    #[default]
    Fast,
}

/// Tunables for the reactive engine and the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Times a single job may re-queue itself within one flush before it is
    /// dropped.
    pub max_job_recursion: usize,
    /// Log rejected writes to read-only views.
    pub warn_on_readonly_write: bool,
    /// Children diff algorithm.
    pub diff: DiffStrategy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_job_recursion: 100,
            warn_on_readonly_write: true,
            diff: DiffStrategy::default(),
        }
    }
}

thread_local! {
    static CURRENT: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Make this the configuration of the current thread.
    pub fn install(self) {
        tracing::debug!(config = ?self, "installing runtime config");
        CURRENT.with(|current| *current.borrow_mut() = self);
    }
}

/// The configuration of the current thread.
pub fn current() -> RuntimeConfig {
    CURRENT.with(|current| current.borrow().clone())
}
