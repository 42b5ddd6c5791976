//! Runtime Configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```json
//! { "flush": "sync", "max_update_count": 50 }
//! ```

use serde::Deserialize;

/// When queued computations are flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Deferred to the next tick, once per batch of mutations.
    #[default]
    Batched,

    /// Flushed as soon as the first computation is queued. Meant for tests.
    Sync,
}

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Flush scheduling mode.
    pub flush: FlushMode,

    /// Enables warnings, the infinite-update-loop guard and id-sorted
    /// notification in sync mode.
    pub debug: bool,

    /// How many times one computation may re-queue itself during a single
    /// flush before the pass is aborted.
    pub max_update_count: usize,

    /// Suppresses warnings even in debug mode.
    pub silent: bool,
}

impl RuntimeConfig {
    pub const MAX_UPDATE_COUNT: usize = 100;

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Debug config with synchronous flushing.
    pub fn sync() -> Self {
        Self {
            flush: FlushMode::Sync,
            debug: true,
            ..Self::default()
        }
    }

    pub fn is_batched(&self) -> bool {
        self.flush == FlushMode::Batched
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush: FlushMode::Batched,
            debug: cfg!(debug_assertions),
            max_update_count: Self::MAX_UPDATE_COUNT,
            silent: false,
        }
    }
}
