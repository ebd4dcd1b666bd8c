//! Engine configuration: ambient resource limits plus runtime tuning,
//! loaded from TOML via `serde`.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

fn default_quiescence_timeout_secs() -> u64 {
    5
}

fn default_max_spans_per_trace() -> usize {
    100_000
}

fn default_worker_count() -> usize {
    4
}

fn default_compile_cache_capacity() -> usize {
    1024
}

fn default_ingest_queue_capacity() -> usize {
    10_000
}

/// Process-wide tunables. Everything here
/// has a sane default so a config file only needs to override what differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long the assembler waits for a trace to go quiet before flushing
    /// it for evaluation.
    #[serde(default = "default_quiescence_timeout_secs")]
    pub quiescence_timeout_secs: u64,

    /// Hard cap on spans buffered per trace before a forced, truncated
    /// flush.
    #[serde(default = "default_max_spans_per_trace")]
    pub max_spans_per_trace: usize,

    /// Number of worker threads evaluating flushed traces.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum number of compiled rule ASTs kept in the LRU cache.
    #[serde(default = "default_compile_cache_capacity")]
    pub compile_cache_capacity: usize,

    /// Bound on the ingest queue; exceeding it yields `OVERLOADED`.
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,

    /// HMAC signing secret for the violation store. Loaded from config only
    /// in tests/local runs; production deployments should source this from
    /// an environment variable or secret manager instead.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiescence_timeout_secs: default_quiescence_timeout_secs(),
            max_spans_per_trace: default_max_spans_per_trace(),
            worker_count: default_worker_count(),
            compile_cache_capacity: default_compile_cache_capacity(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
            signing_secret: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| EngineError::Validation(format!("invalid config: {e}")))
    }

    pub fn quiescence_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.quiescence_timeout_secs)
    }
}
