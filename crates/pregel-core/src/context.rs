//! Per-invocation execution state: context, step records, results, and the
//! two configuration layers (graph-wide defaults vs. per-invoke overrides).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Graph-wide defaults, set once when the driver is built.
///
/// ```
/// use pregel_core::context::EngineConfig;
///
/// let cfg = EngineConfig::default();
/// assert_eq!(cfg.max_steps, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub input_channels: Vec<String>,
    pub output_channels: Vec<String>,
    pub max_steps: u64,
    #[serde(with = "duration_millis_opt")]
    pub timeout: Option<Duration>,
    pub debug: bool,
    pub worker_pool_size: usize,
    pub checkpoint_enabled: bool,
    #[serde(with = "duration_millis_opt")]
    pub checkpoint_interval: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_channels: Vec::new(),
            output_channels: Vec::new(),
            max_steps: 100,
            timeout: Some(Duration::from_secs(300)),
            debug: false,
            worker_pool_size: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            checkpoint_enabled: false,
            checkpoint_interval: None,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON document.
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::Configuration(e.to_string()))
    }

    /// Load from a YAML document.
    pub fn from_yaml(raw: &str) -> EngineResult<Self> {
        serde_yaml::from_str(raw).map_err(|e| EngineError::Configuration(e.to_string()))
    }

    /// Reject structurally unusable configuration before the driver starts.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_steps == 0 {
            return Err(EngineError::GraphValidationFailure(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.worker_pool_size == 0 {
            return Err(EngineError::GraphValidationFailure(
                "worker_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Per-invoke overrides: thread identity, an optional checkpoint to resume
/// from, and free-form tags attached to any checkpoint this invocation
/// saves.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
    pub tags: HashMap<String, String>,
    /// Seed value for [`ExecutionContext::user_context`]. The engine never
    /// interprets this blob; it only round-trips it through checkpoints.
    pub initial_user_context: Option<Value>,
}

/// Record of one completed BSP step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step_number: u64,
    pub executed_nodes: Vec<String>,
    pub dirty_channels: Vec<String>,
    /// Populated only when `EngineConfig::debug` is set.
    pub channel_snapshot: Option<HashMap<String, Value>>,
    #[serde(skip, default = "Instant::now")]
    pub started_at: Instant,
    #[serde(skip)]
    pub duration: Duration,
}

/// Terminal record of one `invoke`. Produced only on the success path: a
/// driver failure (node exhaustion, invalid update, wall-clock timeout,
/// interrupt) is surfaced as `Err(ExecutionFailure)` instead, which carries
/// the same step history alongside the typed [`EngineError`] — see
/// [`ExecutionFailure`].
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Option<Value>,
    pub steps: Vec<ExecutionStep>,
    pub total_duration: Duration,
    pub error: Option<String>,
}

/// The error half of a completed `invoke`: the typed failure plus the full
/// step history recorded up to (and including) the step that failed.
///
/// Kept separate from [`EngineError`] itself so that peer modules (the
/// channel registry, the node builder) can keep returning a bare
/// `EngineError` without carrying history that doesn't exist yet at that
/// layer; only the driver, which actually has a step history to attach,
/// produces this type.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: EngineError,
    pub steps: Vec<ExecutionStep>,
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ExecutionFailure> for EngineError {
    fn from(failure: ExecutionFailure) -> Self {
        failure.error
    }
}

/// Mutable, shared state for one `invoke` call. Cheap to clone: the counters
/// and interrupt flag are `Arc`-backed so a clone handed to a node still
/// observes the same live step number and interrupt signal as the driver.
#[derive(Clone)]
pub struct ExecutionContext {
    pub thread_id: String,
    current_step: Arc<AtomicU64>,
    interrupted: Arc<AtomicBool>,
    pub config: EngineConfig,
    pub start: Instant,
    pub tags: HashMap<String, String>,
    user_context: Arc<RwLock<Value>>,
}

impl ExecutionContext {
    pub fn new(thread_id: impl Into<String>, config: EngineConfig, tags: HashMap<String, String>) -> Self {
        Self::with_user_context(thread_id, config, tags, Value::Null)
    }

    pub fn with_user_context(
        thread_id: impl Into<String>,
        config: EngineConfig,
        tags: HashMap<String, String>,
        user_context: Value,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            current_step: Arc::new(AtomicU64::new(0)),
            interrupted: Arc::new(AtomicBool::new(false)),
            config,
            start: Instant::now(),
            tags,
            user_context: Arc::new(RwLock::new(user_context)),
        }
    }

    /// The opaque, engine-uninterpreted blob a node may use to carry
    /// conversational or session state across steps. Round-tripped through
    /// checkpoints as-is.
    pub fn user_context(&self) -> Value {
        self.user_context.read().clone()
    }

    pub fn set_user_context(&self, value: Value) {
        *self.user_context.write() = value;
    }

    pub fn current_step(&self) -> u64 {
        self.current_step.load(Ordering::SeqCst)
    }

    pub fn set_current_step(&self, step: u64) {
        self.current_step.store(step, Ordering::SeqCst);
    }

    pub fn remaining_steps(&self) -> u64 {
        self.config.max_steps.saturating_sub(self.current_step())
    }

    pub fn is_last_step(&self) -> bool {
        self.remaining_steps() <= 1
    }

    /// Set by [`Self::interrupt`]; checked by the driver at the top of every
    /// step.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Request cancellation. Takes effect at the next step boundary, not
    /// mid-step — nodes already dispatched for the current step still run to
    /// completion (see the parallel executor's "peers run to completion on
    /// failure" rule, which applies symmetrically to interruption).
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn wall_clock_exceeded(&self) -> bool {
        match self.config.timeout {
            Some(timeout) => self.elapsed() >= timeout,
            None => false,
        }
    }
}
