//! Error taxonomy for the optimizer core. See `spec.md` / `SPEC_FULL.md` §7.

use thiserror::Error;

/// The single error type returned by every fallible core operation.
///
/// Propagation follows a fixed rule: the collector swallows `Transient` and
/// `NotFound` (logs only, the tick continues); the analyzer and facade
/// propagate every kind to their callers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    /// A deployment, pod, or HPA the caller asked about does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Fewer than `MinimumDataPoints` points were available for the
    /// requested window.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The cluster telemetry port failed in a way that may succeed on a
    /// later call (network blip, API server momentarily unavailable).
    #[error("transient: {0}")]
    Transient(String),

    /// Construction-time rejection of an `OptimizerConfig`.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// `Collector::start` was called while already running.
    #[error("already running")]
    AlreadyRunning,

    /// `Collector` lifecycle operation attempted while not running.
    #[error("not running")]
    NotRunning,

    /// Bug-class failure; surfaces with a stable identifier for log
    /// correlation without leaking internal detail to the caller.
    #[error("internal error [{id}]: {message}")]
    Internal { id: String, message: String },
}

impl OptimizerError {
    /// Builds an `Internal` error with a short, opaque correlation id.
    pub fn internal(message: impl Into<String>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let id: String = id.chars().take(8).collect();
        OptimizerError::Internal {
            id,
            message: message.into(),
        }
    }

    /// True for the two kinds the collector is allowed to swallow per tick.
    pub fn is_swallowable(&self) -> bool {
        matches!(self, OptimizerError::Transient(_) | OptimizerError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
