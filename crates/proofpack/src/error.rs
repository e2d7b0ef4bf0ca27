//! Error types for the Ledger, plus the [`StopRule`] halting signal.

use proofpack_core::{CoreError, EncodingError, ValidationError};
use thiserror::Error;

/// A condition under which the enclosing pipeline must not continue.
///
/// The core never raises this. Orchestration code converts a reported
/// failure into a `StopRule` once it decides the failure is fatal, and
/// callers must propagate it rather than retry.
#[derive(Debug, Error)]
#[error("stoprule: {reason}")]
pub struct StopRule {
    reason: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StopRule {
    /// Halt with a reason and no underlying error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            cause: None,
        }
    }

    /// Halt because of an underlying error.
    pub fn caused_by<E>(reason: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Escalate any error into a [`StopRule`].
pub trait OrStop<T> {
    fn or_stop(self, reason: impl Into<String>) -> std::result::Result<T, StopRule>;
}

impl<T, E> OrStop<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn or_stop(self, reason: impl Into<String>) -> std::result::Result<T, StopRule> {
        self.map_err(|e| StopRule::caused_by(reason, e))
    }
}

/// Errors raised by an emission sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// I/O error writing the receipt.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous writer panicked while holding the sink.
    #[error("sink lock poisoned")]
    Poisoned,
}

/// Errors that can occur during Ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Core error: validation, encoding, or missing algorithm.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Batch exceeds the configured anchoring limit.
    #[error("batch of {size} receipts exceeds limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Processing must halt.
    #[error(transparent)]
    Stop(#[from] StopRule),
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::Core(e.into())
    }
}

impl From<EncodingError> for LedgerError {
    fn from(e: EncodingError) -> Self {
        LedgerError::Core(e.into())
    }
}

impl LedgerError {
    /// Whether this error requires the pipeline to stop.
    ///
    /// A missing hash algorithm is an environment fault no retry can fix,
    /// so it halts as well.
    pub fn is_halting(&self) -> bool {
        matches!(
            self,
            LedgerError::Stop(_) | LedgerError::Core(CoreError::UnavailableAlgorithm(_))
        )
    }
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
