//! Error types for the ProofPack core.

use thiserror::Error;

/// Core errors that can occur while building, hashing, or anchoring receipts.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A hash algorithm required by a config or manifest is not part of this build.
    #[error("hash algorithm unavailable: {0}")]
    UnavailableAlgorithm(String),
}

/// Malformed or missing input. The caller fixes the call and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("receipt_type must be a non-empty string")]
    EmptyReceiptType,

    #[error("tenant_id must be a non-empty string")]
    EmptyTenantId,

    #[error("payload key {0:?} collides with a reserved receipt field")]
    ReservedField(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed digest: {0}")]
    MalformedDigest(String),

    #[error("index {index} out of range for batch of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("payload hash does not match payload")]
    PayloadHashMismatch,

    #[error("receipt tenant {found:?} does not match batch tenant {expected:?}")]
    TenantMismatch { expected: String, found: String },
}

/// A value has no canonical serialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("non-finite float has no canonical form: {0}")]
    NonFiniteFloat(f64),

    #[error("map keys must be strings, got {0} key")]
    NonStringKey(&'static str),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CoreError {
    /// The validation error inside, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            CoreError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
