//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Errors raised for caller contract violations and snapshot I/O.
///
/// Numerically undefined inputs (near-zero norms, zero capacity, negative
/// radicands) are not errors: they degrade to `0.0` at the call site.
#[derive(Error, Debug)]
pub enum CoherenceError {
    /// Two inputs that must be index-aligned have different lengths.
    #[error("length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Configuration rejected by [`crate::DiagnosticsConfig::validate`].
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pattern analysis requested on a tensor with no recorded residue.
    #[error("no residue data recorded")]
    NoResidueData,

    /// Tensor shape and data buffer disagree (usually a corrupt snapshot).
    #[error("malformed residue tensor: {0}")]
    MalformedTensor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for coherence-core operations.
pub type Result<T> = std::result::Result<T, CoherenceError>;
