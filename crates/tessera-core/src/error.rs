//! Error types for Tessera arithmetic

use thiserror::Error;

/// Result type for core arithmetic operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised at the boundary of field and curve arithmetic.
///
/// In-range arithmetic never fails; these only surface when decoding or
/// constructing values from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Scalar, coordinate or encoding outside its valid range
    #[error("Malformed {what}: {reason}")]
    MalformedInput { what: &'static str, reason: String },

    /// Attempted to invert zero
    #[error("Element is not invertible")]
    NotInvertible,

    /// Duplicate or missing participant index in an interpolation set
    #[error("Invalid interpolation set: {0}")]
    InvalidInterpolationSet(String),
}

impl CoreError {
    pub(crate) fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        CoreError::MalformedInput {
            what,
            reason: reason.into(),
        }
    }
}
