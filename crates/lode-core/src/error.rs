//! Error types for Lode governance operations
//!
//! Every variant aborts the whole invocation: nothing written by the failed
//! transaction reaches the store.

use lode_crypto::CryptoError;
use thiserror::Error;

use crate::types::{Amount, Epoch};

/// Result type alias for governance operations
pub type Result<T> = std::result::Result<T, GovError>;

/// Errors raised by contract entry points
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovError {
    // === Authorization ===
    /// Witness check failed
    #[error("Authorization failure: {0}")]
    AuthorizationFailure(String),

    // === Input ===
    /// Malformed length, type or value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Duplicate id, name, escrow or report
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing record or epoch outside retention
    #[error("Not found: {0}")]
    NotFound(String),

    // === Ledger ===
    /// Debit exceeds the account balance
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    /// Escrow already settled or reclaimed
    #[error("Escrow already resolved: {0}")]
    AlreadyResolved(String),

    /// Cheque amount differs from the escrowed amount
    #[error("Amount mismatch: escrow holds {expected}, cheque claims {got}")]
    AmountMismatch { expected: Amount, got: Amount },

    /// Reclaim attempted before the lock bound
    #[error("Lock active until epoch {until}, current epoch {epoch}")]
    LockActive { until: Epoch, epoch: Epoch },

    // === Epochs ===
    /// Estimation submitted outside the open window
    #[error("Estimation window closed for epoch {epoch}")]
    WindowClosed { epoch: Epoch },

    /// Epoch or version out of order
    #[error("Sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },

    // === Host ===
    /// Write attempted inside a read-only query
    #[error("Write attempted in read-only context")]
    ReadOnly,

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key or signature material rejected
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl GovError {
    /// Numeric code for abort reasons
    pub fn code(&self) -> u32 {
        match self {
            Self::AuthorizationFailure(_) => 2001,
            Self::InvalidArgument(_) => 2002,
            Self::Conflict(_) => 2003,
            Self::NotFound(_) => 2004,
            Self::InsufficientBalance { .. } => 2005,
            Self::WindowClosed { .. } => 2006,
            Self::SequenceViolation { .. } => 2007,
            Self::AlreadyResolved(_) => 2008,
            Self::AmountMismatch { .. } => 2009,
            Self::LockActive { .. } => 2010,
            Self::ReadOnly => 2011,
            Self::Serialization(_) => 2012,
            Self::Crypto(_) => 2013,
        }
    }

    /// Whether resubmitting the same transaction later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::LockActive { .. }
                | Self::NotFound(_)
                | Self::SequenceViolation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GovError::AuthorizationFailure("x".into()).code(), 2001);
        assert_eq!(GovError::WindowClosed { epoch: 3 }.code(), 2006);
        assert_eq!(GovError::from(CryptoError::VerificationFailed).code(), 2013);
    }

    #[test]
    fn test_error_display() {
        let err = GovError::SequenceViolation { expected: 2, got: 4 };
        let msg = format!("{}", err);
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 4"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GovError::LockActive { until: 5, epoch: 2 }.is_retryable());
        assert!(!GovError::Conflict("dup".into()).is_retryable());
        assert!(!GovError::AuthorizationFailure("x".into()).is_retryable());
    }
}
