//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, PartialEq)]
pub enum CoreError {
    /// Review score outside the 1-5 star range.
    #[error("Invalid review score: {0} (must be between 1 and 5)")]
    InvalidReviewScore(i64),

    /// Trust score that is negative, NaN, or infinite.
    #[error("Invalid trust score: {0} (must be finite and >= 0)")]
    InvalidTrustScore(f64),

    /// Activity counter read back negative from storage.
    #[error("Invalid activity counter {name}: {value} (must be >= 0)")]
    InvalidCounter {
        /// Counter name.
        name: &'static str,
        /// Offending value.
        value: i64,
    },

    /// Unknown account role tag.
    #[error("Invalid account role: {0:?}")]
    InvalidRole(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
