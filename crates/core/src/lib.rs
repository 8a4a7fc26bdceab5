//! # Tabetti Core
//!
//! Core types, constants, and trust score calculation for the Tabetti review
//! reputation system.
//!
//! ## Features
//!
//! - **Domain Types**: row ids, ReviewScore, TrustScore, ActivityCounters, Role
//! - **Constants**: review score bounds and trust weights
//! - **Trust**: activity counters to reviewer trust weight

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod trust;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use error::{CoreError, Result};
pub use trust::compute_trust_score;
pub use types::*;
