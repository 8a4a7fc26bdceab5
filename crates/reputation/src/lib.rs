//! Review/follow storage and trust maintenance for Tabetti.
//!
//! This crate provides:
//! - SQLite storage for accounts, stores, reviews, likes and follows
//! - Trust score maintenance, run on the same transaction as each mutation
//! - Store rating reads (simple and trust-weighted means, ranking)
//! - Batch recompute and drift audit of customer trust state
//! - TOML configuration for the operator CLI
//!
//! # Data flow
//!
//! ```text
//!   post_review / delete_review / like / follow / unfollow
//!                      │
//!            ┌─────────▼─────────┐
//!            │  SQLite txn       │
//!            │  1. mutate rows   │
//!            │  2. maintainer    │ ← recount affected axis,
//!            │     ::apply       │   compute_trust_score
//!            │  3. commit        │
//!            └─────────┬─────────┘
//!                      │ customers.trust_score
//!            ┌─────────▼─────────┐
//!            │  rating reads     │ ← tabetti-engine::aggregate
//!            └───────────────────┘
//!
//!   recompute_all_trust_scores: page customers, recount all axes,
//!   one transaction per customer
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod maintainer;
pub mod rating;
pub mod reconcile;
pub mod storage;

pub use maintainer::{Maintenance, RecountScope, SkipReason, TrustEvent};
pub use rating::RatingContext;
pub use reconcile::{CounterDrift, RecomputeFailure, RecomputeReport};
pub use storage::Storage;
