//! Canonical constants for Tabetti.
//!
//! The trust weights are part of the persisted state: changing them changes
//! every stored `trust_score`, so a change must be followed by a full
//! `recompute-trust` run.

/// Lowest star rating a review can carry.
pub const MIN_REVIEW_SCORE: u8 = 1;

/// Highest star rating a review can carry.
pub const MAX_REVIEW_SCORE: u8 = 5;

/// Weight applied to `ln(1 + review_count)`.
pub const TRUST_WEIGHT_REVIEWS: f64 = 1.0;

/// Weight applied to `ln(1 + total_likes)`.
pub const TRUST_WEIGHT_LIKES: f64 = 0.5;

/// Weight applied to `ln(1 + follower_count)`.
pub const TRUST_WEIGHT_FOLLOWERS: f64 = 1.5;

/// Trust score of a customer with no activity at all.
pub const TRUST_FLOOR: f64 = 0.0;
