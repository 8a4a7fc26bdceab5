//! Trust score calculation.
//!
//! Converts customer activity counters into the weight used for their reviews.

use crate::constants::{
    TRUST_FLOOR, TRUST_WEIGHT_FOLLOWERS, TRUST_WEIGHT_LIKES, TRUST_WEIGHT_REVIEWS,
};
use crate::types::TrustScore;

/// Compute a customer's trust score from their activity counters.
///
/// The score is a weighted sum with diminishing returns on each axis:
///
/// ```text
/// trust = 1.0 * ln(1 + review_count)
///       + 0.5 * ln(1 + total_likes)
///       + 1.5 * ln(1 + follower_count)
/// ```
///
/// Each term is non-decreasing in its input and independent of the others, so
/// more reviews, more likes received, or more followers never lower the score.
/// A customer with no activity gets [`TrustScore::FLOOR`] (`0.0`).
///
/// # Example
///
/// ```
/// use tabetti_core::trust::compute_trust_score;
/// use tabetti_core::TrustScore;
///
/// assert_eq!(compute_trust_score(0, 0, 0), TrustScore::FLOOR);
/// assert!(compute_trust_score(1, 0, 0) > TrustScore::FLOOR);
/// assert!(compute_trust_score(3, 10, 2) > compute_trust_score(3, 10, 1));
/// ```
pub fn compute_trust_score(review_count: u64, total_likes: u64, follower_count: u64) -> TrustScore {
    let value = TRUST_FLOOR
        + TRUST_WEIGHT_REVIEWS * diminishing(review_count)
        + TRUST_WEIGHT_LIKES * diminishing(total_likes)
        + TRUST_WEIGHT_FOLLOWERS * diminishing(follower_count);

    // ln_1p of a non-negative finite input is finite and >= 0.
    TrustScore::new(value).unwrap_or(TrustScore::FLOOR)
}

fn diminishing(count: u64) -> f64 {
    (count as f64).ln_1p()
}
