//! Tabetti rating engine.
//!
//! This crate implements the read-side rating rules:
//! - Simple mean: `sum(score) / count`, undefined for a store without reviews
//! - Weighted mean: `sum(score * trust) / sum(trust)`, undefined when every
//!   contributing reviewer has zero trust
//! - Ranking: stores with a weighted mean first, then stores rated only by
//!   zero-trust reviewers, then unrated stores; within a tier by mean, then
//!   review count, then store id

use serde::Serialize;
use std::cmp::Ordering;
use tabetti_core::types::{ReviewScore, StoreId, TrustScore};

/// One review as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatedReview {
    /// Star rating.
    pub score: ReviewScore,
    /// Reviewer's current trust score (floor for anonymous reviews).
    pub trust: TrustScore,
}

/// Aggregated rating for one store.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RatingSummary {
    /// Unweighted mean, `None` without reviews.
    pub simple_average: Option<f64>,
    /// Trust-weighted mean, `None` when the total weight is zero.
    pub weighted_average: Option<f64>,
    /// Number of reviews considered.
    pub review_count: u64,
}

impl RatingSummary {
    /// Build a summary from pre-summed totals (e.g. a SQL `GROUP BY`).
    ///
    /// `weighted_sum` is `sum(score * trust)` and `weight_total` is
    /// `sum(trust)` over the same reviews.
    pub fn from_totals(
        review_count: u64,
        score_sum: u64,
        weighted_sum: f64,
        weight_total: f64,
    ) -> Self {
        let simple_average = (review_count > 0).then(|| score_sum as f64 / review_count as f64);
        let weighted_average = (weight_total > 0.0).then(|| weighted_sum / weight_total);

        RatingSummary {
            simple_average,
            weighted_average,
            review_count,
        }
    }

    /// Value used for display: weighted mean, else simple mean.
    pub fn headline(&self) -> Option<f64> {
        self.weighted_average.or(self.simple_average)
    }

    /// Ranking tier: 0 with a weighted mean, 1 with only a simple mean,
    /// 2 without reviews.
    fn tier(&self) -> u8 {
        match (self.weighted_average, self.simple_average) {
            (Some(_), _) => 0,
            (None, Some(_)) => 1,
            (None, None) => 2,
        }
    }
}

/// Compute simple and trust-weighted means over a store's reviews.
pub fn aggregate(reviews: &[RatedReview]) -> RatingSummary {
    let mut score_sum: u64 = 0;
    let mut weighted_sum = 0.0f64;
    let mut weight_total = 0.0f64;

    for review in reviews {
        let score = review.score.value();
        score_sum += score as u64;
        weighted_sum += score as f64 * review.trust.value();
        weight_total += review.trust.value();
    }

    RatingSummary::from_totals(reviews.len() as u64, score_sum, weighted_sum, weight_total)
}

/// A store with its position-defining rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedStore {
    /// Store id.
    pub store_id: StoreId,
    /// The store's rating summary.
    pub summary: RatingSummary,
}

/// Order stores best-first.
///
/// Stores with a trust-weighted mean always rank above stores whose reviews
/// all carry zero trust, which in turn rank above stores without reviews.
/// Within a tier stores order by headline rating, then by review count, then
/// by lower store id, so the order is total and stable across runs.
pub fn rank_stores(mut stores: Vec<RankedStore>) -> Vec<RankedStore> {
    stores.sort_by(compare_ranked);
    stores
}

fn compare_ranked(a: &RankedStore, b: &RankedStore) -> Ordering {
    let by_rating = match (a.summary.headline(), b.summary.headline()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        _ => Ordering::Equal,
    };

    a.summary
        .tier()
        .cmp(&b.summary.tier())
        .then(by_rating)
        .then_with(|| b.summary.review_count.cmp(&a.summary.review_count))
        .then_with(|| a.store_id.cmp(&b.store_id))
}
