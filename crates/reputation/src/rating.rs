//! Store rating reads.
//!
//! Reviews are weighted by each reviewer's trust score as stored at query
//! time. Anonymous reviews count toward the simple mean with zero weight.

use crate::storage::Storage;
use anyhow::{Context, Result};
use serde::Serialize;
use tabetti_core::types::{ReviewScore, StoreId, TrustScore};
use tabetti_engine::{aggregate, rank_stores, RankedStore, RatedReview, RatingSummary};

/// Rating view for one store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingContext {
    /// Store id.
    pub store_id: StoreId,
    /// Unweighted mean score, `None` without reviews.
    pub simple_average: Option<f64>,
    /// Trust-weighted mean score, `None` when all weights are zero.
    pub weighted_average: Option<f64>,
    /// Number of reviews.
    pub review_count: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct DbRatedReview {
    score: i64,
    trust_score: f64,
}

impl DbRatedReview {
    fn into_rated(self) -> Result<RatedReview> {
        Ok(RatedReview {
            score: ReviewScore::try_from(self.score)?,
            trust: TrustScore::new(self.trust_score)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DbStoreTotals {
    store_id: i64,
    review_count: i64,
    score_sum: i64,
    weighted_sum: f64,
    weight_total: f64,
}

impl DbStoreTotals {
    fn into_ranked(self) -> Result<RankedStore> {
        let review_count = u64::try_from(self.review_count)
            .with_context(|| format!("Negative review count for store {}", self.store_id))?;
        let score_sum = u64::try_from(self.score_sum)
            .with_context(|| format!("Negative score sum for store {}", self.store_id))?;

        Ok(RankedStore {
            store_id: StoreId(self.store_id),
            summary: RatingSummary::from_totals(
                review_count,
                score_sum,
                self.weighted_sum,
                self.weight_total,
            ),
        })
    }
}

impl Storage {
    /// Simple and trust-weighted rating of a store.
    ///
    /// Returns `None` if the store does not exist.
    pub async fn get_rating_context(&self, store: StoreId) -> Result<Option<RatingContext>> {
        let mut tx = self.pool().begin().await.context("Failed to begin read transaction")?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM stores WHERE id = ?")
            .bind(store.get())
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to look up store {}", store))?;

        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, DbRatedReview>(
            r#"
            SELECT
                r.score AS score,
                COALESCE(c.trust_score, 0.0) AS trust_score
            FROM reviews r
            LEFT JOIN customers c ON c.account_id = r.customer_id
            WHERE r.store_id = ?
            "#,
        )
        .bind(store.get())
        .fetch_all(&mut *tx)
        .await
        .with_context(|| format!("Failed to fetch reviews of store {}", store))?;

        tx.commit().await.context("Failed to close read transaction")?;

        let reviews = rows
            .into_iter()
            .map(DbRatedReview::into_rated)
            .collect::<Result<Vec<_>>>()?;

        let summary = aggregate(&reviews);

        Ok(Some(RatingContext {
            store_id: store,
            simple_average: summary.simple_average,
            weighted_average: summary.weighted_average,
            review_count: summary.review_count,
        }))
    }

    /// Best-rated stores with at least `min_reviews` reviews.
    ///
    /// Sums are computed per store in SQL, so memory grows with the number
    /// of stores rather than the number of reviews.
    pub async fn top_rated_stores(&self, limit: usize, min_reviews: u64) -> Result<Vec<RankedStore>> {
        let min_reviews = i64::try_from(min_reviews).context("min_reviews out of range")?;

        let rows = sqlx::query_as::<_, DbStoreTotals>(
            r#"
            SELECT
                s.id AS store_id,
                COUNT(r.id) AS review_count,
                COALESCE(SUM(r.score), 0) AS score_sum,
                COALESCE(SUM(r.score * COALESCE(c.trust_score, 0.0)), 0.0) AS weighted_sum,
                COALESCE(SUM(COALESCE(c.trust_score, 0.0)), 0.0) AS weight_total
            FROM stores s
            LEFT JOIN reviews r ON r.store_id = s.id
            LEFT JOIN customers c ON c.account_id = r.customer_id
            GROUP BY s.id
            HAVING COUNT(r.id) >= ?
            ORDER BY s.id
            "#,
        )
        .bind(min_reviews)
        .fetch_all(self.pool())
        .await
        .context("Failed to aggregate store ratings")?;

        let candidates = rows
            .into_iter()
            .map(DbStoreTotals::into_ranked)
            .collect::<Result<Vec<_>>>()?;

        let mut ranked = rank_stores(candidates);
        ranked.truncate(limit);

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_storage;
    use crate::storage::NewReview;
    use tabetti_core::types::CustomerId;

    async fn post(storage: &Storage, reviewer: Option<CustomerId>, store: StoreId, score: u8) {
        storage
            .post_review(NewReview {
                reviewer,
                store,
                score: ReviewScore::new(score).unwrap(),
                like_count: 0,
                title: String::new(),
                body: String::new(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_store_has_no_context() {
        let (_db, storage) = temp_storage().await;
        assert!(storage.get_rating_context(StoreId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_without_reviews() {
        let (_db, storage) = temp_storage().await;
        let store = storage.create_store(None, "Empty Bar", None).await.unwrap();

        let ctx = storage.get_rating_context(store.id).await.unwrap().unwrap();
        assert_eq!(ctx.review_count, 0);
        assert_eq!(ctx.simple_average, None);
        assert_eq!(ctx.weighted_average, None);
    }

    #[tokio::test]
    async fn test_zero_trust_reviewers_only() {
        let (_db, storage) = temp_storage().await;
        let store = storage.create_store(None, "Quiet Cafe", None).await.unwrap();

        // Anonymous reviews carry no trust weight.
        post(&storage, None, store.id, 2).await;
        post(&storage, None, store.id, 4).await;

        let ctx = storage.get_rating_context(store.id).await.unwrap().unwrap();
        assert_eq!(ctx.review_count, 2);
        assert_eq!(ctx.simple_average, Some(3.0));
        assert_eq!(ctx.weighted_average, None);
    }

    #[tokio::test]
    async fn test_weighted_rating_uses_current_trust() {
        let (_db, storage) = temp_storage().await;
        let veteran = storage.register_customer("vet", None, "Vet").await.unwrap();
        let newbie = storage.register_customer("new", None, "New").await.unwrap();
        let fans: Vec<_> = {
            let mut fans = Vec::new();
            for i in 0..3 {
                fans.push(
                    storage
                        .register_customer(&format!("fan{}", i), None, "Fan")
                        .await
                        .unwrap(),
                );
            }
            fans
        };
        let store = storage.create_store(None, "Sushi Dai", None).await.unwrap();

        post(&storage, Some(veteran.id), store.id, 5).await;
        post(&storage, Some(newbie.id), store.id, 1).await;

        // Equal trust so far: weighted equals simple.
        let ctx = storage.get_rating_context(store.id).await.unwrap().unwrap();
        assert_eq!(ctx.simple_average, Some(3.0));
        assert!((ctx.weighted_average.unwrap() - 3.0).abs() < 1e-9);

        // Followers raise the veteran's trust after the fact.
        for fan in &fans {
            storage.follow(fan.id, veteran.id).await.unwrap();
        }

        let ctx = storage.get_rating_context(store.id).await.unwrap().unwrap();
        assert_eq!(ctx.simple_average, Some(3.0));
        assert!(ctx.weighted_average.unwrap() > 3.0);
    }

    #[tokio::test]
    async fn test_top_rated_stores() {
        let (_db, storage) = temp_storage().await;
        let a = storage.register_customer("ra", None, "A").await.unwrap();
        let b = storage.register_customer("rb", None, "B").await.unwrap();

        let good = storage.create_store(None, "Good", None).await.unwrap();
        let okay = storage.create_store(None, "Okay", None).await.unwrap();
        let lonely = storage.create_store(None, "Lonely", None).await.unwrap();
        let empty = storage.create_store(None, "Empty", None).await.unwrap();

        post(&storage, Some(a.id), good.id, 5).await;
        post(&storage, Some(b.id), good.id, 4).await;
        post(&storage, Some(a.id), okay.id, 3).await;
        post(&storage, Some(b.id), okay.id, 3).await;
        post(&storage, Some(a.id), lonely.id, 5).await;

        let ranked = storage.top_rated_stores(10, 2).await.unwrap();
        let ids: Vec<StoreId> = ranked.iter().map(|r| r.store_id).collect();
        assert_eq!(ids, vec![good.id, okay.id]);

        let ranked = storage.top_rated_stores(10, 0).await.unwrap();
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked.last().unwrap().store_id, empty.id);

        let ranked = storage.top_rated_stores(1, 0).await.unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_raves_rank_below_trusted_reviews() {
        let (_db, storage) = temp_storage().await;
        let critic = storage.register_customer("critic", None, "Critic").await.unwrap();

        let hyped = storage.create_store(None, "Hyped", None).await.unwrap();
        let solid = storage.create_store(None, "Solid", None).await.unwrap();

        for _ in 0..3 {
            post(&storage, None, hyped.id, 5).await;
        }
        post(&storage, Some(critic.id), solid.id, 4).await;

        let ranked = storage.top_rated_stores(10, 1).await.unwrap();
        let ids: Vec<StoreId> = ranked.iter().map(|r| r.store_id).collect();
        assert_eq!(ids, vec![solid.id, hyped.id]);

        let hyped_summary = ranked[1].summary;
        assert_eq!(hyped_summary.review_count, 3);
        assert_eq!(hyped_summary.simple_average, Some(5.0));
        assert_eq!(hyped_summary.weighted_average, None);
    }

    #[tokio::test]
    async fn test_top_rated_totals_match_rating_context() {
        let (_db, storage) = temp_storage().await;
        let a = storage.register_customer("ta", None, "A").await.unwrap();
        let b = storage.register_customer("tb", None, "B").await.unwrap();
        let fan = storage.register_customer("tf", None, "F").await.unwrap();
        storage.follow(fan.id, a.id).await.unwrap();

        let store = storage.create_store(None, "Ramen Go", None).await.unwrap();
        post(&storage, Some(a.id), store.id, 5).await;
        post(&storage, Some(b.id), store.id, 2).await;
        post(&storage, None, store.id, 1).await;

        let ctx = storage.get_rating_context(store.id).await.unwrap().unwrap();
        let ranked = storage.top_rated_stores(1, 0).await.unwrap();

        assert_eq!(ranked[0].store_id, store.id);
        assert_eq!(ranked[0].summary.review_count, ctx.review_count);
        assert_eq!(ranked[0].summary.simple_average, ctx.simple_average);
        let (x, y) = (ranked[0].summary.weighted_average.unwrap(), ctx.weighted_average.unwrap());
        assert!((x - y).abs() < 1e-9);
    }
}
