//! Review and review-like storage operations.
//!
//! Each mutation recounts the reviewer's review axis on the same transaction.

use super::{now_unix, DbReview, NewReview, ReviewRecord, Storage};
use crate::maintainer::{self, TrustEvent};
use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use tabetti_core::types::{CustomerId, ReviewId};
use tracing::info;

async fn fetch_review(conn: &mut SqliteConnection, id: ReviewId) -> Result<Option<ReviewRecord>> {
    let row = sqlx::query_as::<_, DbReview>(
        r#"
        SELECT id, customer_id, store_id, score, like_count, title, body, posted_at
        FROM reviews
        WHERE id = ?
        "#,
    )
    .bind(id.get())
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Failed to fetch review {}", id))?;

    row.map(DbReview::into_record).transpose()
}

impl Storage {
    /// Post a review and refresh the reviewer's trust state.
    pub async fn post_review(&self, review: NewReview) -> Result<ReviewRecord> {
        let like_count = i64::try_from(review.like_count).context("like_count out of range")?;
        let posted_at = now_unix();

        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO reviews (customer_id, store_id, score, like_count, title, body, posted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.reviewer.map(|id| id.get()))
        .bind(review.store.get())
        .bind(review.score.value() as i64)
        .bind(like_count)
        .bind(&review.title)
        .bind(&review.body)
        .bind(posted_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert review for store {}", review.store))?;

        let id = ReviewId(result.last_insert_rowid());

        maintainer::apply(
            &mut *tx,
            &TrustEvent::ReviewCreated {
                reviewer: review.reviewer,
                store: review.store,
                score: review.score,
                like_count: review.like_count,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit review")?;

        info!(
            "Review {} posted on store {} (score {})",
            id, review.store, review.score
        );

        Ok(ReviewRecord {
            id,
            reviewer: review.reviewer,
            store: review.store,
            score: review.score,
            like_count: review.like_count,
            title: review.title,
            body: review.body,
            posted_at,
        })
    }

    /// Look up a review.
    pub async fn get_review(&self, id: ReviewId) -> Result<Option<ReviewRecord>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_review(&mut *conn, id).await
    }

    /// Reviews written by `customer`, newest first.
    pub async fn reviews_by_customer(&self, customer: CustomerId) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query_as::<_, DbReview>(
            r#"
            SELECT id, customer_id, store_id, score, like_count, title, body, posted_at
            FROM reviews
            WHERE customer_id = ?
            ORDER BY posted_at DESC, id DESC
            "#,
        )
        .bind(customer.get())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch reviews of customer {}", customer))?;

        rows.into_iter().map(DbReview::into_record).collect()
    }

    /// Delete a review (author or moderator action).
    ///
    /// Returns the deleted review, or `None` if it did not exist.
    pub async fn delete_review(&self, id: ReviewId) -> Result<Option<ReviewRecord>> {
        let mut tx = self.begin_write().await?;

        let Some(review) = fetch_review(&mut *tx, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete review {}", id))?;

        maintainer::apply(
            &mut *tx,
            &TrustEvent::ReviewDeleted {
                reviewer: review.reviewer,
                store: review.store,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit review deletion")?;

        info!("Review {} deleted from store {}", id, review.store);

        Ok(Some(review))
    }

    /// Record `liker`'s like on a review.
    ///
    /// Returns `false` if `liker` already liked it. Authors cannot like their
    /// own reviews.
    pub async fn like_review(&self, id: ReviewId, liker: CustomerId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let review = fetch_review(&mut *tx, id)
            .await?
            .with_context(|| format!("Review {} not found", id))?;

        if review.reviewer == Some(liker) {
            anyhow::bail!("Customer {} cannot like their own review {}", liker, id);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO review_likes (review_id, customer_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(review_id, customer_id) DO NOTHING
            "#,
        )
        .bind(id.get())
        .bind(liker.get())
        .bind(now_unix())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to record like on review {}", id))?;

        if inserted.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE reviews SET like_count = like_count + 1 WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to bump like_count of review {}", id))?;

        maintainer::apply(
            &mut *tx,
            &TrustEvent::ReviewLikesChanged {
                reviewer: review.reviewer,
                review: id,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit review like")?;

        Ok(true)
    }

    /// Remove `liker`'s like from a review.
    ///
    /// Returns `false` if there was no like to remove.
    pub async fn unlike_review(&self, id: ReviewId, liker: CustomerId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let review = fetch_review(&mut *tx, id)
            .await?
            .with_context(|| format!("Review {} not found", id))?;

        let removed = sqlx::query("DELETE FROM review_likes WHERE review_id = ? AND customer_id = ?")
            .bind(id.get())
            .bind(liker.get())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to remove like on review {}", id))?;

        if removed.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE reviews SET like_count = MAX(like_count - 1, 0) WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to drop like_count of review {}", id))?;

        maintainer::apply(
            &mut *tx,
            &TrustEvent::ReviewLikesChanged {
                reviewer: review.reviewer,
                review: id,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit review unlike")?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_storage;
    use super::*;
    use tabetti_core::types::{ReviewScore, StoreId, TrustScore};
    use tabetti_core::compute_trust_score;

    fn review(reviewer: Option<CustomerId>, store: StoreId, score: u8, likes: u64) -> NewReview {
        NewReview {
            reviewer,
            store,
            score: ReviewScore::new(score).unwrap(),
            like_count: likes,
            title: "Lunch".to_string(),
            body: "Good broth".to_string(),
        }
    }

    #[tokio::test]
    async fn test_post_and_delete_review_maintains_counters() {
        let (_db, storage) = temp_storage().await;
        let author = storage.register_customer("kei", None, "Kei").await.unwrap();
        let store = storage.create_store(None, "Menya", None).await.unwrap();

        let first = storage
            .post_review(review(Some(author.id), store.id, 4, 3))
            .await
            .unwrap();
        storage
            .post_review(review(Some(author.id), store.id, 2, 5))
            .await
            .unwrap();

        let customer = storage.get_customer(author.id).await.unwrap().unwrap();
        assert_eq!(customer.counters.review_count, 2);
        assert_eq!(customer.counters.total_likes, 8);
        assert_eq!(customer.trust_score, compute_trust_score(2, 8, 0));
        assert!(customer.trust_updated_at.is_some());

        let deleted = storage.delete_review(first.id).await.unwrap().unwrap();
        assert_eq!(deleted, first);

        let customer = storage.get_customer(author.id).await.unwrap().unwrap();
        assert_eq!(customer.counters.review_count, 1);
        assert_eq!(customer.counters.total_likes, 5);
        assert_eq!(customer.trust_score, compute_trust_score(1, 5, 0));

        assert!(storage.delete_review(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_review_is_stored() {
        let (_db, storage) = temp_storage().await;
        let store = storage.create_store(None, "Yatai", None).await.unwrap();

        let posted = storage.post_review(review(None, store.id, 5, 0)).await.unwrap();
        assert_eq!(posted.reviewer, None);
        assert_eq!(storage.get_review(posted.id).await.unwrap(), Some(posted.clone()));

        assert!(storage.delete_review(posted.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_counters_untouched() {
        let (_db, storage) = temp_storage().await;
        let author = storage.register_customer("jun", None, "Jun").await.unwrap();

        // No such store: the foreign key rejects the insert.
        let result = storage
            .post_review(review(Some(author.id), StoreId(12345), 3, 0))
            .await;
        assert!(result.is_err());

        let customer = storage.get_customer(author.id).await.unwrap().unwrap();
        assert_eq!(customer.counters.review_count, 0);
        assert_eq!(customer.trust_score, TrustScore::FLOOR);
    }

    #[tokio::test]
    async fn test_likes_flow_into_reviewer_trust() {
        let (_db, storage) = temp_storage().await;
        let author = storage.register_customer("rin", None, "Rin").await.unwrap();
        let fan = storage.register_customer("taro", None, "Taro").await.unwrap();
        let store = storage.create_store(None, "Kakigori-ya", None).await.unwrap();

        let posted = storage
            .post_review(review(Some(author.id), store.id, 5, 0))
            .await
            .unwrap();
        let before = storage.get_customer(author.id).await.unwrap().unwrap();

        assert!(storage.like_review(posted.id, fan.id).await.unwrap());
        assert!(!storage.like_review(posted.id, fan.id).await.unwrap());
        assert!(storage.like_review(posted.id, author.id).await.is_err());

        let liked = storage.get_review(posted.id).await.unwrap().unwrap();
        assert_eq!(liked.like_count, 1);

        let after = storage.get_customer(author.id).await.unwrap().unwrap();
        assert_eq!(after.counters.total_likes, 1);
        assert!(after.trust_score > before.trust_score);

        assert!(storage.unlike_review(posted.id, fan.id).await.unwrap());
        assert!(!storage.unlike_review(posted.id, fan.id).await.unwrap());

        let after_unlike = storage.get_customer(author.id).await.unwrap().unwrap();
        assert_eq!(after_unlike.counters.total_likes, 0);
        assert_eq!(after_unlike.trust_score, before.trust_score);
    }

    #[tokio::test]
    async fn test_reviews_by_customer() {
        let (_db, storage) = temp_storage().await;
        let author = storage.register_customer("emi", None, "Emi").await.unwrap();
        let other = storage.register_customer("gen", None, "Gen").await.unwrap();
        let store = storage.create_store(None, "Izakaya Tora", None).await.unwrap();

        let a = storage
            .post_review(review(Some(author.id), store.id, 3, 0))
            .await
            .unwrap();
        let b = storage
            .post_review(review(Some(author.id), store.id, 4, 0))
            .await
            .unwrap();
        storage
            .post_review(review(Some(other.id), store.id, 1, 0))
            .await
            .unwrap();

        let ids: Vec<ReviewId> = storage
            .reviews_by_customer(author.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
