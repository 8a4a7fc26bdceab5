//! Follow edge storage operations.
//!
//! Edges are directed (`follower -> followee`) and unique per ordered pair.
//! Each mutation recounts the followee's `follower_count` on the same
//! transaction.

use super::{now_unix, Storage};
use crate::maintainer::{self, TrustEvent};
use anyhow::{Context, Result};
use tabetti_core::types::CustomerId;
use tracing::info;

impl Storage {
    /// Make `follower` follow `followee`.
    ///
    /// Returns `false` if the edge already existed.
    pub async fn follow(&self, follower: CustomerId, followee: CustomerId) -> Result<bool> {
        if follower == followee {
            anyhow::bail!("Customer {} cannot follow themselves", follower);
        }

        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower.get())
        .bind(followee.get())
        .bind(now_unix())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert follow {} -> {}", follower, followee))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        maintainer::apply(&mut *tx, &TrustEvent::FollowCreated { followee }).await?;

        tx.commit().await.context("Failed to commit follow")?;

        info!("Customer {} now follows {}", follower, followee);

        Ok(true)
    }

    /// Remove the `follower -> followee` edge.
    ///
    /// Returns `false` if there was no such edge.
    pub async fn unfollow(&self, follower: CustomerId, followee: CustomerId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower.get())
            .bind(followee.get())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete follow {} -> {}", follower, followee))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        maintainer::apply(&mut *tx, &TrustEvent::FollowDeleted { followee }).await?;

        tx.commit().await.context("Failed to commit unfollow")?;

        info!("Customer {} unfollowed {}", follower, followee);

        Ok(true)
    }

    /// Customers following `customer`, ascending by id.
    pub async fn followers_of(&self, customer: CustomerId) -> Result<Vec<CustomerId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT follower_id FROM follows WHERE followee_id = ? ORDER BY follower_id",
        )
        .bind(customer.get())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch followers of {}", customer))?;

        Ok(ids.into_iter().map(CustomerId).collect())
    }
}
