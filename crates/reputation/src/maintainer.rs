//! Trust score maintenance.
//!
//! Every review or follow mutation is followed, on the same transaction, by an
//! explicit [`apply`] call that recounts the affected customer's counters from
//! the source rows and stores the recomputed trust score. Review events only
//! recount the review axis (`review_count`, `total_likes`); follow events only
//! recount `follower_count`. The batch path in [`crate::reconcile`] always
//! recounts all three.

use crate::storage::{now_unix, DbCustomer, Storage};
use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqliteConnection;
use tabetti_core::types::{ActivityCounters, CustomerId, ReviewId, ReviewScore, StoreId, TrustScore};
use tracing::{debug, warn};

/// A mutation that invalidates a customer's derived trust state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustEvent {
    /// A review was inserted.
    ReviewCreated {
        /// Author, `None` for anonymous reviews.
        reviewer: Option<CustomerId>,
        /// Reviewed store.
        store: StoreId,
        /// Star rating.
        score: ReviewScore,
        /// Likes at creation time.
        like_count: u64,
    },
    /// A review was removed by its author or a moderator.
    ReviewDeleted {
        /// Author, `None` for anonymous reviews.
        reviewer: Option<CustomerId>,
        /// Reviewed store.
        store: StoreId,
    },
    /// A review's like count changed.
    ReviewLikesChanged {
        /// Author, `None` for anonymous reviews.
        reviewer: Option<CustomerId>,
        /// The liked or unliked review.
        review: ReviewId,
    },
    /// A follow edge pointing at `followee` was inserted.
    FollowCreated {
        /// Customer being followed.
        followee: CustomerId,
    },
    /// A follow edge pointing at `followee` was removed.
    FollowDeleted {
        /// Customer no longer followed.
        followee: CustomerId,
    },
}

impl TrustEvent {
    /// Customer whose counters the event invalidates.
    pub fn subject(&self) -> Option<CustomerId> {
        match *self {
            TrustEvent::ReviewCreated { reviewer, .. }
            | TrustEvent::ReviewDeleted { reviewer, .. }
            | TrustEvent::ReviewLikesChanged { reviewer, .. } => reviewer,
            TrustEvent::FollowCreated { followee } | TrustEvent::FollowDeleted { followee } => {
                Some(followee)
            }
        }
    }

    /// Counters the event can change.
    pub fn scope(&self) -> RecountScope {
        match self {
            TrustEvent::ReviewCreated { .. }
            | TrustEvent::ReviewDeleted { .. }
            | TrustEvent::ReviewLikesChanged { .. } => RecountScope::Reviews,
            TrustEvent::FollowCreated { .. } | TrustEvent::FollowDeleted { .. } => {
                RecountScope::Followers
            }
        }
    }
}

/// Which counters to rebuild from source rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecountScope {
    /// `review_count` and `total_likes`.
    Reviews,
    /// `follower_count`.
    Followers,
    /// All three counters.
    All,
}

impl RecountScope {
    fn reviews(&self) -> bool {
        matches!(self, RecountScope::Reviews | RecountScope::All)
    }

    fn followers(&self) -> bool {
        matches!(self, RecountScope::Followers | RecountScope::All)
    }
}

/// Outcome of maintaining one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Maintenance {
    /// Counters were recounted (and written if they changed).
    Updated(CustomerUpdate),
    /// Nothing to maintain.
    Skipped(SkipReason),
}

impl Maintenance {
    /// The update, if one happened.
    pub fn updated(&self) -> Option<&CustomerUpdate> {
        match self {
            Maintenance::Updated(update) => Some(update),
            Maintenance::Skipped(_) => None,
        }
    }
}

/// Before/after view of a maintained customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerUpdate {
    /// Maintained customer.
    pub customer: CustomerId,
    /// Counters before the recount.
    pub previous: ActivityCounters,
    /// Counters after the recount.
    pub counters: ActivityCounters,
    /// Trust before the recount.
    pub previous_trust: TrustScore,
    /// Trust after the recount.
    pub trust_score: TrustScore,
}

impl CustomerUpdate {
    /// Whether the recount changed any stored value.
    pub fn changed(&self) -> bool {
        self.previous != self.counters || self.previous_trust != self.trust_score
    }
}

/// Why maintenance did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "customer", rename_all = "snake_case")]
pub enum SkipReason {
    /// The event has no reviewer (anonymous or system review).
    Anonymous,
    /// The referenced customer row does not exist.
    MissingCustomer(CustomerId),
}

/// Apply one trust event on `conn`.
///
/// `conn` should be the transaction that performed the triggering mutation so
/// both commit together.
pub async fn apply(conn: &mut SqliteConnection, event: &TrustEvent) -> Result<Maintenance> {
    let Some(customer) = event.subject() else {
        debug!("Skipping trust maintenance for anonymous event: {:?}", event);
        return Ok(Maintenance::Skipped(SkipReason::Anonymous));
    };

    let outcome = recount(conn, customer, event.scope()).await?;
    if let Maintenance::Updated(update) = &outcome {
        debug!(
            "Maintained customer {} after {:?}: {:?} trust {} -> {}",
            customer, event, update.counters, update.previous_trust, update.trust_score
        );
    }

    Ok(outcome)
}

/// Recount `customer`'s counters in `scope` and store the recomputed trust.
///
/// The UPDATE is skipped when nothing changed, so repeated recounts against
/// unchanged source rows never write.
pub async fn recount(
    conn: &mut SqliteConnection,
    customer: CustomerId,
    scope: RecountScope,
) -> Result<Maintenance> {
    let current = sqlx::query_as::<_, DbCustomer>(
        r#"
        SELECT
            account_id,
            display_name,
            review_count,
            total_likes,
            follower_count,
            trust_score,
            trust_updated_at
        FROM customers
        WHERE account_id = ?
        "#,
    )
    .bind(customer.get())
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Failed to load customer {}", customer))?;

    let Some(current) = current else {
        warn!("Skipping trust maintenance: customer {} not found", customer);
        return Ok(Maintenance::Skipped(SkipReason::MissingCustomer(customer)));
    };

    let mut review_count = current.review_count;
    let mut total_likes = current.total_likes;
    let mut follower_count = current.follower_count;
    let current = current.into_record()?;

    if scope.reviews() {
        let (count, likes): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(like_count), 0)
            FROM reviews
            WHERE customer_id = ?
            "#,
        )
        .bind(customer.get())
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to recount reviews of customer {}", customer))?;

        review_count = count;
        total_likes = likes;
    }

    if scope.followers() {
        follower_count = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followee_id = ?")
            .bind(customer.get())
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to recount followers of customer {}", customer))?;
    }

    let counters = ActivityCounters::from_columns(review_count, total_likes, follower_count)?;
    let update = CustomerUpdate {
        customer,
        previous: current.counters,
        counters,
        previous_trust: current.trust_score,
        trust_score: counters.trust_score(),
    };

    if update.changed() {
        sqlx::query(
            r#"
            UPDATE customers
            SET review_count = ?,
                total_likes = ?,
                follower_count = ?,
                trust_score = ?,
                trust_updated_at = ?
            WHERE account_id = ?
            "#,
        )
        .bind(review_count)
        .bind(total_likes)
        .bind(follower_count)
        .bind(update.trust_score.value())
        .bind(now_unix())
        .bind(customer.get())
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to store trust state of customer {}", customer))?;
    }

    Ok(Maintenance::Updated(update))
}

impl Storage {
    /// Apply a trust event in its own transaction.
    ///
    /// For mutations made outside this crate (bulk imports, admin tools). The
    /// use cases in [`crate::storage`] call [`apply`] on their own transaction.
    pub async fn apply_event(&self, event: &TrustEvent) -> Result<Maintenance> {
        let mut tx = self.begin_write().await?;
        let outcome = apply(&mut *tx, event).await?;
        tx.commit().await.context("Failed to commit trust maintenance")?;
        Ok(outcome)
    }

    /// Recount one customer across all counters in its own transaction.
    pub async fn recompute_customer(&self, customer: CustomerId) -> Result<Maintenance> {
        let mut tx = self.begin_write().await?;
        let outcome = recount(&mut *tx, customer, RecountScope::All).await?;
        tx.commit().await.context("Failed to commit customer recompute")?;
        Ok(outcome)
    }
}
