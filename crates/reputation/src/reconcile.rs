//! Batch reconciliation of customer trust state.
//!
//! Walks every customer by id and rebuilds all three counters plus the trust
//! score from the review and follow tables. Each customer commits on its own,
//! so an interrupted run can simply be restarted; rerunning against unchanged
//! data writes nothing.

use crate::maintainer::Maintenance;
use crate::storage::{now_unix, Storage};
use anyhow::{Context, Result};
use serde::Serialize;
use tabetti_core::types::{ActivityCounters, CustomerId, TrustScore};
use tracing::{error, info, warn};

/// Summary of a `recompute_all_trust_scores` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecomputeReport {
    /// Customers visited.
    pub processed: u64,
    /// Customers whose stored state changed.
    pub changed: u64,
    /// Customers that vanished between paging and recompute.
    pub skipped: u64,
    /// Customers whose recompute failed.
    pub failures: Vec<RecomputeFailure>,
}

impl RecomputeReport {
    /// Whether every visited customer was recomputed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One customer the batch could not recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeFailure {
    /// Affected customer.
    pub customer: CustomerId,
    /// Error chain, rendered.
    pub error: String,
}

/// A customer whose stored trust state disagrees with the source rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterDrift {
    /// Affected customer.
    pub customer: CustomerId,
    /// Counters currently stored.
    pub stored: ActivityCounters,
    /// Counters recounted from reviews and follows.
    pub actual: ActivityCounters,
    /// Trust score currently stored.
    pub stored_trust: TrustScore,
    /// Trust score the actual counters produce.
    pub expected_trust: TrustScore,
}

#[derive(Debug, sqlx::FromRow)]
struct DbCounterAudit {
    account_id: i64,
    review_count: i64,
    total_likes: i64,
    follower_count: i64,
    trust_score: f64,
    actual_review_count: i64,
    actual_total_likes: i64,
    actual_follower_count: i64,
}

impl Storage {
    /// Rebuild every customer's counters and trust score from source rows.
    ///
    /// Customers are paged `batch_size` at a time and recomputed one
    /// transaction each. A failing customer is logged and reported; the run
    /// continues with the next one. Only a failure to page customer ids aborts
    /// the run.
    pub async fn recompute_all_trust_scores(&self, batch_size: u32) -> Result<RecomputeReport> {
        if batch_size == 0 {
            anyhow::bail!("batch_size must be > 0");
        }

        let started = now_unix();
        let mut report = RecomputeReport::default();
        let mut cursor: Option<CustomerId> = None;

        info!("Recomputing trust scores (batch size {})", batch_size);

        loop {
            let page = self.customer_ids_after(cursor, batch_size).await?;
            let Some(&last) = page.last() else {
                break;
            };

            for customer in page {
                report.processed += 1;

                match self.recompute_customer(customer).await {
                    Ok(Maintenance::Updated(update)) => {
                        if update.changed() {
                            report.changed += 1;
                            info!(
                                "Customer {}: {:?} -> {:?}, trust {} -> {}",
                                customer,
                                update.previous,
                                update.counters,
                                update.previous_trust,
                                update.trust_score
                            );
                        }
                    }
                    Ok(Maintenance::Skipped(reason)) => {
                        report.skipped += 1;
                        warn!("Customer {} skipped: {:?}", customer, reason);
                    }
                    Err(e) => {
                        error!("Failed to recompute customer {}: {:#}", customer, e);
                        report.failures.push(RecomputeFailure {
                            customer,
                            error: format!("{:#}", e),
                        });
                    }
                }
            }

            cursor = Some(last);
        }

        info!(
            "Trust recompute finished in {}s: processed={} changed={} skipped={} failed={}",
            now_unix() - started,
            report.processed,
            report.changed,
            report.skipped,
            report.failures.len()
        );

        Ok(report)
    }

    /// Customers whose stored counters or trust score differ from a fresh
    /// recount. Read-only.
    pub async fn audit_counters(&self) -> Result<Vec<CounterDrift>> {
        let rows = sqlx::query_as::<_, DbCounterAudit>(
            r#"
            SELECT
                c.account_id,
                c.review_count,
                c.total_likes,
                c.follower_count,
                c.trust_score,
                (SELECT COUNT(*) FROM reviews r WHERE r.customer_id = c.account_id)
                    AS actual_review_count,
                (SELECT COALESCE(SUM(r.like_count), 0) FROM reviews r WHERE r.customer_id = c.account_id)
                    AS actual_total_likes,
                (SELECT COUNT(*) FROM follows f WHERE f.followee_id = c.account_id)
                    AS actual_follower_count
            FROM customers c
            ORDER BY c.account_id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to audit customer counters")?;

        let mut drifted = Vec::new();
        for row in rows {
            let stored =
                ActivityCounters::from_columns(row.review_count, row.total_likes, row.follower_count)?;
            let actual = ActivityCounters::from_columns(
                row.actual_review_count,
                row.actual_total_likes,
                row.actual_follower_count,
            )?;
            let stored_trust = TrustScore::new(row.trust_score)?;
            let expected_trust = actual.trust_score();

            if stored != actual || stored_trust != expected_trust {
                drifted.push(CounterDrift {
                    customer: CustomerId(row.account_id),
                    stored,
                    actual,
                    stored_trust,
                    expected_trust,
                });
            }
        }

        if !drifted.is_empty() {
            warn!("{} customer(s) have drifted trust state", drifted.len());
        }

        Ok(drifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_storage;
    use tabetti_core::compute_trust_score;

    #[tokio::test]
    async fn test_empty_corpus() {
        let (_db, storage) = temp_storage().await;

        let report = storage.recompute_all_trust_scores(10).await.unwrap();
        assert_eq!(report, RecomputeReport::default());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let (_db, storage) = temp_storage().await;
        assert!(storage.recompute_all_trust_scores(0).await.is_err());
    }

    #[tokio::test]
    async fn test_repairs_drift_across_pages() {
        let (_db, storage) = temp_storage().await;

        let mut customers = Vec::new();
        for i in 0..5 {
            customers.push(
                storage
                    .register_customer(&format!("c{}", i), None, "C")
                    .await
                    .unwrap(),
            );
        }

        // Corrupt two customers directly.
        for c in [&customers[1], &customers[4]] {
            sqlx::query(
                "UPDATE customers SET review_count = 3, follower_count = 2, trust_score = 7.5 WHERE account_id = ?",
            )
            .bind(c.id.get())
            .execute(storage.pool())
            .await
            .unwrap();
        }

        let drift = storage.audit_counters().await.unwrap();
        let drifted: Vec<CustomerId> = drift.iter().map(|d| d.customer).collect();
        assert_eq!(drifted, vec![customers[1].id, customers[4].id]);
        assert_eq!(drift[0].actual, ActivityCounters::default());
        assert_eq!(drift[0].expected_trust, compute_trust_score(0, 0, 0));

        let report = storage.recompute_all_trust_scores(2).await.unwrap();
        assert_eq!(report.processed, 5);
        assert_eq!(report.changed, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.is_success());

        assert!(storage.audit_counters().await.unwrap().is_empty());

        let again = storage.recompute_all_trust_scores(2).await.unwrap();
        assert_eq!(again.processed, 5);
        assert_eq!(again.changed, 0);
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_batch() {
        let (_db, storage) = temp_storage().await;

        let first = storage.register_customer("ok1", None, "Ok").await.unwrap();
        let broken = storage.register_customer("bad", None, "Bad").await.unwrap();
        let last = storage.register_customer("ok2", None, "Ok").await.unwrap();

        for c in [&first, &broken, &last] {
            sqlx::query("UPDATE customers SET follower_count = 4 WHERE account_id = ?")
                .bind(c.id.get())
                .execute(storage.pool())
                .await
                .unwrap();
        }

        // Rejecting writes to one customer stands in for a row-level failure.
        sqlx::query(&format!(
            r#"
            CREATE TRIGGER reject_broken BEFORE UPDATE ON customers
            WHEN OLD.account_id = {}
            BEGIN
                SELECT RAISE(ABORT, 'customer row is locked');
            END
            "#,
            broken.id.get()
        ))
        .execute(storage.pool())
        .await
        .unwrap();

        let report = storage.recompute_all_trust_scores(10).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.changed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].customer, broken.id);
        assert!(report.failures[0].error.contains("customer row is locked"));
        assert!(!report.is_success());

        // Neighbours of the failing row were still repaired.
        for c in [&first, &last] {
            let fixed = storage.get_customer(c.id).await.unwrap().unwrap();
            assert_eq!(fixed.counters.follower_count, 0);
        }
    }
}
