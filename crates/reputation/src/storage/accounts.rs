//! Account storage operations.
//!
//! One `accounts` row per identity, plus exactly one role attachment row
//! (`customers`, `store_owners`, or `company_staff`).

use super::{now_unix, Account, AccountProfile, CustomerRecord, DbCustomer, Storage};
use anyhow::{Context, Result};
use sqlx::{Row, SqliteConnection};
use tabetti_core::types::{AccountId, CustomerId, Role};
use tracing::info;

async fn insert_account(
    conn: &mut SqliteConnection,
    username: &str,
    email: Option<&str>,
    role: Role,
) -> Result<AccountId> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts (username, email, role, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(role.as_str())
    .bind(now_unix())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert account {:?}", username))?;

    Ok(AccountId(result.last_insert_rowid()))
}

async fn fetch_customer(
    conn: &mut SqliteConnection,
    customer: CustomerId,
) -> Result<Option<CustomerRecord>> {
    let row = sqlx::query_as::<_, DbCustomer>(
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
    .with_context(|| format!("Failed to fetch customer {}", customer))?;

    row.map(DbCustomer::into_record).transpose()
}

impl Storage {
    /// Register a customer account with zeroed counters and floor trust.
    pub async fn register_customer(
        &self,
        username: &str,
        email: Option<&str>,
        display_name: &str,
    ) -> Result<CustomerRecord> {
        let mut tx = self.begin_write().await?;

        let id = insert_account(&mut *tx, username, email, Role::Customer).await?;
        sqlx::query("INSERT INTO customers (account_id, display_name) VALUES (?, ?)")
            .bind(id.get())
            .bind(display_name)
            .execute(&mut *tx)
            .await
            .context("Failed to insert customer record")?;

        let customer = fetch_customer(&mut *tx, CustomerId(id.get()))
            .await?
            .context("Customer missing right after insert")?;

        tx.commit().await.context("Failed to commit customer registration")?;

        info!("Registered customer {} ({})", customer.id, username);

        Ok(customer)
    }

    /// Register a store-owner account.
    pub async fn register_store_owner(
        &self,
        username: &str,
        email: Option<&str>,
        business_name: &str,
    ) -> Result<AccountId> {
        let mut tx = self.begin_write().await?;

        let id = insert_account(&mut *tx, username, email, Role::StoreOwner).await?;
        sqlx::query("INSERT INTO store_owners (account_id, business_name) VALUES (?, ?)")
            .bind(id.get())
            .bind(business_name)
            .execute(&mut *tx)
            .await
            .context("Failed to insert store owner record")?;

        tx.commit().await.context("Failed to commit store owner registration")?;

        info!("Registered store owner {} ({})", id, username);

        Ok(id)
    }

    /// Register an operations (company) account.
    pub async fn register_company_staff(
        &self,
        username: &str,
        email: Option<&str>,
        department: &str,
    ) -> Result<AccountId> {
        let mut tx = self.begin_write().await?;

        let id = insert_account(&mut *tx, username, email, Role::Company).await?;
        sqlx::query("INSERT INTO company_staff (account_id, department) VALUES (?, ?)")
            .bind(id.get())
            .bind(department)
            .execute(&mut *tx)
            .await
            .context("Failed to insert company staff record")?;

        tx.commit().await.context("Failed to commit company staff registration")?;

        info!("Registered company staff {} ({})", id, username);

        Ok(id)
    }

    /// Look up an account and its role attachment.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;

        let row = sqlx::query("SELECT username, email, role, created_at FROM accounts WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("Failed to fetch account {}", id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: Role = row.get::<String, _>("role").parse()?;
        let profile = match role {
            Role::Customer => {
                let customer = fetch_customer(&mut *conn, CustomerId(id.get()))
                    .await?
                    .with_context(|| format!("Customer account {} has no customer record", id))?;
                AccountProfile::Customer(customer)
            }
            Role::StoreOwner => {
                let business_name: String =
                    sqlx::query_scalar("SELECT business_name FROM store_owners WHERE account_id = ?")
                        .bind(id.get())
                        .fetch_one(&mut *conn)
                        .await
                        .with_context(|| format!("Store owner {} has no owner record", id))?;
                AccountProfile::StoreOwner { business_name }
            }
            Role::Company => {
                let department: String =
                    sqlx::query_scalar("SELECT department FROM company_staff WHERE account_id = ?")
                        .bind(id.get())
                        .fetch_one(&mut *conn)
                        .await
                        .with_context(|| format!("Company account {} has no staff record", id))?;
                AccountProfile::Company { department }
            }
        };

        Ok(Some(Account {
            id,
            username: row.get("username"),
            email: row.get("email"),
            created_at: row.get("created_at"),
            profile,
        }))
    }

    /// Look up a customer's counters and trust score.
    pub async fn get_customer(&self, customer: CustomerId) -> Result<Option<CustomerRecord>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_customer(&mut *conn, customer).await
    }

    /// Customer ids strictly after `after`, ascending, at most `limit`.
    ///
    /// Keyset pagination for batch jobs.
    pub async fn customer_ids_after(
        &self,
        after: Option<CustomerId>,
        limit: u32,
    ) -> Result<Vec<CustomerId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT account_id
            FROM customers
            WHERE account_id > ?
            ORDER BY account_id
            LIMIT ?
            "#,
        )
        .bind(after.map(|id| id.get()).unwrap_or(i64::MIN))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to page customer ids")?;

        Ok(ids.into_iter().map(CustomerId).collect())
    }
}
