//! Store listing storage operations.

use super::{now_unix, Storage, StoreRecord};
use anyhow::{Context, Result};
use sqlx::Row;
use tabetti_core::types::{AccountId, StoreId};

impl Storage {
    /// Create a store listing.
    ///
    /// `owner` must be a store-owner account when given.
    pub async fn create_store(
        &self,
        owner: Option<AccountId>,
        name: &str,
        area: Option<&str>,
    ) -> Result<StoreRecord> {
        let created_at = now_unix();

        let result = sqlx::query(
            r#"
            INSERT INTO stores (owner_id, name, area, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(owner.map(|id| id.get()))
        .bind(name)
        .bind(area)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create store {:?}", name))?;

        Ok(StoreRecord {
            id: StoreId(result.last_insert_rowid()),
            owner_id: owner,
            name: name.to_string(),
            area: area.map(str::to_string),
            created_at,
        })
    }

    /// Look up a store listing.
    pub async fn get_store(&self, id: StoreId) -> Result<Option<StoreRecord>> {
        let row = sqlx::query("SELECT owner_id, name, area, created_at FROM stores WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch store {}", id))?;

        Ok(row.map(|row| StoreRecord {
            id,
            owner_id: row.get::<Option<i64>, _>("owner_id").map(AccountId),
            name: row.get("name"),
            area: row.get("area"),
            created_at: row.get("created_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_storage;
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_store() {
        let (_db, storage) = temp_storage().await;
        let owner = storage
            .register_store_owner("kato", None, "Kato Ramen Co.")
            .await
            .unwrap();

        let store = storage
            .create_store(Some(owner), "Kato Ramen", Some("Shibuya"))
            .await
            .unwrap();

        let fetched = storage.get_store(store.id).await.unwrap().unwrap();
        assert_eq!(fetched, store);
        assert_eq!(fetched.owner_id, Some(owner));

        assert!(storage.get_store(StoreId(77)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_owner_must_be_owner_account() {
        let (_db, storage) = temp_storage().await;
        let customer = storage.register_customer("nao", None, "Nao").await.unwrap();

        let result = storage
            .create_store(Some(customer.id.into()), "Not Yours", None)
            .await;
        assert!(result.is_err());
    }
}
