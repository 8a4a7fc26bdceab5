//! Database types for the reputation storage layer.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabetti_core::types::{
    AccountId, ActivityCounters, CustomerId, ReviewId, ReviewScore, Role, StoreId, TrustScore,
};

/// An account with its role-specific attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Unique login name.
    pub username: String,
    /// Contact email, if given.
    pub email: Option<String>,
    /// Unix timestamp (seconds) of registration.
    pub created_at: i64,
    /// Role-specific record.
    pub profile: AccountProfile,
}

impl Account {
    /// Role tag of this account.
    pub fn role(&self) -> Role {
        match self.profile {
            AccountProfile::Customer(_) => Role::Customer,
            AccountProfile::StoreOwner { .. } => Role::StoreOwner,
            AccountProfile::Company { .. } => Role::Company,
        }
    }
}

/// Role-specific data attached to an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AccountProfile {
    /// Customer counters and trust.
    Customer(CustomerRecord),
    /// Store owner.
    StoreOwner {
        /// Registered business name.
        business_name: String,
    },
    /// Operations staff.
    Company {
        /// Department the staff member belongs to.
        department: String,
    },
}

/// Customer attachment: activity counters and derived trust.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    /// Customer id (same value as the account id).
    pub id: CustomerId,
    /// Public display name.
    pub display_name: String,
    /// Activity counters as last maintained.
    pub counters: ActivityCounters,
    /// Trust score as last maintained.
    pub trust_score: TrustScore,
    /// Unix timestamp (seconds) of the last trust update, `None` if never recomputed.
    pub trust_updated_at: Option<i64>,
}

/// Raw `customers` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DbCustomer {
    pub account_id: i64,
    pub display_name: String,
    pub review_count: i64,
    pub total_likes: i64,
    pub follower_count: i64,
    pub trust_score: f64,
    pub trust_updated_at: Option<i64>,
}

impl DbCustomer {
    pub(crate) fn into_record(self) -> Result<CustomerRecord> {
        Ok(CustomerRecord {
            id: CustomerId(self.account_id),
            display_name: self.display_name,
            counters: ActivityCounters::from_columns(
                self.review_count,
                self.total_likes,
                self.follower_count,
            )?,
            trust_score: TrustScore::new(self.trust_score)?,
            trust_updated_at: self.trust_updated_at,
        })
    }
}

/// A store listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreRecord {
    /// Store id.
    pub id: StoreId,
    /// Owning store-owner account, if any.
    pub owner_id: Option<AccountId>,
    /// Store name.
    pub name: String,
    /// Area or neighbourhood label.
    pub area: Option<String>,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
}

/// Input for posting a review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    /// Author, `None` for anonymous or system-generated reviews.
    pub reviewer: Option<CustomerId>,
    /// Reviewed store.
    pub store: StoreId,
    /// Star rating.
    pub score: ReviewScore,
    /// Initial like count (non-zero only for imported reviews).
    #[serde(default)]
    pub like_count: u64,
    /// Review title.
    #[serde(default)]
    pub title: String,
    /// Review body.
    #[serde(default)]
    pub body: String,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRecord {
    /// Review id.
    pub id: ReviewId,
    /// Author, `None` for anonymous reviews.
    pub reviewer: Option<CustomerId>,
    /// Reviewed store.
    pub store: StoreId,
    /// Star rating.
    pub score: ReviewScore,
    /// Likes received.
    pub like_count: u64,
    /// Review title.
    pub title: String,
    /// Review body.
    pub body: String,
    /// Unix timestamp (seconds) of posting.
    pub posted_at: i64,
}

/// Raw `reviews` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DbReview {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub store_id: i64,
    pub score: i64,
    pub like_count: i64,
    pub title: String,
    pub body: String,
    pub posted_at: i64,
}

impl DbReview {
    pub(crate) fn into_record(self) -> Result<ReviewRecord> {
        Ok(ReviewRecord {
            id: ReviewId(self.id),
            reviewer: self.customer_id.map(CustomerId),
            store: StoreId(self.store_id),
            score: ReviewScore::try_from(self.score)?,
            like_count: u64::try_from(self.like_count)
                .map_err(|_| anyhow::anyhow!("negative like_count on review {}", self.id))?,
            title: self.title,
            body: self.body,
            posted_at: self.posted_at,
        })
    }
}
