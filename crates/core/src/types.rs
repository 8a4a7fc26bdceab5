//! Core types for Tabetti.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::constants::{MAX_REVIEW_SCORE, MIN_REVIEW_SCORE, TRUST_FLOOR};
use crate::error::CoreError;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw row id.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                $name(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

row_id!(
    /// Account row id (shared by every role).
    AccountId
);

row_id!(
    /// Id of an account holding the customer role.
    ///
    /// Always equal to the underlying [`AccountId`].
    CustomerId
);

row_id!(
    /// Store (restaurant listing) row id.
    StoreId
);

row_id!(
    /// Review row id.
    ReviewId
);

impl From<CustomerId> for AccountId {
    fn from(id: CustomerId) -> Self {
        AccountId(id.0)
    }
}

/// Star rating attached to a review, 1 to 5.
///
/// Validated on construction and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReviewScore(u8);

impl ReviewScore {
    /// Create a new ReviewScore, validating the range.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if !(MIN_REVIEW_SCORE..=MAX_REVIEW_SCORE).contains(&value) {
            return Err(CoreError::InvalidReviewScore(value as i64));
        }
        Ok(ReviewScore(value))
    }

    /// Get the raw value.
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ReviewScore {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| CoreError::InvalidReviewScore(value))
            .and_then(ReviewScore::new)
    }
}

impl fmt::Display for ReviewScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ReviewScore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReviewScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        ReviewScore::new(value).map_err(|e| serde::de::Error::custom(format!("{}", e)))
    }
}

/// Reviewer trust weight.
///
/// Always finite and non-negative, which makes the ordering total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustScore(f64);

impl TrustScore {
    /// Trust of a customer with no recorded activity.
    pub const FLOOR: TrustScore = TrustScore(TRUST_FLOOR);

    /// Create a new TrustScore, rejecting NaN, infinities and negatives.
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::InvalidTrustScore(value));
        }
        Ok(TrustScore(value))
    }

    /// Get the raw value.
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Whether this score carries no weight.
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        TrustScore::FLOOR
    }
}

impl Eq for TrustScore {}

impl PartialOrd for TrustScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrustScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Serialize for TrustScore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrustScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        TrustScore::new(value).map_err(|e| serde::de::Error::custom(format!("{}", e)))
    }
}

/// Customer activity counters that feed the trust score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityCounters {
    /// Number of reviews currently authored by the customer.
    pub review_count: u64,
    /// Sum of `like_count` over those reviews.
    pub total_likes: u64,
    /// Number of follow edges pointing at the customer.
    pub follower_count: u64,
}

impl ActivityCounters {
    /// Build counters from signed database columns.
    pub fn from_columns(
        review_count: i64,
        total_likes: i64,
        follower_count: i64,
    ) -> Result<Self, CoreError> {
        let check = |name: &'static str, value: i64| {
            u64::try_from(value).map_err(|_| CoreError::InvalidCounter { name, value })
        };
        Ok(ActivityCounters {
            review_count: check("review_count", review_count)?,
            total_likes: check("total_likes", total_likes)?,
            follower_count: check("follower_count", follower_count)?,
        })
    }

    /// Trust score for these counters.
    pub fn trust_score(&self) -> TrustScore {
        crate::trust::compute_trust_score(self.review_count, self.total_likes, self.follower_count)
    }
}

/// Role tag carried by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Diner who reviews and follows.
    Customer,
    /// Owner managing store listings.
    StoreOwner,
    /// Operations staff (moderation, store-account review).
    Company,
}

impl Role {
    /// Canonical tag stored in the `accounts.role` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::StoreOwner => "store_owner",
            Role::Company => "company",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "store_owner" => Ok(Role::StoreOwner),
            "company" => Ok(Role::Company),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_score_range() {
        assert!(ReviewScore::new(0).is_err());
        assert_eq!(ReviewScore::new(1).unwrap().value(), 1);
        assert_eq!(ReviewScore::new(5).unwrap().value(), 5);
        assert!(ReviewScore::new(6).is_err());
        assert!(ReviewScore::try_from(-3i64).is_err());
        assert!(ReviewScore::try_from(300i64).is_err());
        assert_eq!(ReviewScore::try_from(4i64).unwrap().value(), 4);
    }

    #[test]
    fn test_review_score_deserialize_validates() {
        let ok: ReviewScore = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 3);
        assert!(serde_json::from_str::<ReviewScore>("9").is_err());
    }

    #[test]
    fn test_trust_score_rejects_invalid() {
        assert!(TrustScore::new(-0.5).is_err());
        assert!(TrustScore::new(f64::NAN).is_err());
        assert!(TrustScore::new(f64::INFINITY).is_err());
        assert_eq!(TrustScore::new(0.0).unwrap(), TrustScore::FLOOR);
        assert!(serde_json::from_str::<TrustScore>("-1.0").is_err());
    }

    #[test]
    fn test_trust_score_ordering() {
        let low = TrustScore::new(0.25).unwrap();
        let high = TrustScore::new(3.0).unwrap();
        assert!(low < high);
        assert_eq!(low.max(high), high);
        assert!(TrustScore::FLOOR.is_zero());
    }

    #[test]
    fn test_counters_from_columns() {
        let counters = ActivityCounters::from_columns(2, 7, 1).unwrap();
        assert_eq!(counters.review_count, 2);
        assert_eq!(counters.total_likes, 7);
        assert_eq!(counters.follower_count, 1);

        let err = ActivityCounters::from_columns(0, -1, 0).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidCounter {
                name: "total_likes",
                value: -1
            }
        );
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Customer, Role::StoreOwner, Role::Company] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
