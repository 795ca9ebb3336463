//! Paid subscriptions mirrored from the payment processor.

mod repository;

pub use repository::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local lifecycle of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Suspended,
    /// Any other processor state, such as `APPROVAL_PENDING` or `EXPIRED`.
    Updated,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Updated => "updated",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown processor states read as `updated`.
    fn from_str(status: &str) -> Result<Self, Self::Err> {
        Ok(match status.trim().to_ascii_lowercase().as_str() {
            "active" => SubscriptionStatus::Active,
            "cancelled" | "canceled" => SubscriptionStatus::Cancelled,
            "suspended" => SubscriptionStatus::Suspended,
            _ => SubscriptionStatus::Updated,
        })
    }
}

impl From<String> for SubscriptionStatus {
    fn from(status: String) -> Self {
        status.parse().unwrap_or(SubscriptionStatus::Updated)
    }
}

/// Subscription as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    /// Identifier on the payment processor.
    pub subscription_id: String,
    pub plan_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
