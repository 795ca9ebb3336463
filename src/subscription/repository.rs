//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::Result;
use crate::subscription::{Subscription, SubscriptionStatus};

const COLUMNS: &str =
    "id, subscription_id, plan_id, status, email, user_id, created_at, updated_at";

/// Subscription announced by the payment processor.
#[derive(Clone, Debug, Default)]
pub struct NewSubscription<'a> {
    pub subscription_id: &'a str,
    pub plan_id: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: Pool<Postgres>,
}

impl SubscriptionRepository {
    /// Create a new [`SubscriptionRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record an active subscription, or reactivate an existing one.
    ///
    /// The subscription is attached to the local user owning the subscriber
    /// email, when there is one.
    pub async fn upsert(&self, subscription: &NewSubscription<'_>) -> Result<Subscription> {
        let query = format!(
            r#"INSERT INTO subscriptions (id, subscription_id, plan_id, status, email, user_id)
                VALUES ($1, $2, $3, $4, $5,
                    (SELECT id FROM users WHERE LOWER(email) = LOWER($5) ORDER BY created_at LIMIT 1))
                ON CONFLICT (subscription_id) DO UPDATE SET
                    plan_id = COALESCE(EXCLUDED.plan_id, subscriptions.plan_id),
                    status = EXCLUDED.status,
                    email = COALESCE(EXCLUDED.email, subscriptions.email),
                    user_id = COALESCE(EXCLUDED.user_id, subscriptions.user_id),
                    updated_at = NOW()
                RETURNING {COLUMNS}"#
        );

        Ok(sqlx::query_as::<_, Subscription>(&query)
            .bind(Uuid::new_v4())
            .bind(subscription.subscription_id)
            .bind(subscription.plan_id)
            .bind(SubscriptionStatus::Active.as_str())
            .bind(subscription.email)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Move a subscription to `status`. Returns the number of updated rows.
    pub async fn update_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE subscriptions SET status = $1, updated_at = NOW()
                WHERE subscription_id = $2"#,
        )
        .bind(status.as_str())
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Find a subscription using the processor identifier.
    pub async fn find_by_subscription_id(&self, subscription_id: &str) -> Result<Subscription> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions WHERE subscription_id = $1");

        Ok(sqlx::query_as::<_, Subscription>(&query)
            .bind(subscription_id)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Most recent active subscription of a local user.
    pub async fn find_active_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions
                WHERE user_id = $1 AND status = $2
                ORDER BY updated_at DESC
                LIMIT 1"
        );

        Ok(sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .bind(SubscriptionStatus::Active.as_str())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Whether the user known by the provider as `external_id` is subscribed.
    pub async fn is_active_for_external_id(&self, external_id: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                SELECT 1 FROM subscriptions s
                JOIN users u ON u.id = s.user_id
                WHERE u.external_id = $1 AND s.status = $2
            )"#,
        )
        .bind(external_id)
        .bind(SubscriptionStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?)
    }
}
