//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::Result;
use crate::user::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a user mirrored from the authentication provider.
    ///
    /// Replaying the same provider user updates the email instead of
    /// failing. Subscriptions paid with that email before the account
    /// existed are attached to it.
    pub async fn upsert(&self, id: Uuid, external_id: &str, email: &str) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, external_id, email)
                VALUES ($1, $2, $3)
                ON CONFLICT (external_id) DO UPDATE SET email = EXCLUDED.email
                RETURNING id, external_id, email, created_at"#,
        )
        .bind(id)
        .bind(external_id)
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;

        let linked = sqlx::query(
            r#"UPDATE subscriptions SET user_id = $1, updated_at = NOW()
                WHERE user_id IS NULL AND LOWER(email) = LOWER($2)"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if linked > 0 {
            tracing::info!(user_id = %user.id, linked, "subscriptions attached to new user");
        }

        Ok(user)
    }

    /// Find a user using the provider identifier.
    pub async fn find_by_external_id(&self, external_id: &str) -> Result<User> {
        Ok(sqlx::query_as::<_, User>(
            r#"SELECT id, external_id, email, created_at FROM users WHERE external_id = $1"#,
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?)
    }
}
