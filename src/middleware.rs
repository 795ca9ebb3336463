//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::subscription::SubscriptionRepository;
use crate::user::UserRepository;

/// Only let subscribers reach generation routes when
/// `subscription_required` is set.
pub async fn require_subscription(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    if !state.config.subscription_required {
        return Ok(next.run(req).await);
    }

    let claims = state.session.from_headers(req.headers())?;

    let user = match UserRepository::new(state.db.postgres.clone())
        .find_by_external_id(&claims.sub)
        .await
    {
        Ok(user) => Some(user),
        Err(ServerError::Sql(sqlx::Error::RowNotFound)) => None,
        Err(err) => return Err(err),
    };

    let subscription = match user {
        Some(user) => {
            SubscriptionRepository::new(state.db.postgres.clone())
                .find_active_for_user(user.id)
                .await?
        },
        None => None,
    };

    let Some(subscription) = subscription else {
        tracing::debug!(user_id = claims.sub, "generation refused, no active subscription");
        return Err(ServerError::PaymentRequired);
    };

    tracing::debug!(
        user_id = claims.sub,
        subscription_id = subscription.subscription_id,
        plan_id = ?subscription.plan_id,
        "subscriber allowed"
    );

    Ok(next.run(req).await)
}
