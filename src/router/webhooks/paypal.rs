use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::identity::{PrivateMetadata, SubscriptionMetadata};
use crate::subscription::{NewSubscription, SubscriptionRepository, SubscriptionStatus};
use crate::webhook::paypal::{Event, EventKind, Resource};

const PROCESSING_FAILED: &str = "Webhook processing failed";

fn processing_failed(err: ServerError) -> ServerError {
    match err {
        ServerError::Sql(err) => ServerError::internal(PROCESSING_FAILED, err),
        err => err,
    }
}

/// Push subscription metadata to the identity provider. Failures are only
/// logged.
async fn sync_identity(state: &AppState, email: Option<&str>, metadata: PrivateMetadata) {
    let Some(email) = email else {
        tracing::warn!("subscription has no subscriber email, identity sync skipped");
        return;
    };

    if let Err(err) = state.identity.sync(email, &metadata).await {
        tracing::error!(%err, %email, "identity metadata sync failed");
    }
}

async fn created(state: &AppState, resource: &Resource) -> Result<()> {
    let subscription = SubscriptionRepository::new(state.db.postgres.clone())
        .upsert(&NewSubscription {
            subscription_id: &resource.id,
            plan_id: resource.plan_id.as_deref(),
            email: resource.email(),
        })
        .await?;

    tracing::info!(
        subscription_id = subscription.subscription_id,
        user_id = ?subscription.user_id,
        "subscription activated"
    );

    let is_admin = match (resource.email(), &state.config.admin_email) {
        (Some(email), Some(admin)) => email.eq_ignore_ascii_case(admin),
        _ => false,
    };

    let metadata = PrivateMetadata {
        subscription: SubscriptionMetadata {
            status: subscription.status,
            plan_id: subscription.plan_id,
            subscription_id: Some(subscription.subscription_id),
        },
        is_admin: Some(is_admin),
        user_id: subscription.user_id,
    };
    sync_identity(state, subscription.email.as_deref(), metadata).await;

    Ok(())
}

async fn status_changed(
    state: &AppState,
    resource: &Resource,
    status: SubscriptionStatus,
) -> Result<()> {
    let repository = SubscriptionRepository::new(state.db.postgres.clone());

    if repository.update_status(&resource.id, status).await? == 0 {
        tracing::warn!(subscription_id = resource.id, %status, "status change for unknown subscription");
        return Ok(());
    }
    tracing::info!(subscription_id = resource.id, %status, "subscription status changed");

    let email = match resource.email() {
        Some(email) => Some(email.to_owned()),
        None => repository.find_by_subscription_id(&resource.id).await?.email,
    };
    sync_identity(state, email.as_deref(), PrivateMetadata::status(status)).await;

    Ok(())
}

/// Handler of PayPal subscription notifications.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    state.paypal.verify(&headers, &body)?;

    let event: Event =
        serde_json::from_slice(&body).map_err(|err| ServerError::ParsingForm(Box::new(err)))?;
    let kind = EventKind::from(event.event_type.as_str());

    if kind == EventKind::Other {
        tracing::info!(event_type = event.event_type, "unhandled PayPal event");
        return Ok(Json(json!({ "received": true })));
    }

    let resource = event
        .resource
        .as_ref()
        .ok_or_else(|| ServerError::BadRequest("Missing subscription resource".into()))?;

    let outcome = match kind {
        EventKind::Created => created(&state, resource).await,
        EventKind::Cancelled => status_changed(&state, resource, SubscriptionStatus::Cancelled).await,
        EventKind::Suspended => status_changed(&state, resource, SubscriptionStatus::Suspended).await,
        EventKind::Updated => {
            let status = resource
                .status
                .as_deref()
                .map(|s| s.parse().unwrap_or(SubscriptionStatus::Updated))
                .unwrap_or(SubscriptionStatus::Updated);
            status_changed(&state, resource, status).await
        },
        EventKind::Other => Ok(()),
    };
    outcome.map_err(processing_failed)?;

    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use crate::config::Configuration;
    use crate::identity::tests::{Calls, manager, provider};
    use crate::subscription::{SubscriptionRepository, SubscriptionStatus};
    use crate::user::UserRepository;
    use crate::webhook::paypal::{TRANSMISSION_ID, TRANSMISSION_SIG, TRANSMISSION_TIME};
    use crate::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use sqlx::{Pool, Postgres};
    use std::sync::Arc;
    use uuid::Uuid;

    const TIME: &str = "2024-10-12T10:00:00Z";

    fn signed(state: &AppState, body: &Value) -> Request<Body> {
        let body = body.to_string();
        Request::builder()
            .method(Method::POST)
            .uri("/webhooks/paypal")
            .header(header::CONTENT_TYPE, "application/json")
            .header(TRANSMISSION_ID, "tx-1")
            .header(TRANSMISSION_TIME, TIME)
            .header(TRANSMISSION_SIG, state.paypal.sign("tx-1", TIME, body.as_bytes()))
            .body(Body::from(body))
            .unwrap()
    }

    fn event(event_type: &str, resource: Value) -> Value {
        json!({ "event_type": event_type, "resource": resource })
    }

    fn created() -> Value {
        event(
            "BILLING.SUBSCRIPTION.CREATED",
            json!({
                "id": "I-BW452GLLEP1G",
                "plan_id": "P-5ML4271244454362WXNWU5NQ",
                "status": "ACTIVE",
                "subscriber": { "email_address": "Reader@example.com" },
            }),
        )
    }

    /// State syncing with a fake identity provider.
    async fn synced(pool: Pool<Postgres>, admin_email: &str, failing: bool) -> (AppState, Calls) {
        let mut config = Configuration::default();
        config.admin_email = Some(admin_email.to_owned());

        let calls = Calls::default();
        let mut state = router::state(pool);
        state.config = Arc::new(config);
        state.identity = manager(provider(Arc::clone(&calls), failing).await);
        (state, calls)
    }

    #[sqlx::test]
    async fn test_creation_marks_admin(pool: Pool<Postgres>) {
        let user = UserRepository::new(pool.clone())
            .upsert(Uuid::new_v4(), "user_reader", "reader@example.com")
            .await
            .unwrap();
        let (state, calls) = synced(pool, "READER@example.com", false).await;

        let response = send(app(state.clone()), signed(&state, &created())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "user_1");
        assert_eq!(
            calls[0].1,
            json!({
                "private_metadata": {
                    "subscription": {
                        "status": "active",
                        "plan_id": "P-5ML4271244454362WXNWU5NQ",
                        "subscription_id": "I-BW452GLLEP1G",
                    },
                    "isAdmin": true,
                    "user_id": user.id,
                }
            })
        );
    }

    #[sqlx::test]
    async fn test_creation_for_regular_subscriber(pool: Pool<Postgres>) {
        let (state, calls) = synced(pool, "owner@example.com", false).await;

        let response = send(app(state.clone()), signed(&state, &created())).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            calls.lock().unwrap()[0].1,
            json!({
                "private_metadata": {
                    "subscription": {
                        "status": "active",
                        "plan_id": "P-5ML4271244454362WXNWU5NQ",
                        "subscription_id": "I-BW452GLLEP1G",
                    },
                    "isAdmin": false,
                }
            })
        );
    }

    #[sqlx::test]
    async fn test_status_change_uses_stored_email(pool: Pool<Postgres>) {
        let (state, calls) = synced(pool, "owner@example.com", false).await;

        let response = send(app(state.clone()), signed(&state, &created())).await;
        assert_eq!(response.status(), StatusCode::OK);

        // no subscriber in the notification.
        let body = event("BILLING.SUBSCRIPTION.SUSPENDED", json!({ "id": "I-BW452GLLEP1G" }));
        let response = send(app(state.clone()), signed(&state, &body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "user_1");
        assert_eq!(
            calls[1].1,
            json!({ "private_metadata": { "subscription": { "status": "suspended" } } })
        );
    }

    #[sqlx::test]
    async fn test_provider_failure_is_acknowledged(pool: Pool<Postgres>) {
        let (state, calls) = synced(pool.clone(), "owner@example.com", true).await;

        let response = send(app(state.clone()), signed(&state, &created())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.lock().unwrap().len(), 1);

        let subscription = SubscriptionRepository::new(pool)
            .find_by_subscription_id("I-BW452GLLEP1G")
            .await
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Active);
    }

    #[sqlx::test]
    async fn test_subscription_lifecycle(pool: Pool<Postgres>) {
        let user = UserRepository::new(pool.clone())
            .upsert(Uuid::new_v4(), "user_reader", "reader@example.com")
            .await
            .unwrap();
        let repository = SubscriptionRepository::new(pool.clone());

        let state = router::state(pool.clone());
        let response = send(app(state.clone()), signed(&state, &created())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "received": true }));

        let subscription = repository.find_by_subscription_id("I-BW452GLLEP1G").await.unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.user_id, Some(user.id));
        assert!(repository.is_active_for_external_id("user_reader").await.unwrap());

        for (event_type, status, expected) in [
            ("BILLING.SUBSCRIPTION.SUSPENDED", None, SubscriptionStatus::Suspended),
            ("BILLING.SUBSCRIPTION.UPDATED", Some("ACTIVE"), SubscriptionStatus::Active),
            ("BILLING.SUBSCRIPTION.UPDATED", Some("APPROVAL_PENDING"), SubscriptionStatus::Updated),
            ("BILLING.SUBSCRIPTION.CANCELLED", None, SubscriptionStatus::Cancelled),
        ] {
            let body = event(event_type, json!({ "id": "I-BW452GLLEP1G", "status": status }));
            let response = send(app(state.clone()), signed(&state, &body)).await;
            assert_eq!(response.status(), StatusCode::OK);

            let subscription = repository.find_by_subscription_id("I-BW452GLLEP1G").await.unwrap();
            assert_eq!(subscription.status, expected);
        }
        assert!(!repository.is_active_for_external_id("user_reader").await.unwrap());
    }

    #[sqlx::test]
    async fn test_replayed_creation_keeps_one_row(pool: Pool<Postgres>) {
        let state = router::state(pool.clone());
        for _ in 0..2 {
            let response = send(app(state.clone()), signed(&state, &created())).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn test_unknown_subscription_and_event(pool: Pool<Postgres>) {
        let state = router::state(pool);

        let body = event("BILLING.SUBSCRIPTION.CANCELLED", json!({ "id": "I-UNKNOWN" }));
        let response = send(app(state.clone()), signed(&state, &body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = event("PAYMENT.SALE.COMPLETED", json!({ "id": "PAY-1" }));
        let response = send(app(state.clone()), signed(&state, &body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json!({ "event_type": "BILLING.SUBSCRIPTION.CANCELLED" });
        let response = send(app(state.clone()), signed(&state, &body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_signature() {
        let state = router::state(router::lazy_pool());
        let mut request = signed(&state, &created());
        request
            .headers_mut()
            .insert(TRANSMISSION_SIG, "AAAA".parse().unwrap());

        let response = send(app(state), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_garbage() {
        let state = router::state(router::lazy_pool());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/paypal")
            .header(TRANSMISSION_ID, "tx-1")
            .header(TRANSMISSION_TIME, TIME)
            .header(TRANSMISSION_SIG, state.paypal.sign("tx-1", TIME, b"not json"))
            .body(Body::from("not json"))
            .unwrap();

        let response = send(app(state), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
