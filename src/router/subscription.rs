use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use serde::Deserialize;

use crate::AppState;
use crate::error::Result;
use crate::subscription::SubscriptionRepository;

const DEFAULT_DESTINATION: &str = "/ebook-generator";
const PRICING: &str = "/pricing";

#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
    destination: Option<String>,
}

/// Keep redirections on this site.
fn destination(requested: Option<&str>) -> &str {
    requested
        .filter(|d| d.starts_with('/') && !d.starts_with("//") && !d.contains('\\'))
        .unwrap_or(DEFAULT_DESTINATION)
}

/// Send subscribers to `destination` and everyone else to pricing.
pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CheckQuery>,
) -> Result<Redirect> {
    let claims = state.session.from_headers(&headers)?;

    let subscribed = SubscriptionRepository::new(state.db.postgres.clone())
        .is_active_for_external_id(&claims.sub)
        .await?;

    if subscribed {
        Ok(Redirect::to(destination(query.destination.as_deref())))
    } else {
        tracing::debug!(user_id = claims.sub, "not subscribed, redirecting to pricing");
        Ok(Redirect::to(PRICING))
    }
}
