use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::UserRepository;
use crate::webhook::clerk::Event;

/// Handler mirroring new provider users locally.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    if let Some(svix) = &state.svix {
        svix.verify(&headers, &body)?;
    }

    let event: Event =
        serde_json::from_slice(&body).map_err(|err| ServerError::ParsingForm(Box::new(err)))?;

    if !event.is_user_created() {
        tracing::debug!(kind = ?event.kind, "ignored user event");
        return Ok(Json(json!({ "message": "Event ignored" })));
    }

    let email = event
        .data
        .primary_email()
        .ok_or_else(|| ServerError::BadRequest("User has no email address".into()))?;
    let id = Uuid::parse_str(&event.data.id).unwrap_or_else(|_| Uuid::new_v4());

    let user = UserRepository::new(state.db.postgres.clone())
        .upsert(id, &event.data.id, email)
        .await
        .map_err(|err| match err {
            ServerError::Sql(err) => ServerError::internal("Failed to add user", err),
            err => err,
        })?;
    tracing::info!(user_id = %user.id, external_id = event.data.id, "user added");

    Ok(Json(json!({ "message": "User added" })))
}
