use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::ebook::details::{self, Details};
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Body {
    #[validate(length(max = 1000, message = "Topic is too long."))]
    topic: String,
    #[validate(length(max = 64))]
    ebook_type: String,
}

/// Handler to suggest ebook details for a topic.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Details>> {
    let answer = state
        .llm
        .complete(details::prompt(&body.topic, &body.ebook_type))
        .await?;
    tracing::debug!(%answer, "details answered");

    Ok(Json(details::parse(&answer, &body.topic, &body.ebook_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedModel;
    use crate::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_details_handler() {
        let model = Arc::new(ScriptedModel::new([
            "[Title: Deep Roots]; [Genre: Gardening]; [Target Audience: Beginners]; [Writing Style: Friendly].",
        ]));
        let app = app(router::state_with_model(router::lazy_pool(), model.clone()));

        let response = make_request(
            app,
            Method::POST,
            "/ebook/details",
            json!({ "topic": "vegetable gardens", "ebookType": "Non-Fiction" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let details: Details = serde_json::from_slice(&body).unwrap();
        assert_eq!(details.title, "Deep Roots");
        assert_eq!(details.genre, "Non-fiction / Gardening");
        assert_eq!(details.writing_style, "Friendly");

        let requests = model.requests();
        assert!(requests[0].user_prompt().contains("topic: vegetable gardens"));
    }

    #[tokio::test]
    async fn test_details_model_failure() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(
            app,
            Method::POST,
            "/ebook/details",
            json!({ "topic": "anything" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_details_invalid_json() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(app, Method::POST, "/ebook/details", "{".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
