use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::ebook::{Profile, outline};
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub outline_content: String,
}

/// Handler to generate a Markdown outline.
pub async fn handler(
    State(state): State<AppState>,
    Valid(profile): Valid<Profile>,
) -> Result<Json<Response>> {
    let outline_content = state
        .llm
        .complete(outline::prompt(&profile, &state.config.generation))
        .await?;
    tracing::debug!(%outline_content, "outline answered");

    Ok(Json(Response { outline_content }))
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
    async fn test_outline_handler() {
        let model = Arc::new(ScriptedModel::new(["# Book\n## Chapter 1: One\n### 1.1 A"]));
        let app = app(router::state_with_model(router::lazy_pool(), model.clone()));

        let response = make_request(
            app,
            Method::POST,
            "/ebook/outline",
            json!({
                "language": "English",
                "topic": "gardens",
                "title": "Deep Roots",
                "genre": "Gardening",
                "targetAudience": "Beginners",
                "writingStyle": "Friendly",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.outline_content, "# Book\n## Chapter 1: One\n### 1.1 A");

        let request = &model.requests()[0];
        assert!(request.messages[0].content.contains("the title is Deep Roots"));
        assert!(request.user_prompt().contains("all 15 chapters with 3 subchapters"));
    }

    #[tokio::test]
    async fn test_outline_rejects_long_title() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(
            app,
            Method::POST,
            "/ebook/outline",
            json!({ "title": "x".repeat(300) }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
