use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::blog::{self, BlogPost};
use crate::error::{Result, ServerError};
use crate::router::Valid;

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Body {
    #[validate(length(max = 1000, message = "Keywords are too long."))]
    keywords: Option<String>,
    #[validate(range(max = 20_000, message = "Length is too long."))]
    length: Option<u32>,
}

/// Handler to write an SEO blog post.
pub async fn handler(State(state): State<AppState>, Valid(body): Valid<Body>) -> Result<Json<BlogPost>> {
    let keywords = body.keywords.as_deref().map(str::trim).unwrap_or_default();
    let (false, Some(length @ 1..)) = (keywords.is_empty(), body.length) else {
        return Err(ServerError::BadRequest("Keywords and length are required".into()));
    };

    let post = blog::generate(state.llm.as_ref(), keywords, length).await?;
    tracing::info!(%keywords, length, size = post.content.len(), "blog post generated");

    Ok(Json(post))
}

#[cfg(test)]
mod tests {
    use crate::llm::mock::ScriptedModel;
    use crate::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_blog_handler() {
        let model = Arc::new(ScriptedModel::new([
            "1. Intro",
            "  # Post\n\nBody  ",
            "Title",
            "Description",
            "- rust\n- axum, tokio",
            "Read it! #rust",
        ]));
        let app = app(router::state_with_model(router::lazy_pool(), model.clone()));

        let response = make_request(
            app,
            Method::POST,
            "/blog",
            json!({ "keywords": "rust web", "length": 800 }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["content"], "# Post\n\nBody");
        assert_eq!(body["metaTitle"], "Title");
        assert_eq!(body["metaKeywords"], json!(["rust", "axum", "tokio"]));
        assert_eq!(body["twitterPost"], "Read it! #rust");

        let requests = model.requests();
        assert_eq!(requests.len(), 6);
        assert!(requests[0].user_prompt().contains("rust web"));
    }

    #[tokio::test]
    async fn test_missing_fields() {
        for body in [
            json!({ "length": 800 }),
            json!({ "keywords": "  ", "length": 800 }),
            json!({ "keywords": "rust" }),
            json!({ "keywords": "rust", "length": 0 }),
        ] {
            let app = app(router::state(router::lazy_pool()));
            let response = make_request(app, Method::POST, "/blog", body.to_string()).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["detail"], "Keywords and length are required");
        }
    }
}
