use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;

fn default_location() -> String {
    "US".to_owned()
}

fn default_lang() -> String {
    "en".to_owned()
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(max = 255, message = "Keyword is too long."))]
    #[serde(default)]
    keyword: Option<String>,
    #[validate(length(max = 8))]
    #[serde(default = "default_location")]
    location: String,
    #[validate(length(max = 8))]
    #[serde(default = "default_lang")]
    lang: String,
}

/// Handler to look keyword suggestions up.
pub async fn handler(State(state): State<AppState>, Valid(body): Valid<Body>) -> Result<Json<Value>> {
    let Some(keyword) = body.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
        return Err(ServerError::BadRequest("Keyword is required".into()));
    };

    Ok(Json(
        state.keywords.lookup(keyword, &body.location, &body.lang).await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::config::{Configuration, Keywords};
    use crate::keywords::KeywordClient;
    use crate::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    /// Serve a fake keyword API and return its base URL.
    async fn upstream() -> String {
        async fn suggest(
            headers: HeaderMap,
            Query(query): Query<HashMap<String, String>>,
        ) -> (StatusCode, axum::Json<Value>) {
            if headers.get("x-rapidapi-key").and_then(|v| v.to_str().ok()) != Some("rapid-key") {
                return (StatusCode::FORBIDDEN, axum::Json(json!({ "error": "Invalid API key" })));
            }
            (
                StatusCode::OK,
                axum::Json(json!([{
                    "text": query["keyword"],
                    "location": query["location"],
                    "lang": query["lang"],
                }])),
            )
        }

        let app = axum::Router::new().route("/keysuggest/", get(suggest));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}")
    }

    async fn state_with_key(api_key: &str) -> AppState {
        let mut config = Configuration::default();
        config.keywords = Keywords {
            api_key: api_key.into(),
            base_url: Some(upstream().await),
            ..Default::default()
        };
        let mut state = router::state(router::lazy_pool());
        state.keywords = KeywordClient::new(&config);
        state
    }

    #[tokio::test]
    async fn test_keywords_handler() {
        let app = app(state_with_key("rapid-key").await);
        let response = make_request(
            app,
            Method::POST,
            "/keywords",
            json!({ "keyword": "sourdough", "lang": "fr" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!([{ "text": "sourdough", "location": "US", "lang": "fr" }])
        );
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let app = app(state_with_key("wrong").await);
        let response = make_request(
            app,
            Method::POST,
            "/keywords",
            json!({ "keyword": "sourdough" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_missing_keyword() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(app, Method::POST, "/keywords", json!({}).to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
