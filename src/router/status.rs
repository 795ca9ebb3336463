//! Public status page and metrics exposition.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::config::Configuration;

/// Public part of the configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    name: String,
    version: String,
    url: String,
    subscription_required: bool,
}

/// Public server status.
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Status> {
    Json(Status {
        name: config.name.clone(),
        version: env!("CARGO_PKG_VERSION").into(),
        url: config.url.clone(),
        subscription_required: config.subscription_required,
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_status() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(app, Method::GET, "/status.json", String::default()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Status = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert!(!body.subscription_required);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(app, Method::GET, "/metrics", String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(app, Method::POST, "/status.json", String::default()).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
