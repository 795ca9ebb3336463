//! Bookwright writes ebooks, marketing copy and blog posts with a hosted
//! language model, for users holding an active subscription.

#![forbid(unsafe_code)]

pub mod blog;
pub mod config;
mod database;
pub mod ebook;
pub mod error;
pub mod export;
pub mod identity;
pub mod keywords;
pub mod llm;
mod middleware;
mod router;
pub mod session;
pub mod subscription;
pub mod telemetry;
pub mod user;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// Send a JSON request. MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;

    send(
        app,
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
}

/// Send a prepared request. MUST NEVER be used in production.
#[cfg(test)]
pub async fn send(
    app: Router,
    request: axum::extract::Request,
) -> axum::http::Response<axum::body::Body> {
    use tower::util::ServiceExt;

    app.oneshot(request).await.unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub llm: Arc<dyn llm::ChatModel>,
    pub keywords: keywords::KeywordClient,
    pub identity: identity::IdentityManager,
    pub session: session::SessionVerifier,
    pub paypal: webhook::paypal::PayPalVerifier,
    pub svix: Option<webhook::clerk::SvixVerifier>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Full ebooks take minutes.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.timeout),
        ))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            HeaderName::from_static(webhook::paypal::TRANSMISSION_SIG),
            HeaderName::from_static(webhook::clerk::SVIX_SIGNATURE),
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let generation_router = Router::new()
        .nest("/ebook", router::ebook::router())
        // `POST /blog` goes to `blog`.
        .route("/blog", post(router::blog::handler))
        .route("/keywords", post(router::keywords::handler))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::require_subscription,
        ));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        .route("/subscription/check", get(router::subscription::check))
        .nest("/webhooks", router::webhooks::router())
        .merge(generation_router)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db = match (std::env::var("DATABASE_URL").ok(), &config.postgres) {
        (Some(url), _) if !url.is_empty() => {
            database::Database::connect(
                &url,
                config
                    .postgres
                    .as_ref()
                    .and_then(|p| p.pool_size)
                    .unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        (_, Some(postgres)) => {
            database::Database::new(
                &postgres.address,
                postgres
                    .username
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                postgres
                    .password
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                postgres
                    .database
                    .as_deref()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME),
                postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        _ => {
            return Err("missing `DATABASE_URL` variable or `postgres` entry on `config.yaml` file".into());
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    if config.openai.api_key.is_empty() {
        tracing::warn!("missing `OPENAI_API_KEY`, generation requests will fail");
    }
    let llm: Arc<dyn llm::ChatModel> = Arc::new(llm::OpenAiClient::new(&config.openai));

    let session = match &config.clerk.jwt_public_key {
        Some(pem) => session::SessionVerifier::from_rsa_pem(pem)?,
        None => {
            tracing::warn!("missing `CLERK_JWT_KEY`, every session token will be refused");
            session::SessionVerifier::default()
        },
    };

    let svix = config
        .clerk
        .webhook_secret
        .as_deref()
        .map(webhook::clerk::SvixVerifier::new)
        .transpose()?;
    if svix.is_none() {
        tracing::warn!("missing `CLERK_WEBHOOK_SECRET`, user webhooks are not verified");
    }

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::error!(%err, "failed to install Prometheus recorder");
            None
        },
    };

    Ok(AppState {
        keywords: keywords::KeywordClient::new(&config),
        identity: identity::IdentityManager::new(&config.clerk),
        paypal: webhook::paypal::PayPalVerifier::new(config.paypal.webhook_id.clone()),
        config,
        db,
        llm,
        session,
        svix,
        metrics,
    })
}
