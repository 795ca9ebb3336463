//! Logs, traces and metrics.
//!
//! Logs always go to stdout. When `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
//! spans and log records are also exported over OTLP/gRPC.

use std::error::Error;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::http::Version;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{Unit, gauge};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type BoxError = Box<dyn Error + Send + Sync>;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";
const SAMPLING_INTERVAL: Duration = Duration::from_secs(10);

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUESTS_DURATION: &str = "http_requests_duration_seconds";
pub const LLM_REQUESTS_DURATION: &str = "llm_requests_duration_seconds";

fn resource() -> Resource {
    Resource::builder().with_service_name(SERVICE_NAME).build()
}

/// OpenTelemetry providers to flush before exit.
#[derive(Default)]
pub struct Providers {
    tracer: Option<SdkTracerProvider>,
    logger: Option<SdkLoggerProvider>,
}

impl Providers {
    /// Flush and stop exporters.
    pub fn shutdown(self) {
        if let Some(Err(err)) = self.tracer.map(|tracer| tracer.shutdown()) {
            tracing::error!(%err, "failed to shut tracer provider down");
        }
        if let Some(Err(err)) = self.logger.map(|logger| logger.shutdown()) {
            tracing::error!(%err, "failed to shut logger provider down");
        }
    }
}

/// Create tracer for OTLP.
fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource())
        .build())
}

/// Create OTLP exporter for logs.
fn setup_logging(endpoint: &str) -> Result<SdkLoggerProvider, BoxError> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` drives filtering, `info` by default.
pub fn init() -> Result<Providers, BoxError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut providers = Providers::default();
    let endpoint = std::env::var(OTLP_ENDPOINT).ok().filter(|e| !e.is_empty());

    let bridge = match endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = setup_tracer(endpoint)?;
            global::set_tracer_provider(tracer.clone());
            providers.tracer = Some(tracer);

            let logger = setup_logging(endpoint)?;
            let bridge = OpenTelemetryTracingBridge::new(&logger);
            providers.logger = Some(logger);
            Some(bridge)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(bridge)
        .try_init()?;

    if let Some(endpoint) = endpoint {
        tracing::info!(%endpoint, "exporting telemetry over OTLP");
    }

    Ok(providers)
}

/// Sample process CPU and memory usage forever.
fn spawn_process_sampler() {
    let mut system = System::new_with_specifics(RefreshKind::nothing());
    let pid = Pid::from_u32(std::process::id());

    tokio::spawn(async move {
        loop {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_memory().with_cpu(),
            );

            if let Some(process) = system.process(pid) {
                gauge!("process_memory_used_bytes").set(process.memory() as f64);
                gauge!("process_cpu_usage").set(process.cpu_usage() as f64);
            }

            tokio::time::sleep(SAMPLING_INTERVAL).await;
        }
    });
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] =
        &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    // a completion takes seconds, a full ebook minutes.
    const GENERATION_SECONDS: &[f64] =
        &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

    metrics::describe_gauge!(
        "process_cpu_usage",
        Unit::Percent,
        "CPU usage of the process in percentage."
    );
    metrics::describe_gauge!(
        "process_memory_used_bytes",
        Unit::Bytes,
        "Total process memory in bytes."
    );
    metrics::describe_histogram!(
        LLM_REQUESTS_DURATION,
        Unit::Seconds,
        "Latency of chat-completion requests."
    );

    spawn_process_sampler();

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUESTS_DURATION.to_owned()),
            EXPONENTIAL_SECONDS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(LLM_REQUESTS_DURATION.to_owned()),
            GENERATION_SECONDS,
        )?
        .install_recorder()
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "UNKNOWN",
    }
}

/// Count requests and record their latency per route.
pub async fn track(req: Request, next: Next) -> Response {
    let mut span = global::tracer("tracing-http").start("http-request");
    let start = Instant::now();

    // matched route keeps label cardinality bounded.
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let method = req.method().to_string();
    let version = http_version(req.version());

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    span.set_attributes([
        KeyValue::new("version", version),
        KeyValue::new("path", path.clone()),
        KeyValue::new("method", method.clone()),
        KeyValue::new("status", status.clone()),
    ]);
    span.end();

    let labels = [("method", method), ("path", path), ("status", status)];
    metrics::counter!(HTTP_REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(HTTP_REQUESTS_DURATION, &labels).record(latency);

    response
}
