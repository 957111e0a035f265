//! Process-wide tracing setup for the `seed` and `reconcile` binaries.

use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use opentelemetry_semantic_conventions::resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,channel_reports=info,sqlx=warn,sea_orm=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One flattened JSON object per event.
    Json,
}

impl LogFormat {
    /// Anything but `json` falls back to text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Read from `RUST_LOG`, `RUST_LOG_FORMAT` and `OTEL_EXPORTER_OTLP_ENDPOINT`.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub filter: String,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl TelemetrySettings {
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            filter: non_empty("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: non_empty("RUST_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(LogFormat::Text),
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
        }
    }
}

/// Flushes exported spans when dropped. Keep it alive until `main` returns.
#[must_use = "spans are only flushed when the guard is dropped"]
pub struct TelemetryGuard {
    exporting: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.exporting {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

fn otlp_tracer(service_name: &str, endpoint: String) -> Result<sdktrace::Tracer, TraceError> {
    let resource = Resource::new(vec![KeyValue::new(
        resource::SERVICE_NAME,
        service_name.to_string(),
    )]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Installs the global subscriber. Must run inside the tokio runtime when an
/// OTLP endpoint is configured.
pub fn init_telemetry(service_name: &str, settings: TelemetrySettings) -> TelemetryGuard {
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {:?} ({}), using default", settings.filter, e);
        EnvFilter::new(DEFAULT_FILTER)
    });

    // A broken collector must not stop the run; logs still go to stdout.
    let tracer = settings
        .otlp_endpoint
        .and_then(|endpoint| match otlp_tracer(service_name, endpoint) {
            Ok(tracer) => Some(tracer),
            Err(e) => {
                eprintln!("OpenTelemetry exporter disabled: {}", e);
                None
            }
        });
    let exporting = tracer.is_some();

    let json = (settings.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
    });
    let text = (settings.format == LogFormat::Text).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .with(json)
        .with(text)
        .init();

    TelemetryGuard { exporting }
}
