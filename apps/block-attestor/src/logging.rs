use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Output format of the log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    #[default]
    Json,
    /// Human readable single line format, for local runs
    Text,
}

/// Initialize structured logging with OpenTelemetry integration
///
/// Level comes from `RUST_LOG` (defaults to "info"). Every span carries an
/// OpenTelemetry context so inbound `traceparent` headers link request logs
/// to the caller's trace.
///
/// The returned provider should be shut down before the process exits.
pub fn init_logging(format: LogFormat) -> SdkTracerProvider {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let provider = SdkTracerProvider::builder().build();
    let otel_layer = OpenTelemetryLayer::new(provider.tracer("block-attestor"));

    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_current_span(false)
            .with_line_number(true)
            .with_file(true)
            .with_target(false)
            .flatten_event(true)
            .with_ansi(false)
    });
    let text_layer = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .compact()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(json_layer)
        .with(text_layer)
        .init();

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    provider
}
