use std::env;

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

type TelemetryResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

static SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// otlp exporters for traces and logs, both batched.
struct OtlpProviders {
    tracer: SdkTracerProvider,
    logger: SdkLoggerProvider,
}

impl OtlpProviders {
    fn build(endpoint: &str) -> TelemetryResult<Self> {
        let resource = Resource::builder()
            .with_service_name(
                env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.to_string()),
            )
            .with_attribute(KeyValue::new(
                "service.version",
                env::var("OTEL_SERVICE_VERSION")
                    .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            ))
            .build();

        let spans = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;
        let logs = LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        Ok(Self {
            tracer: SdkTracerProvider::builder()
                .with_resource(resource.clone())
                .with_batch_exporter(spans)
                .build(),
            logger: SdkLoggerProvider::builder()
                .with_resource(resource)
                .with_batch_exporter(logs)
                .build(),
        })
    }
}

/// installs the global subscriber. stdout is always on; traces and logs are also shipped over
/// otlp when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
pub fn init_telemetry() -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    let endpoint = match env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.trim().is_empty() => endpoint,
        _ => {
            registry.try_init()?;
            tracing::debug!("no otlp endpoint set, logging to stdout only.");
            return Ok(());
        }
    };

    let providers = OtlpProviders::build(&endpoint)?;
    global::set_tracer_provider(providers.tracer.clone());

    registry
        .with(tracing_opentelemetry::layer().with_tracer(providers.tracer.tracer(SERVICE_NAME)))
        .with(OpenTelemetryTracingBridge::new(&providers.logger))
        .try_init()?;

    tracing::info!(%endpoint, "exporting traces and logs over otlp.");
    Ok(())
}
