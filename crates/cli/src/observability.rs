//! Tracing subscriber, OpenTelemetry export, and Prometheus metrics wiring.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogFormat;

pub const SERVICE_NAME: &str = "jira_ingestor";

/// Guard returned by [`init_tracing`]; flushes exported spans on drop.
pub struct TracingGuard {
    otel_enabled: bool,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if self.otel_enabled {
            global::shutdown_tracer_provider();
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` sets the filter (default `info`). When `otlp_endpoint` is set,
/// spans are also exported over OTLP/gRPC; if the exporter cannot be built
/// the service keeps running with local logs only.
pub fn init_tracing(format: LogFormat, otlp_endpoint: Option<&str>) -> TracingGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,h2=warn"));
    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    let Some(endpoint) = otlp_endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return TracingGuard {
            otel_enabled: false,
        };
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build();
    match exporter {
        Ok(exporter) => {
            let provider = sdktrace::TracerProvider::builder()
                .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    SERVICE_NAME,
                )]))
                .build();
            let tracer = provider.tracer(SERVICE_NAME);
            global::set_tracer_provider(provider);
            let otel = tracing_opentelemetry::layer().with_tracer(tracer);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(otel)
                .init();
            info!(endpoint = %endpoint, "OpenTelemetry exporter enabled");
            TracingGuard { otel_enabled: true }
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
            error!(error = %e, "Failed to initialise OpenTelemetry exporter");
            TracingGuard {
                otel_enabled: false,
            }
        }
    }
}

/// Installs the Prometheus recorder with its scrape endpoint on `addr`.
///
/// Without a recorder the counters emitted by the handler are no-ops.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(addr = %addr, "Prometheus metrics endpoint enabled");
    Ok(())
}
