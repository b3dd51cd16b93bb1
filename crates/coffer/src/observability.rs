//! Logging and optional OpenTelemetry setup.

use crate::LoggingConfig;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. `verbose` forces
/// `debug` when `RUST_LOG` is unset.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(config.json))
        .try_init()?;

    Ok(())
}

fn fmt_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .boxed()
    }
}

#[cfg(feature = "observability")]
pub use otel::{ObservabilityConfig, init_observability_with_config, shutdown_observability};

#[cfg(feature = "observability")]
mod otel {
    use super::fmt_layer;
    use opentelemetry::{KeyValue, global, trace::TracerProvider};
    use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
    use opentelemetry_stdout::SpanExporter;
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    /// Configuration for OpenTelemetry tracing.
    #[derive(Debug, Clone)]
    pub struct ObservabilityConfig {
        /// Service name for telemetry attribution
        pub service_name: String,
        /// Service version
        pub service_version: String,
        /// Log level filter (e.g., "info", "debug")
        pub log_level: String,
        /// Enable JSON-formatted logs
        pub json_logs: bool,
    }

    impl ObservabilityConfig {
        /// Create a configuration from logging settings.
        pub fn new(service_name: impl Into<String>, logging: &crate::LoggingConfig) -> Self {
            Self {
                service_name: service_name.into(),
                service_version: env!("CARGO_PKG_VERSION").to_string(),
                log_level: logging.level.clone(),
                json_logs: logging.json,
            }
        }

        /// Set the log level.
        pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
            self.log_level = level.into();
            self
        }
    }

    /// Initialize tracing with an OpenTelemetry bridge and stdout span exporter.
    pub fn init_observability_with_config(
        config: ObservabilityConfig,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .with_attributes(vec![KeyValue::new(
                "service.version",
                config.service_version.clone(),
            )])
            .build();

        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(SpanExporter::default())
            .with_resource(resource)
            .build();

        global::set_tracer_provider(provider.clone());

        let tracer = provider.tracer(config.service_name.clone());
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer(config.json_logs))
            .with(otel_layer)
            .try_init()?;

        Ok(())
    }

    /// Flush pending spans.
    ///
    /// Providers flush on drop with the stdout exporter.
    pub fn shutdown_observability() {}
}
