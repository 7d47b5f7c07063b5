//! Process logging and the optional OTLP trace exporter.
//!
//! Logs always go to stderr through `tracing-subscriber`. Spans are also
//! exported over OTLP/gRPC when `OTEL_EXPORTER_OTLP_ENDPOINT` is set. An
//! `https://` endpoint (or one given without a scheme) is dialed with TLS
//! against the platform trust roots.

use anyhow::{anyhow, bail, Result};
use base64ct::{Base64, Encoding};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
    Resource,
};
use std::{env, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;

const ENV_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
const ENV_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
const ENV_INSTANCE_ID: &str = "OTEL_SERVICE_INSTANCE_ID";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Where and how spans are shipped, read from the standard OTLP variables.
#[derive(Debug)]
struct ExporterSettings {
    endpoint: String,
    metadata: MetadataMap,
    instance_id: String,
}

impl ExporterSettings {
    /// `None` when no collector endpoint is configured.
    fn from_env() -> Result<Option<Self>> {
        let Ok(raw) = env::var(ENV_ENDPOINT) else {
            return Ok(None);
        };

        if let Ok(protocol) = env::var(ENV_PROTOCOL) {
            if protocol != "grpc" {
                debug!("{ENV_PROTOCOL}='{protocol}' ignored, spans are exported over gRPC");
            }
        }

        let metadata = match env::var(ENV_HEADERS) {
            Ok(headers) => collector_metadata(&headers)?,
            Err(_) => MetadataMap::new(),
        };

        Ok(Some(Self {
            endpoint: with_scheme(&raw)?,
            metadata,
            instance_id: env::var(ENV_INSTANCE_ID).unwrap_or_else(|_| Ulid::new().to_string()),
        }))
    }

    /// Host name to verify the collector certificate against.
    fn tls_domain(&self) -> Option<&str> {
        let authority = self.endpoint.strip_prefix("https://")?;
        authority
            .split('/')
            .next()
            .map(|host_port| host_port.rsplit_once(':').map_or(host_port, |(host, _)| host))
            .filter(|host| !host.is_empty())
    }
}

/// Endpoints without a scheme are treated as TLS collectors.
fn with_scheme(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        bail!("{ENV_ENDPOINT} is set but empty");
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.to_string())
    } else if endpoint.contains("://") {
        Err(anyhow!("unsupported scheme in {ENV_ENDPOINT}: {endpoint}"))
    } else {
        Ok(format!("https://{endpoint}"))
    }
}

/// Parse `key=value,key=value` into gRPC metadata. Pairs without `=` are
/// skipped. Keys ending in `-bin` carry base64 values.
fn collector_metadata(headers: &str) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    for (key, value) in headers.split(',').filter_map(|pair| pair.split_once('=')) {
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key.ends_with("-bin") {
            let bytes = Base64::decode_vec(value)
                .map_err(|e| anyhow!("collector header {key} is not valid base64: {e}"))?;
            let name = MetadataKey::<Binary>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid collector header name {key}: {e}"))?;
            metadata.insert_bin(name, MetadataValue::from_bytes(&bytes));
        } else {
            let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid collector header name {key}: {e}"))?;
            let value = value
                .parse::<MetadataValue<Ascii>>()
                .map_err(|e| anyhow!("invalid value for collector header {key}: {e}"))?;
            metadata.insert(name, value);
        }
    }

    Ok(metadata)
}

fn build_tracer(settings: ExporterSettings) -> Result<Tracer> {
    let mut exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT);

    if let Some(domain) = settings.tls_domain() {
        exporter = exporter.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }

    if !settings.metadata.is_empty() {
        exporter = exporter.with_metadata(settings.metadata);
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter.build()?)
        .with_resource(
            Resource::builder_empty()
                .with_attributes([
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", settings.instance_id),
                ])
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    let _ = TRACER_PROVIDER.set(provider);
    Ok(tracer)
}

/// `RUST_LOG` wins over the verbosity flag; noisy dependencies stay quiet.
fn log_filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

/// Install the global subscriber. Errors-only unless a verbosity is given.
///
/// # Errors
///
/// Returns an error if the collector settings are invalid, the exporter
/// cannot be built, or a global subscriber is already installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let filter = log_filter(verbosity_level.unwrap_or(Level::ERROR))?;
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .pretty();

    let otel_layer = ExporterSettings::from_env()?
        .map(build_tracer)
        .transpose()?
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush pending spans before the process exits.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("flushing trace exporter");
        if let Err(e) = provider.shutdown() {
            debug!("trace exporter shutdown: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> Result<ExporterSettings> {
        Ok(ExporterSettings {
            endpoint: with_scheme(endpoint)?,
            metadata: MetadataMap::new(),
            instance_id: "test".to_string(),
        })
    }

    #[test]
    fn bare_endpoints_default_to_tls() -> Result<()> {
        assert_eq!(with_scheme("collector.tessera.dev:4317/")?, "https://collector.tessera.dev:4317");
        assert_eq!(with_scheme("http://localhost:4317")?, "http://localhost:4317");
        assert!(with_scheme("ftp://collector:21").is_err());
        assert!(with_scheme("  ").is_err());
        Ok(())
    }

    #[test]
    fn tls_domain_only_for_https() -> Result<()> {
        assert_eq!(settings("collector:4317")?.tls_domain(), Some("collector"));
        assert_eq!(
            settings("https://otel.tessera.dev/v1/traces")?.tls_domain(),
            Some("otel.tessera.dev")
        );
        assert_eq!(settings("http://localhost:4317")?.tls_domain(), None);
        Ok(())
    }

    #[test]
    fn collector_headers_become_metadata() -> Result<()> {
        let metadata =
            collector_metadata(" Authorization = Bearer abc ,malformed, trace-bin=YmluYXJ5")?;
        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert!(collector_metadata("")?.is_empty());
        Ok(())
    }

    #[test]
    fn binary_header_must_be_base64() {
        let err = collector_metadata("trace-bin=not base64!!").err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("not valid base64")));
    }

    #[test]
    fn exporter_is_off_without_endpoint() -> Result<()> {
        temp_env::with_var_unset(ENV_ENDPOINT, || -> Result<()> {
            assert!(ExporterSettings::from_env()?.is_none());
            Ok(())
        })
    }

    #[test]
    fn exporter_settings_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                (ENV_ENDPOINT, Some("otel.tessera.dev:4317")),
                (ENV_HEADERS, Some("x-team=auth")),
                (ENV_INSTANCE_ID, Some("node-7")),
            ],
            || -> Result<()> {
                let settings = ExporterSettings::from_env()?
                    .ok_or_else(|| anyhow!("exporter should be configured"))?;
                assert_eq!(settings.endpoint, "https://otel.tessera.dev:4317");
                assert_eq!(settings.instance_id, "node-7");
                assert_eq!(settings.metadata.len(), 1);
                assert_eq!(settings.tls_domain(), Some("otel.tessera.dev"));
                Ok(())
            },
        )
    }

    #[test]
    fn shutdown_without_exporter_is_a_noop() {
        shutdown_tracer();
    }
}
