use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use envconfig::Envconfig;
use opentelemetry::{KeyValue, Value};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{BatchConfig, RandomIdGenerator, Sampler, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use sec_client::config::Config;
use sec_client::event::Event;
use sec_client::home_doc::{HomeDocument, ServiceLinks};
use sec_client::sinks::print::PrintSink;
use sec_client::submitter::EventSubmitter;
use sec_client::transport::{HttpTransport, Transport};

fn init_tracer(sink_url: &str, sampling_rate: f64, service_name: &str) -> anyhow::Result<Tracer> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    sampling_rate,
                ))))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    Value::from(service_name.to_string()),
                )])),
        )
        .with_batch_config(BatchConfig::default())
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(sink_url)
                .with_timeout(Duration::from_secs(3)),
        )
        .install_batch(runtime::Tokio)?;

    Ok(tracer)
}

/// Submits each line of `input` as one event until EOF. Malformed lines are logged and skipped.
async fn forward_events<R>(submitter: &EventSubmitter, input: R) -> anyhow::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("skipping malformed event: {}", err);
                continue;
            }
        };
        if let Err(err) = submitter.submit_event(event).await {
            tracing::warn!("rejected event: {}", err);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env().context("invalid configuration")?;

    // Instantiate tracing outputs:
    //   - stdout with a level configured by the RUST_LOG envvar (default=INFO)
    //   - OpenTelemetry if enabled, for levels LOG_LEVEL and higher
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );
    let otel_layer = config
        .otel_url
        .as_deref()
        .map(|url| init_tracer(url, config.otel_sampling_rate, &config.otel_service_name))
        .transpose()?
        .map(OpenTelemetryLayer::new)
        .with_filter(LevelFilter::from_level(config.log_level));
    tracing_subscriber::registry()
        .with(log_layer)
        .with(otel_layer)
        .init();

    let transport: Arc<dyn Transport + Send + Sync> =
        Arc::new(HttpTransport::new(config.request_timeout_ms.0)?);

    let submitter = if config.print_sink {
        let home_doc = HomeDocument::fetch(&transport, &config.home_doc_url, &config.metadata()).await?;
        let links = ServiceLinks::try_from(&home_doc)?;
        EventSubmitter::builder(links, config.metadata(), transport)
            .home_doc_url(&config.home_doc_url)
            .options(config.options())
            .sink(Arc::new(PrintSink {}))
            .build()?
    } else {
        EventSubmitter::connect(
            &config.home_doc_url,
            config.metadata(),
            config.options(),
            transport,
        )
        .await?
    };
    let _signals = submitter.listen_for_close_signals()?;

    tokio::select! {
        result = forward_events(&submitter, tokio::io::stdin()) => {
            result?;
            tracing::info!("end of input");
            submitter.close().await;
        }
        _ = submitter.closed() => {}
    }

    tracing::info!("shutdown complete");
    Ok(())
}
