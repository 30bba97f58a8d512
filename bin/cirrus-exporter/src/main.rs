//! Demo exporter.
//!
//! Simulates an application's traffic and flushes its measurements on a fixed interval through a CloudWatch-style
//! reporter, until interrupted with Ctrl-C. Records are sent to the configured endpoint, or written to standard output as
//! JSON Lines when no endpoint is configured.

#![deny(warnings)]
#![deny(missing_docs)]

use std::{sync::Arc, time::Duration};

use cirrus_components::{
    formatters::JsonLinesFormatter,
    reporters::{CloudWatchReporter, CloudWatchReporterConfiguration},
    transports::{BatchingTransport, HttpTransport, MetricsTransport, WriterTransport},
};
use cirrus_config::ConfigurationLoader;
use cirrus_error::{generic_error, ErrorContext as _, GenericError};
use reqwest::Url;
use tokio::{select, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod workload;
use self::workload::Workload;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(true)
        .with_target(true)
        .init();

    match run().await {
        Ok(()) => info!("cirrus-exporter stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<(), GenericError> {
    info!("cirrus-exporter starting...");

    // An optional configuration file may be passed as the first argument. Environment variables override it.
    let mut loader = ConfigurationLoader::default();
    if let Some(config_path) = std::env::args().nth(1) {
        loader = loader.from_yaml(&config_path)?;
    }
    let config = loader.from_environment("cirrus")?.into_generic();
    let config = CloudWatchReporterConfiguration::from_configuration(&config)?;

    let transport = create_transport(&config)?;
    let reporter = CloudWatchReporter::from_configuration(&config, transport)?.with_formatter(Arc::new(JsonLinesFormatter));

    info!(
        namespace = reporter.namespace(),
        flush_interval = ?reporter.flush_interval(),
        "Reporter ready."
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let mut workload = Workload::new(0x5eed);
    let mut ticker = tokio::time::interval(reporter.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                workload.simulate();
                let snapshot = workload.snapshot();
                match reporter.flush(Some(&snapshot), &shutdown).await {
                    Ok(true) => debug!("Flush completed."),
                    Ok(false) => debug!("Flush skipped."),
                    // A failed flush is not retried; the next tick reports fresh values.
                    Err(e) => warn!(error = %e, "Flush failed."),
                }
            },
        }
    }

    reporter.close().await;
    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C. Shutting down..."),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C. Shutting down..."),
    }
    shutdown.cancel();
}

fn create_transport(config: &CloudWatchReporterConfiguration) -> Result<Arc<dyn MetricsTransport>, GenericError> {
    match &config.endpoint {
        Some(endpoint) => {
            let endpoint = Url::parse(endpoint).with_error_context(|| format!("Invalid endpoint '{}'.", endpoint))?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(generic_error!(
                    "Unsupported endpoint scheme '{}'. Expected 'http' or 'https'.",
                    endpoint.scheme()
                ));
            }
            let (credentials, source) = config.credentials.resolve();
            debug!(?source, "Resolved credentials.");

            let request_timeout = config.send_timeout().unwrap_or(DEFAULT_REQUEST_TIMEOUT);
            let transport = HttpTransport::connect(endpoint, credentials, request_timeout)?;
            Ok(Arc::new(
                BatchingTransport::new(transport)
                    .with_max_records_per_request(config.max_records_per_request)
                    .with_max_dimensions_per_record(config.max_dimensions_per_record),
            ))
        }
        None => {
            info!("No endpoint configured. Writing records to standard output.");
            let transport = WriterTransport::new(std::io::stdout(), Arc::new(JsonLinesFormatter));
            Ok(Arc::new(
                BatchingTransport::new(transport)
                    .with_max_records_per_request(config.max_records_per_request)
                    .with_max_dimensions_per_record(config.max_dimensions_per_record),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_endpoint(endpoint: Option<&str>) -> CloudWatchReporterConfiguration {
        CloudWatchReporterConfiguration {
            endpoint: endpoint.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_unsupported_endpoints() {
        let err = create_transport(&config_with_endpoint(Some("ftp://metrics.internal/"))).err().unwrap();
        assert!(err.to_string().contains("Unsupported endpoint scheme 'ftp'"));

        let err = create_transport(&config_with_endpoint(Some("not a url"))).err().unwrap();
        assert_eq!(err.to_string(), "Invalid endpoint 'not a url'.");
    }

    #[test]
    fn standard_output_without_endpoint() {
        assert!(create_transport(&config_with_endpoint(None)).is_ok());
    }
}
