//! CloudWatch-style reporter.
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use cirrus_event::Snapshot;
use snafu::{ResultExt as _, Snafu};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, Instrument as _, Span};

use crate::{
    filters::{FilterError, MetricsFilter},
    formatters::OutputFormatter,
    records::Record,
    transports::{MetricsTransport, TransportError},
};

mod config;
pub use self::config::CloudWatchReporterConfiguration;

mod telemetry;
use self::telemetry::ReporterTelemetry;

pub mod translate;

/// Reporter error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ReporterError {
    /// The reporter configuration is invalid.
    #[snafu(display("Invalid reporter configuration: {}", reason))]
    InvalidConfiguration {
        /// Why the configuration is invalid.
        reason: String,
    },

    /// The context filter could not be built.
    #[snafu(display("Invalid filter configuration."))]
    InvalidFilter {
        /// Error source.
        source: FilterError,
    },

    /// The transport failed to deliver records.
    #[snafu(display("Failed to send records."))]
    Transport {
        /// Error source.
        source: TransportError,
    },

    /// The transport did not finish delivering records in time.
    #[snafu(display("Timed out sending records after {:?}.", timeout))]
    Timeout {
        /// The send timeout.
        timeout: Duration,
    },

    /// The reporter has been closed.
    #[snafu(display("Reporter has been closed."))]
    Closed,
}

/// A reporter that flushes snapshots to a CloudWatch-style backend.
///
/// Each flush translates every context in a snapshot into [`Record`]s and hands all of them to the transport in a
/// single call. The reporter holds no state between flushes other than the transport, so flushes may run concurrently.
///
/// The transport is held from construction until [`close`][Self::close] is called.
pub struct CloudWatchReporter {
    namespace: String,
    flush_interval: Duration,
    send_timeout: Option<Duration>,
    filter: MetricsFilter,
    formatter: Option<Arc<dyn OutputFormatter>>,
    transport: Mutex<Option<Arc<dyn MetricsTransport>>>,
    telemetry: ReporterTelemetry,
    span: Span,
}

impl CloudWatchReporter {
    /// Creates a new `CloudWatchReporter` from the given configuration, sending through `transport`.
    ///
    /// # Errors
    ///
    /// If the namespace is empty, or the filter configuration is invalid, an error is returned.
    pub fn from_configuration(
        config: &CloudWatchReporterConfiguration, transport: Arc<dyn MetricsTransport>,
    ) -> Result<Self, ReporterError> {
        if config.namespace.trim().is_empty() {
            return InvalidConfiguration {
                reason: "namespace must not be empty",
            }
            .fail();
        }

        let filter = match &config.filter {
            Some(filter) => MetricsFilter::from_configuration(filter).context(InvalidFilter)?,
            None => MetricsFilter::new(),
        };

        Ok(Self {
            namespace: config.namespace.clone(),
            flush_interval: config.flush_interval(),
            send_timeout: config.send_timeout(),
            filter,
            formatter: None,
            transport: Mutex::new(Some(transport)),
            telemetry: ReporterTelemetry::new(&config.namespace),
            span: debug_span!("cloudwatch_reporter", namespace = %config.namespace),
        })
    }

    /// Replaces the context filter.
    pub fn with_filter(mut self, filter: MetricsFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the output formatter.
    ///
    /// The formatter is not used when translating records; it is held for callers that render records themselves.
    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Sets the span that flush logging is emitted under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the namespace records are sent under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the configured flush interval.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Returns the output formatter, if one was set.
    pub fn formatter(&self) -> Option<&Arc<dyn OutputFormatter>> {
        self.formatter.as_ref()
    }

    /// Translates every context in `snapshot` into records stamped with `timestamp`.
    ///
    /// Contexts are visited in snapshot order and filtered first. A context that produces no records is simply absent
    /// from the output. Counters and meters configured to reset on reporting are reset by this call.
    pub fn translate(&self, snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Vec<Record> {
        let mut records = Vec::new();
        for context in snapshot.contexts() {
            if let Some(context) = self.filter.apply(context) {
                translate::translate_context(&context, timestamp, &mut records);
            }
        }
        records
    }

    /// Flushes a snapshot.
    ///
    /// Returns `Ok(false)` without sending anything if `cancel` has already been triggered or there is no snapshot, and
    /// `Ok(false)` if `cancel` is triggered while the records are being sent. Returns `Ok(true)` once all records have
    /// been sent, or immediately if the snapshot produced no records.
    ///
    /// # Errors
    ///
    /// If the transport fails, or the send times out, an error is returned. If the reporter has been closed,
    /// [`ReporterError::Closed`] is returned.
    pub async fn flush(&self, snapshot: Option<&Snapshot>, cancel: &CancellationToken) -> Result<bool, ReporterError> {
        let result = self.flush_inner(snapshot, cancel).instrument(self.span.clone()).await;
        match &result {
            Ok(true) => self.telemetry.flushes_succeeded().increment(1),
            Ok(false) => self.telemetry.flushes_skipped().increment(1),
            Err(_) => self.telemetry.flushes_failed().increment(1),
        }
        result
    }

    async fn flush_inner(&self, snapshot: Option<&Snapshot>, cancel: &CancellationToken) -> Result<bool, ReporterError> {
        if cancel.is_cancelled() {
            debug!("Flush cancelled before starting.");
            return Ok(false);
        }

        let Some(snapshot) = snapshot else {
            debug!("No snapshot to flush.");
            return Ok(false);
        };

        let transport = self.transport()?;

        let started = Instant::now();
        let records = self.translate(snapshot, Utc::now());
        let record_count = records.len();
        if record_count == 0 {
            debug!("Snapshot produced no records. Skipping send.");
            return Ok(true);
        }

        // A send that has completed wins over a cancellation observed in the same poll.
        select! {
            biased;

            result = self.send(transport.as_ref(), records) => match result {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    self.telemetry.records_sent().increment(record_count as u64);
                    self.telemetry.flush_duration().record(elapsed.as_secs_f64());
                    debug!(records = record_count, ?elapsed, "Flushed records.");
                    Ok(true)
                }
                Err(e) => {
                    error!(error = %e, records = record_count, "Failed to flush records.");
                    Err(e)
                }
            },
            _ = cancel.cancelled() => {
                debug!(records = record_count, "Flush cancelled while sending records.");
                Ok(false)
            },
        }
    }

    async fn send(&self, transport: &dyn MetricsTransport, records: Vec<Record>) -> Result<(), ReporterError> {
        let send = transport.put_metric_data(&self.namespace, records);
        match self.send_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, send).await {
                Ok(result) => result.context(Transport),
                Err(_) => Timeout { timeout }.fail(),
            },
            None => send.await.context(Transport),
        }
    }

    fn transport(&self) -> Result<Arc<dyn MetricsTransport>, ReporterError> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ReporterError::Closed)
    }

    /// Closes the reporter, releasing the transport.
    ///
    /// Closing is idempotent. Flushes started after closing fail with [`ReporterError::Closed`].
    pub async fn close(&self) {
        let transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(transport) = transport {
            debug!(parent: &self.span, "Closing transport.");
            transport.close().await;
        }
    }
}

#[cfg(test)]
mod tests;
