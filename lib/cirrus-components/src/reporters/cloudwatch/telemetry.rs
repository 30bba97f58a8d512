use metrics::{counter, histogram, Counter, Histogram};

/// Reporter telemetry.
///
/// Handles are registered against the global recorder when the reporter is created.
#[derive(Clone)]
pub struct ReporterTelemetry {
    flushes_succeeded: Counter,
    flushes_failed: Counter,
    flushes_skipped: Counter,
    records_sent: Counter,
    flush_duration: Histogram,
}

impl ReporterTelemetry {
    /// Creates a new `ReporterTelemetry`, tagging every metric with the given namespace.
    pub fn new(namespace: &str) -> Self {
        Self {
            flushes_succeeded: counter!("cirrus_flushes_total", "namespace" => namespace.to_string(), "outcome" => "success"),
            flushes_failed: counter!("cirrus_flushes_total", "namespace" => namespace.to_string(), "outcome" => "failure"),
            flushes_skipped: counter!("cirrus_flushes_total", "namespace" => namespace.to_string(), "outcome" => "skipped"),
            records_sent: counter!("cirrus_records_sent_total", "namespace" => namespace.to_string()),
            flush_duration: histogram!("cirrus_flush_duration_seconds", "namespace" => namespace.to_string()),
        }
    }

    pub fn flushes_succeeded(&self) -> &Counter {
        &self.flushes_succeeded
    }

    pub fn flushes_failed(&self) -> &Counter {
        &self.flushes_failed
    }

    pub fn flushes_skipped(&self) -> &Counter {
        &self.flushes_skipped
    }

    pub fn records_sent(&self) -> &Counter {
        &self.records_sent
    }

    pub fn flush_duration(&self) -> &Histogram {
        &self.flush_duration
    }
}
