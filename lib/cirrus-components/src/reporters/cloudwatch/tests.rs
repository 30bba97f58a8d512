use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::TimeZone as _;
use cirrus_event::{
    measurement::{
        ApdexValue, Counter, CounterSource, GaugeValue, HistogramValue, Measurement, Meter, MeterSource, TimerValue,
    },
    MeasurementType, MetricsContext,
};
use metrics_util::{
    debugging::{DebugValue, DebuggingRecorder},
    CompositeKey,
};
use quanta::Clock;

use super::*;
use crate::{
    filters::FilterConfiguration,
    records::RecordValue,
    transports::{BatchingTransport, TransportError},
};

#[derive(Default)]
struct MockTransport {
    calls: Mutex<Vec<(String, Vec<Record>)>>,
    fail: bool,
    hang: bool,
    cancel_on_send: Option<CancellationToken>,
    yield_on_send: bool,
    closed: AtomicBool,
}

impl MockTransport {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_batch(&self) -> Vec<Record> {
        self.calls.lock().unwrap().last().map(|(_, records)| records.clone()).unwrap()
    }
}

#[async_trait]
impl MetricsTransport for MockTransport {
    async fn put_metric_data(&self, namespace: &str, records: Vec<Record>) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((namespace.to_string(), records));

        if let Some(token) = &self.cancel_on_send {
            token.cancel();
        }
        if self.yield_on_send {
            tokio::task::yield_now().await;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(TransportError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn reporter_with(config: &CloudWatchReporterConfiguration, transport: &Arc<MockTransport>) -> CloudWatchReporter {
    CloudWatchReporter::from_configuration(config, Arc::clone(transport) as Arc<dyn MetricsTransport>).unwrap()
}

fn reporter(transport: &Arc<MockTransport>) -> CloudWatchReporter {
    reporter_with(&CloudWatchReporterConfiguration::default(), transport)
}

fn requests_snapshot(counter: &Counter, reset_on_reporting: bool) -> Snapshot {
    Snapshot::new().with_context(MetricsContext::new("web").with_counter(Measurement::new(
        "requests",
        CounterSource::new(counter.clone()).with_reset_on_reporting(reset_on_reporting),
    )))
}

fn full_snapshot() -> Snapshot {
    let counter = Counter::new();
    counter.increment_item("/users", 3);
    counter.increment_item("/orders", 2);

    let meter = Meter::new();
    meter.mark_n(10);

    Snapshot::new()
        .with_context(
            MetricsContext::new("web")
                .with_apdex(Measurement::new("apdex", ApdexValue::from_counts(8, 1, 1)))
                .with_counter(Measurement::new(
                    "requests",
                    CounterSource::new(counter).with_report_set_items(true),
                ))
                .with_meter(Measurement::new("hits", MeterSource::new(meter))),
        )
        .with_context(MetricsContext::new("idle"))
        .with_context(
            MetricsContext::new("db")
                .with_gauge(Measurement::new("connections", GaugeValue(4.0)))
                .with_histogram(Measurement::new(
                    "rows",
                    HistogramValue::from_samples(&[1.0, 5.0, 3.0]),
                ))
                .with_timer(Measurement::new(
                    "query",
                    TimerValue::new(Default::default(), HistogramValue::from_samples(&[2.0, 8.0])),
                )),
        )
}

#[tokio::test]
async fn end_to_end_single_counter() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    let counter = Counter::new();
    counter.increment(42);
    let snapshot = requests_snapshot(&counter, false);

    let before = Utc::now();
    assert!(reporter.flush(Some(&snapshot), &CancellationToken::new()).await.unwrap());
    let after = Utc::now();

    assert_eq!(transport.call_count(), 1);
    let (namespace, records) = transport.calls.lock().unwrap()[0].clone();
    assert_eq!(namespace, "AppMetrics");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.name(), "web");
    assert_eq!(record.value(), &RecordValue::Scalar(42.0));
    assert!(record.dimensions().is_empty());
    assert!(before <= record.timestamp() && record.timestamp() <= after);
}

#[tokio::test]
async fn empty_snapshots_succeed_without_sending() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);
    let cancel = CancellationToken::new();

    assert!(reporter.flush(Some(&Snapshot::new()), &cancel).await.unwrap());

    let all_empty = Snapshot::new()
        .with_context(MetricsContext::new("a"))
        .with_context(MetricsContext::new("b"));
    assert!(reporter.flush(Some(&all_empty), &cancel).await.unwrap());

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn absent_snapshot_is_not_flushed() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    assert!(!reporter.flush(None, &CancellationToken::new()).await.unwrap());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn cancelled_before_flush_never_sends() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    let counter = Counter::new();
    counter.increment(5);
    let snapshot = requests_snapshot(&counter, true);

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(!reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert!(!reporter.flush(Some(&full_snapshot()), &cancel).await.unwrap());

    assert_eq!(transport.call_count(), 0);
    // Nothing was read, so nothing was reset.
    assert_eq!(counter.value().count, 5);
}

#[tokio::test]
async fn cancelled_during_send() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(MockTransport {
        hang: true,
        cancel_on_send: Some(cancel.clone()),
        ..Default::default()
    });
    let reporter = reporter(&transport);

    let snapshot = full_snapshot();
    assert!(!reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn completed_send_wins_over_late_cancellation() {
    let transport = Arc::new(MockTransport {
        yield_on_send: true,
        ..Default::default()
    });
    let reporter = reporter(&transport);
    let cancel = CancellationToken::new();

    // Runs while the send is yielding, so the token is already cancelled by the time the send completes.
    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move { cancel.cancel() }
    });

    assert!(reporter.flush(Some(&full_snapshot()), &cancel).await.unwrap());
    canceller.await.unwrap();
    assert!(cancel.is_cancelled());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_timeout() {
    let transport = Arc::new(MockTransport::hanging());
    let config = CloudWatchReporterConfiguration {
        send_timeout_secs: Some(2),
        ..Default::default()
    };
    let reporter = reporter_with(&config, &transport);

    let result = reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ReporterError::Timeout { timeout }) if timeout == Duration::from_secs(2)));
}

#[tokio::test]
async fn transport_failure_propagates() {
    let transport = Arc::new(MockTransport::failing());
    let reporter = reporter(&transport);

    let result = reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(ReporterError::Transport {
            source: TransportError::Rejected { status: 503, .. }
        })
    ));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn one_transport_call_for_every_context() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    assert!(reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await.unwrap());
    assert_eq!(transport.call_count(), 1);

    let records = transport.last_batch();
    let names = records.iter().map(Record::name).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "web-Satisfied",
            "web-Tolerating",
            "web-Frustrating",
            "web",
            "web",
            "db",
            "db",
            "db"
        ]
    );

    // Every record in a flush shares a single timestamp.
    let timestamp = records[0].timestamp();
    assert!(records.iter().all(|r| r.timestamp() == timestamp));

    // Counter with set items, then the meter with its rates.
    assert_eq!(records[3].dimensions().len(), 2);
    assert_eq!(records[4].dimensions().len(), 4);
    // Histogram and timer carry statistics.
    assert!(matches!(records[6].value(), RecordValue::Statistics(_)));
    assert!(matches!(records[7].value(), RecordValue::Statistics(_)));
}

#[tokio::test]
async fn reset_on_reporting_between_flushes() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);
    let cancel = CancellationToken::new();

    let counter = Counter::new();
    counter.increment(42);
    let snapshot = requests_snapshot(&counter, true);

    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.last_batch()[0].value().as_scalar(), Some(42.0));

    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.last_batch()[0].value().as_scalar(), Some(0.0));

    counter.increment(3);
    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.last_batch()[0].value().as_scalar(), Some(3.0));
}

#[test]
fn translation_is_idempotent_without_reset() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    let counter = Counter::new();
    counter.increment_item("a", 2);
    let meter = Meter::new();
    meter.mark_n(10);
    let snapshot = full_snapshot().with_context(
        MetricsContext::new("jobs")
            .with_counter(Measurement::new(
                "done",
                CounterSource::new(counter.clone()).with_report_set_items(true),
            ))
            .with_meter(Measurement::new("throughput", MeterSource::new(meter.clone()))),
    );

    let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let first = serde_json::to_vec(&reporter.translate(&snapshot, timestamp)).unwrap();

    // Activity after the snapshot was taken doesn't change what it reports.
    std::thread::sleep(Duration::from_millis(5));
    counter.increment_item("b", 7);
    meter.mark_n(100);

    let second = serde_json::to_vec(&reporter.translate(&snapshot, timestamp)).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn meter_reset_on_reporting_between_flushes() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);
    let cancel = CancellationToken::new();

    let (clock, mock) = Clock::mock();
    let meter = Meter::with_clock(clock);
    let snapshot = Snapshot::new().with_context(MetricsContext::new("queue").with_meter(Measurement::new(
        "dequeued",
        MeterSource::new(meter.clone()).with_reset_on_reporting(true),
    )));

    meter.mark_n(20);
    mock.increment(Duration::from_secs(4));
    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    let record = &transport.last_batch()[0];
    assert_eq!(record.value().as_scalar(), Some(5.0));
    assert_eq!(record.dimensions()[0].value(), "5");

    // The first flush reset the meter, so nothing has been marked since.
    mock.increment(Duration::from_secs(4));
    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.last_batch()[0].value().as_scalar(), Some(0.0));

    meter.mark_n(6);
    mock.increment(Duration::from_secs(2));
    assert!(reporter.flush(Some(&snapshot), &cancel).await.unwrap());
    assert_eq!(transport.last_batch()[0].value().as_scalar(), Some(3.0));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn filter_applies_before_translation() {
    let transport = Arc::new(MockTransport::default());
    let config = CloudWatchReporterConfiguration {
        filter: Some(FilterConfiguration {
            contexts: vec!["db".to_string()],
            types: vec!["gauge".to_string()],
            context_renames: [("db".to_string(), "database".to_string())].into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let reporter = reporter_with(&config, &transport);

    assert!(reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await.unwrap());
    let records = transport.last_batch();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name(), "database");
    assert_eq!(records[0].value(), &RecordValue::Scalar(4.0));
}

#[tokio::test]
async fn filter_excluding_everything_skips_send() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport).with_filter(MetricsFilter::new().with_types(MeasurementType::Apdex));

    let counter = Counter::new();
    counter.increment(1);
    assert!(reporter
        .flush(Some(&requests_snapshot(&counter, false)), &CancellationToken::new())
        .await
        .unwrap());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let transport = Arc::new(MockTransport::default());
    let reporter = reporter(&transport);

    reporter.close().await;
    reporter.close().await;
    assert!(transport.closed.load(Ordering::SeqCst));

    let result = reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ReporterError::Closed)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn batching_transport_behind_reporter() {
    let inner = Arc::new(MockTransport::default());
    let batching = BatchingTransport::new(Arc::clone(&inner)).with_max_records_per_request(3);
    let reporter =
        CloudWatchReporter::from_configuration(&CloudWatchReporterConfiguration::default(), Arc::new(batching)).unwrap();

    assert!(reporter.flush(Some(&full_snapshot()), &CancellationToken::new()).await.unwrap());
    let sizes = inner.calls.lock().unwrap().iter().map(|(_, r)| r.len()).collect::<Vec<_>>();
    assert_eq!(sizes, vec![3, 3, 2]);
}

#[test]
fn invalid_configuration() {
    let transport = Arc::new(MockTransport::default()) as Arc<dyn MetricsTransport>;

    let config = CloudWatchReporterConfiguration {
        namespace: "  ".to_string(),
        ..Default::default()
    };
    let result = CloudWatchReporter::from_configuration(&config, Arc::clone(&transport));
    assert!(matches!(result, Err(ReporterError::InvalidConfiguration { .. })));

    let config = CloudWatchReporterConfiguration {
        filter: Some(FilterConfiguration {
            types: vec!["sparkline".to_string()],
            ..Default::default()
        }),
        ..Default::default()
    };
    let result = CloudWatchReporter::from_configuration(&config, transport);
    assert!(matches!(result, Err(ReporterError::InvalidFilter { .. })));
}

type DebugMetrics = [(CompositeKey, Option<metrics::Unit>, Option<metrics::SharedString>, DebugValue)];

fn counter_value(metrics: &DebugMetrics, name: &str, outcome: Option<&str>) -> u64 {
    metrics
        .iter()
        .find(|(k, _, _, _)| {
            let outcome_matches = match outcome {
                Some(outcome) => k.key().labels().any(|l| l.key() == "outcome" && l.value() == outcome),
                None => true,
            };
            k.key().name() == name && outcome_matches
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(value) => *value,
            other => panic!("expected a counter, got: {:?}", other),
        })
        .unwrap_or_else(|| panic!("no metric found with key: {}", name))
}

#[tokio::test]
async fn telemetry() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let transport = Arc::new(MockTransport::default());
    let reporter = metrics::with_local_recorder(&recorder, || reporter(&transport));

    let cancel = CancellationToken::new();
    assert!(reporter.flush(Some(&full_snapshot()), &cancel).await.unwrap());
    assert!(!reporter.flush(None, &cancel).await.unwrap());

    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(counter_value(&metrics, "cirrus_flushes_total", Some("success")), 1);
    assert_eq!(counter_value(&metrics, "cirrus_flushes_total", Some("skipped")), 1);
    assert_eq!(counter_value(&metrics, "cirrus_records_sent_total", None), 8);
}
