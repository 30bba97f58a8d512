use cirrus_event::{
    measurement::{
        ApdexValue, Counter, CounterSource, GaugeValue, HistogramValue, Measurement, Meter, MeterSource, TimerValue,
    },
    MetricsContext, Snapshot,
};
use rand::{rngs::StdRng, Rng as _, SeedableRng as _};

const ENDPOINTS: [&str; 4] = ["/", "/login", "/cart", "/checkout"];

// Apdex target: requests at or under this are satisfied, and up to four times it are tolerated.
const APDEX_THRESHOLD_MS: f64 = 100.0;

/// A simulated web application.
///
/// Every call to [`simulate`][Workload::simulate] generates a burst of requests against a handful of endpoints, and a
/// background job queue that drains in batches.
pub struct Workload {
    rng: StdRng,
    requests: Counter,
    errors: Counter,
    throughput: Meter,
    latencies_ms: Vec<f64>,
    batch_sizes: Vec<f64>,
    queue_depth: f64,
}

impl Workload {
    /// Creates a new `Workload`, seeded so that runs are reproducible.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            requests: Counter::new(),
            errors: Counter::new(),
            throughput: Meter::new(),
            latencies_ms: Vec::new(),
            batch_sizes: Vec::new(),
            queue_depth: 0.0,
        }
    }

    /// Generates one interval's worth of traffic.
    pub fn simulate(&mut self) {
        let requests = self.rng.random_range(20..200);
        for _ in 0..requests {
            let endpoint = ENDPOINTS[self.rng.random_range(0..ENDPOINTS.len())];
            self.requests.increment_item(endpoint, 1);
            self.throughput.mark();

            // Mostly fast, with a long tail.
            let latency = if self.rng.random_bool(0.9) {
                self.rng.random_range(5.0..120.0)
            } else {
                self.rng.random_range(120.0..900.0)
            };
            self.latencies_ms.push(latency);

            if self.rng.random_bool(0.02) {
                self.errors.increment(1);
            }
        }

        let enqueued = self.rng.random_range(0.0..50.0);
        let drained = self.rng.random_range(0.0..50.0_f64).min(self.queue_depth + enqueued);
        self.queue_depth += enqueued - drained;
        if drained > 0.0 {
            self.batch_sizes.push(drained.round());
        }
    }

    /// Takes a snapshot of the current measurements.
    ///
    /// Per-interval samples (latencies and batch sizes) are cleared, so each snapshot only describes the traffic since the
    /// previous one.
    pub fn snapshot(&mut self) -> Snapshot {
        let latency = HistogramValue::from_samples(&self.latencies_ms);
        let apdex = self.apdex();
        let timer = TimerValue::new(self.throughput.value(), latency);
        let batches = HistogramValue::from_samples(&self.batch_sizes);

        self.latencies_ms.clear();
        self.batch_sizes.clear();

        Snapshot::new()
            .with_context(
                MetricsContext::new("web")
                    .with_apdex(Measurement::new("apdex", apdex))
                    .with_counter(Measurement::new(
                        "requests",
                        CounterSource::new(self.requests.clone())
                            .with_reset_on_reporting(true)
                            .with_report_set_items(true),
                    ))
                    .with_counter(
                        Measurement::new("errors", CounterSource::new(self.errors.clone())).with_unit("Count"),
                    )
                    .with_meter(Measurement::new("throughput", MeterSource::new(self.throughput.clone())))
                    .with_timer(Measurement::new("latency", timer).with_unit("Milliseconds")),
            )
            .with_context(
                MetricsContext::new("jobs")
                    .with_gauge(Measurement::new("queue_depth", GaugeValue(self.queue_depth.round())))
                    .with_histogram(Measurement::new("batch_size", batches)),
            )
    }

    fn apdex(&self) -> ApdexValue {
        let (mut satisfied, mut tolerating, mut frustrating) = (0, 0, 0);
        for &latency in &self.latencies_ms {
            if latency <= APDEX_THRESHOLD_MS {
                satisfied += 1;
            } else if latency <= 4.0 * APDEX_THRESHOLD_MS {
                tolerating += 1;
            } else {
                frustrating += 1;
            }
        }
        ApdexValue::from_counts(satisfied, tolerating, frustrating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_covers_every_measurement_type() {
        let mut workload = Workload::new(1);
        workload.simulate();
        let snapshot = workload.snapshot();

        let names = snapshot.contexts().iter().map(|c| c.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["web", "jobs"]);

        let web = &snapshot.contexts()[0];
        assert_eq!(web.apdex().len(), 1);
        assert_eq!(web.counters().len(), 2);
        assert_eq!(web.meters().len(), 1);
        assert_eq!(web.timers().len(), 1);

        let apdex = web.apdex()[0].value();
        let timer = web.timers()[0].value();
        assert_eq!(apdex.sample_size, timer.histogram.count);
        assert!(timer.histogram.count >= 20);
    }

    #[test]
    fn samples_reset_between_snapshots() {
        let mut workload = Workload::new(7);
        workload.simulate();
        let _ = workload.snapshot();

        let snapshot = workload.snapshot();
        let web = &snapshot.contexts()[0];
        assert!(web.timers()[0].value().histogram.is_empty());
        assert_eq!(web.apdex()[0].value().sample_size, 0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut first = Workload::new(42);
        let mut second = Workload::new(42);
        first.simulate();
        second.simulate();

        assert_eq!(first.latencies_ms, second.latencies_ms);
        assert_eq!(first.requests.value(), second.requests.value());
    }
}
