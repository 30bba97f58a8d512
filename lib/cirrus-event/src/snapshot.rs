use crate::{
    measurement::{
        ApdexValue, CounterSource, GaugeValue, HistogramValue, Measurement, MeterSource, Tag, TimerValue,
    },
    MeasurementType,
};

/// A named group of measurements.
///
/// Each measurement type is held in its own collection, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MetricsContext {
    name: String,
    apdex: Vec<Measurement<ApdexValue>>,
    counters: Vec<Measurement<CounterSource>>,
    gauges: Vec<Measurement<GaugeValue>>,
    histograms: Vec<Measurement<HistogramValue>>,
    meters: Vec<Measurement<MeterSource>>,
    timers: Vec<Measurement<TimerValue>>,
}

impl MetricsContext {
    /// Creates an empty `MetricsContext` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an Apdex score.
    pub fn with_apdex(mut self, apdex: Measurement<ApdexValue>) -> Self {
        self.apdex.push(apdex);
        self
    }

    /// Adds a counter.
    pub fn with_counter(mut self, counter: Measurement<CounterSource>) -> Self {
        self.counters.push(counter);
        self
    }

    /// Adds a gauge.
    pub fn with_gauge(mut self, gauge: Measurement<GaugeValue>) -> Self {
        self.gauges.push(gauge);
        self
    }

    /// Adds a histogram.
    pub fn with_histogram(mut self, histogram: Measurement<HistogramValue>) -> Self {
        self.histograms.push(histogram);
        self
    }

    /// Adds a meter.
    pub fn with_meter(mut self, meter: Measurement<MeterSource>) -> Self {
        self.meters.push(meter);
        self
    }

    /// Adds a timer.
    pub fn with_timer(mut self, timer: Measurement<TimerValue>) -> Self {
        self.timers.push(timer);
        self
    }

    /// Returns the context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Apdex scores.
    pub fn apdex(&self) -> &[Measurement<ApdexValue>] {
        &self.apdex
    }

    /// Returns the counters.
    pub fn counters(&self) -> &[Measurement<CounterSource>] {
        &self.counters
    }

    /// Returns the gauges.
    pub fn gauges(&self) -> &[Measurement<GaugeValue>] {
        &self.gauges
    }

    /// Returns the histograms.
    pub fn histograms(&self) -> &[Measurement<HistogramValue>] {
        &self.histograms
    }

    /// Returns the meters.
    pub fn meters(&self) -> &[Measurement<MeterSource>] {
        &self.meters
    }

    /// Returns the timers.
    pub fn timers(&self) -> &[Measurement<TimerValue>] {
        &self.timers
    }

    /// Returns the total number of measurements across all types.
    pub fn len(&self) -> usize {
        self.apdex.len()
            + self.counters.len()
            + self.gauges.len()
            + self.histograms.len()
            + self.meters.len()
            + self.timers.len()
    }

    /// Returns `true` if the context holds no measurements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a copy of this context under `name`, keeping only the measurements for which `keep` returns `true`.
    ///
    /// `keep` is called with the measurement type, name, and tags of each measurement. Counters and meters in the copy
    /// share their accumulators with this context.
    pub fn filtered<F>(&self, name: impl Into<String>, mut keep: F) -> Self
    where
        F: FnMut(MeasurementType, &str, &[Tag]) -> bool,
    {
        fn retain<V: Clone, F>(items: &[Measurement<V>], ty: MeasurementType, keep: &mut F) -> Vec<Measurement<V>>
        where
            F: FnMut(MeasurementType, &str, &[Tag]) -> bool,
        {
            items
                .iter()
                .filter(|m| keep(ty, m.name(), m.tags()))
                .cloned()
                .collect()
        }

        Self {
            name: name.into(),
            apdex: retain(&self.apdex, MeasurementType::Apdex, &mut keep),
            counters: retain(&self.counters, MeasurementType::Counter, &mut keep),
            gauges: retain(&self.gauges, MeasurementType::Gauge, &mut keep),
            histograms: retain(&self.histograms, MeasurementType::Histogram, &mut keep),
            meters: retain(&self.meters, MeasurementType::Meter, &mut keep),
            timers: retain(&self.timers, MeasurementType::Timer, &mut keep),
        }
    }
}

/// The state of all measurements at a single instant.
///
/// Contexts are kept in the order they were added.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    contexts: Vec<MetricsContext>,
}

impl Snapshot {
    /// Creates an empty `Snapshot`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a context.
    pub fn with_context(mut self, context: MetricsContext) -> Self {
        self.contexts.push(context);
        self
    }

    /// Returns the contexts, in insertion order.
    pub fn contexts(&self) -> &[MetricsContext] {
        &self.contexts
    }

    /// Returns `true` if the snapshot holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl FromIterator<MetricsContext> for Snapshot {
    fn from_iter<I: IntoIterator<Item = MetricsContext>>(iter: I) -> Self {
        Self {
            contexts: iter.into_iter().collect(),
        }
    }
}
