//! Measurement translators.
//!
//! Each measurement type has its own translator, turning an already-read value into one or more records named after the
//! context. Translators never fail and never skip a measurement, even one with no samples.
use chrono::{DateTime, Utc};
use cirrus_event::{
    measurement::{ApdexValue, CounterValue, GaugeValue, HistogramValue, MeterValue, TimerValue},
    MetricsContext,
};

use crate::records::{Record, StatisticSet};

/// Apdex sub-score names, in the order their records are produced.
pub const APDEX_SUBSCORES: [&str; 3] = ["Satisfied", "Tolerating", "Frustrating"];

/// Rate dimension keys, in the order they are attached to meter and timer records.
pub const RATE_DIMENSIONS: [&str; 4] = ["MeanRate", "OneMinuteRate", "FiveMinuteRate", "FifteenMinuteRate"];

/// Translates an Apdex score into one record per sub-score.
pub fn apdex_records(context: &str, timestamp: DateTime<Utc>, value: &ApdexValue) -> [Record; 3] {
    let counts = [value.satisfied, value.tolerating, value.frustrating];
    let mut index = 0;
    counts.map(|count| {
        let name = format!("{}-{}", context, APDEX_SUBSCORES[index]);
        index += 1;
        Record::scalar(name, timestamp, count as f64)
    })
}

/// Translates a counter reading.
///
/// When `report_set_items` is set, every item becomes a dimension carrying that item's count.
pub fn counter_record(
    context: &str, timestamp: DateTime<Utc>, value: &CounterValue, report_set_items: bool,
) -> Record {
    let mut record = Record::scalar(context, timestamp, value.count as f64);
    if report_set_items {
        for item in &value.items {
            record = record.with_dimension(item.item.as_str(), item.count.to_string());
        }
    }
    record
}

/// Translates a gauge reading.
pub fn gauge_record(context: &str, timestamp: DateTime<Utc>, value: &GaugeValue) -> Record {
    Record::scalar(context, timestamp, value.0)
}

/// Translates a histogram summary.
pub fn histogram_record(context: &str, timestamp: DateTime<Utc>, value: &HistogramValue) -> Record {
    Record::statistics(context, timestamp, statistics(value))
}

/// Translates a meter reading.
pub fn meter_record(context: &str, timestamp: DateTime<Utc>, value: &MeterValue) -> Record {
    with_rates(Record::scalar(context, timestamp, value.mean_rate), value)
}

/// Translates a timer reading.
pub fn timer_record(context: &str, timestamp: DateTime<Utc>, value: &TimerValue) -> Record {
    with_rates(
        Record::statistics(context, timestamp, statistics(&value.histogram)),
        &value.rate,
    )
}

fn statistics(value: &HistogramValue) -> StatisticSet {
    StatisticSet::new(value.min, value.max, value.sum, value.count)
}

fn with_rates(record: Record, rate: &MeterValue) -> Record {
    let rates = [
        rate.mean_rate,
        rate.one_minute_rate,
        rate.five_minute_rate,
        rate.fifteen_minute_rate,
    ];

    RATE_DIMENSIONS
        .iter()
        .zip(rates)
        .fold(record, |record, (key, rate)| record.with_dimension(*key, rate.to_string()))
}

/// Translates every measurement in a context, appending the records to `records`.
///
/// Measurement types are visited in a fixed order: Apdex scores, counters, gauges, histograms, meters, then timers.
/// Counters and meters are read exactly once each, so any reset-on-reporting side effect happens here.
pub fn translate_context(context: &MetricsContext, timestamp: DateTime<Utc>, records: &mut Vec<Record>) {
    let name = context.name();

    for apdex in context.apdex() {
        records.extend(
            apdex_records(name, timestamp, apdex.value())
                .into_iter()
                .map(|record| record.with_unit(apdex.unit())),
        );
    }

    for counter in context.counters() {
        let source = counter.value();
        let value = source.read();
        records.push(counter_record(name, timestamp, &value, source.report_set_items()).with_unit(counter.unit()));
    }

    for gauge in context.gauges() {
        records.push(gauge_record(name, timestamp, gauge.value()).with_unit(gauge.unit()));
    }

    for histogram in context.histograms() {
        records.push(histogram_record(name, timestamp, histogram.value()).with_unit(histogram.unit()));
    }

    for meter in context.meters() {
        let value = meter.value().read();
        records.push(meter_record(name, timestamp, &value).with_unit(meter.unit()));
    }

    for timer in context.timers() {
        records.push(timer_record(name, timestamp, timer.value()).with_unit(timer.unit()));
    }
}
