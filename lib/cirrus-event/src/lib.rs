//! Snapshot data model for Cirrus.
//!
//! A [`Snapshot`] is the full state of an application's measurements at a single instant: an ordered list of
//! [`MetricsContext`]s, each grouping Apdex scores, counters, gauges, histograms, meters, and timers under a shared name.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{fmt, str::FromStr};

use bitmask_enum::bitmask;
use snafu::Snafu;

pub mod measurement;

mod snapshot;
pub use self::snapshot::{MetricsContext, Snapshot};

/// Measurement type.
///
/// This type is a bitmask, so several measurement types can be combined, such as when describing which types a filter
/// allows through.
#[bitmask(u8)]
#[bitmask_config(vec_debug)]
pub enum MeasurementType {
    /// Apdex scores.
    Apdex,

    /// Counters.
    Counter,

    /// Gauges.
    Gauge,

    /// Histograms.
    Histogram,

    /// Meters.
    Meter,

    /// Timers.
    Timer,
}

impl MeasurementType {
    const NAMES: [(MeasurementType, &'static str); 6] = [
        (MeasurementType::Apdex, "apdex"),
        (MeasurementType::Counter, "counter"),
        (MeasurementType::Gauge, "gauge"),
        (MeasurementType::Histogram, "histogram"),
        (MeasurementType::Meter, "meter"),
        (MeasurementType::Timer, "timer"),
    ];
}

impl Default for MeasurementType {
    fn default() -> Self {
        Self::all_bits()
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = Self::NAMES
            .iter()
            .filter(|(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();

        write!(f, "{}", names.join("|"))
    }
}

/// An error from parsing a [`MeasurementType`].
#[derive(Debug, Snafu)]
#[snafu(display("Unknown measurement type '{}'.", value))]
pub struct ParseMeasurementTypeError {
    value: String,
}

impl ParseMeasurementTypeError {
    /// Returns the value that failed to parse.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for MeasurementType {
    type Err = ParseMeasurementTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(ty, _)| *ty)
            .ok_or_else(|| ParseMeasurementTypeSnafu { value: s }.build())
    }
}
