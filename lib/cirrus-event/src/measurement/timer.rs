use super::{HistogramValue, MeterValue};

/// A timer reading.
///
/// A timer is a histogram of durations combined with a meter of how often the timed operation is invoked.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimerValue {
    /// Invocation rate.
    pub rate: MeterValue,

    /// Distribution of recorded durations.
    pub histogram: HistogramValue,
}

impl TimerValue {
    /// Creates a new `TimerValue` from its parts.
    pub fn new(rate: MeterValue, histogram: HistogramValue) -> Self {
        Self { rate, histogram }
    }
}
