/// A histogram summary.
///
/// Carries the aggregates the instrumentation layer computed over the histogram's current sample window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HistogramValue {
    /// Number of samples.
    pub count: u64,

    /// Sum of all samples.
    pub sum: f64,

    /// Smallest sample, or zero when empty.
    pub min: f64,

    /// Largest sample, or zero when empty.
    pub max: f64,

    /// Mean of all samples, or zero when empty.
    pub mean: f64,

    /// Most recently recorded sample, or zero when empty.
    pub last_value: f64,
}

impl HistogramValue {
    /// Computes a summary over the given samples, in recording order.
    pub fn from_samples(samples: &[f64]) -> Self {
        let Some(&last_value) = samples.last() else {
            return Self::default();
        };

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &sample in samples {
            min = min.min(sample);
            max = max.max(sample);
            sum += sample;
        }

        Self {
            count: samples.len() as u64,
            sum,
            min,
            max,
            mean: sum / samples.len() as f64,
            last_value,
        }
    }

    /// Returns `true` if the histogram holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
