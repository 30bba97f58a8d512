/// An Apdex score.
///
/// Apdex summarizes user satisfaction with response times by classifying each sample as satisfied, tolerating, or
/// frustrating relative to a target threshold. The score is `(satisfied + tolerating / 2) / sample_size`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ApdexValue {
    /// Apdex score, between 0.0 and 1.0.
    pub score: f64,

    /// Total number of samples the score was computed over.
    pub sample_size: u64,

    /// Number of satisfied samples.
    pub satisfied: u64,

    /// Number of tolerating samples.
    pub tolerating: u64,

    /// Number of frustrating samples.
    pub frustrating: u64,
}

impl ApdexValue {
    /// Creates an `ApdexValue` from the per-category sample counts, computing the score.
    ///
    /// With no samples, the score is zero.
    pub fn from_counts(satisfied: u64, tolerating: u64, frustrating: u64) -> Self {
        let sample_size = satisfied + tolerating + frustrating;
        let score = if sample_size == 0 {
            0.0
        } else {
            (satisfied as f64 + tolerating as f64 / 2.0) / sample_size as f64
        };

        Self {
            score,
            sample_size,
            satisfied,
            tolerating,
            frustrating,
        }
    }
}
