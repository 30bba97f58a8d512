//! Backend data points.
//!
//! A [`Record`] is the flat, dimensioned form every measurement is translated into before being sent. Records
//! serialize directly to the backend's point shape:
//!
//! ```json
//! {"MetricName":"web","Timestamp":"2024-01-01T00:00:00Z","Value":42.0,"Dimensions":[{"Name":"/users","Value":"7"}]}
//! ```
use chrono::{DateTime, Utc};
use serde::Serialize;

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Summary statistics of a distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StatisticSet {
    #[serde(rename = "Minimum")]
    min: f64,

    #[serde(rename = "Maximum")]
    max: f64,

    #[serde(rename = "Sum")]
    sum: f64,

    #[serde(rename = "SampleCount")]
    count: u64,
}

impl StatisticSet {
    /// Creates a new `StatisticSet`.
    ///
    /// Non-finite inputs are replaced with zero, as the backend rejects them.
    pub fn new(min: f64, max: f64, sum: f64, count: u64) -> Self {
        Self {
            min: finite_or_zero(min),
            max: finite_or_zero(max),
            sum: finite_or_zero(sum),
            count,
        }
    }

    /// Returns the minimum.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Returns the maximum.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns the sum.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Returns the sample count.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Value of a record.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum RecordValue {
    /// A single value.
    #[serde(rename = "Value")]
    Scalar(f64),

    /// Summary statistics of a distribution.
    #[serde(rename = "StatisticValues")]
    Statistics(StatisticSet),
}

impl RecordValue {
    /// Returns the scalar value, if this is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Statistics(_) => None,
        }
    }

    /// Returns the statistics, if this is a statistic set.
    pub fn as_statistics(&self) -> Option<&StatisticSet> {
        match self {
            Self::Scalar(_) => None,
            Self::Statistics(stats) => Some(stats),
        }
    }
}

/// A record dimension.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Dimension {
    #[serde(rename = "Name")]
    key: String,

    #[serde(rename = "Value")]
    value: String,
}

impl Dimension {
    /// Creates a new `Dimension`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns the dimension key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the dimension value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn key_mut(&mut self) -> &mut String {
        &mut self.key
    }

    pub(crate) fn value_mut(&mut self) -> &mut String {
        &mut self.value
    }
}

/// A single time-stamped data point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "MetricName")]
    name: String,

    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,

    #[serde(flatten)]
    value: RecordValue,

    #[serde(rename = "Unit", skip_serializing_if = "Option::is_none")]
    unit: Option<String>,

    #[serde(rename = "Dimensions", skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<Dimension>,
}

impl Record {
    /// Creates a scalar record.
    ///
    /// A non-finite value is replaced with zero.
    pub fn scalar(name: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self::new(name, timestamp, RecordValue::Scalar(finite_or_zero(value)))
    }

    /// Creates a statistics record.
    pub fn statistics(name: impl Into<String>, timestamp: DateTime<Utc>, stats: StatisticSet) -> Self {
        Self::new(name, timestamp, RecordValue::Statistics(stats))
    }

    fn new(name: impl Into<String>, timestamp: DateTime<Utc>, value: RecordValue) -> Self {
        Self {
            name: name.into(),
            timestamp,
            value,
            unit: None,
            dimensions: Vec::new(),
        }
    }

    /// Appends a dimension.
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(key, value));
        self
    }

    /// Sets the unit.
    pub fn with_unit(mut self, unit: Option<&str>) -> Self {
        self.unit = unit.map(str::to_string);
        self
    }

    /// Returns the record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the record timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the record value.
    pub fn value(&self) -> &RecordValue {
        &self.value
    }

    /// Returns the record unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Returns the record dimensions, in order.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub(crate) fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }

    pub(crate) fn dimensions_mut(&mut self) -> &mut Vec<Dimension> {
        &mut self.dimensions
    }
}
