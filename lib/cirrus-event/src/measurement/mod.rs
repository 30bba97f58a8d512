//! Measurement types.
//!
//! Every measurement in a context is a [`Measurement`]: a name, an optional unit, a set of tags, and a payload whose
//! shape depends on the measurement type.
//!
//! Most payloads are plain values computed by the instrumentation layer at snapshot time. Counters and meters are the
//! exception: their payload is a *source* ([`CounterSource`], [`MeterSource`]) holding a handle to the live accumulator,
//! since reporting them may reset the accumulator as part of the read. Sources that don't reset capture their reading
//! when they are created, so a snapshot reports the same values no matter how many times it is translated.
use std::fmt;

use smallvec::SmallVec;

mod apdex;
pub use self::apdex::ApdexValue;

mod counter;
pub use self::counter::{Counter, CounterSource, CounterValue, SetItem};

mod histogram;
pub use self::histogram::HistogramValue;

mod meter;
pub use self::meter::{Meter, MeterSource, MeterValue};

mod timer;
pub use self::timer::TimerValue;

/// A gauge reading.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GaugeValue(pub f64);

impl From<f64> for GaugeValue {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// A measurement tag.
///
/// Tags are either bare (`canary`) or key/value pairs (`region:us-east-1`).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Tag {
    key: String,
    value: Option<String>,
}

impl Tag {
    /// Creates a key/value tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a bare tag.
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Returns the tag key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the tag value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl From<&str> for Tag {
    fn from(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((key, value)) => Self::new(key, value),
            None => Self::bare(raw),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// A named measurement.
#[derive(Clone, Debug)]
pub struct Measurement<V> {
    name: String,
    unit: Option<String>,
    tags: SmallVec<[Tag; 4]>,
    value: V,
}

impl<V> Measurement<V> {
    /// Creates a new `Measurement` with the given name and payload.
    pub fn new(name: impl Into<String>, value: V) -> Self {
        Self {
            name: name.into(),
            unit: None,
            tags: SmallVec::new(),
            value,
        }
    }

    /// Sets the unit of this measurement.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Adds a tag to this measurement.
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the name of this measurement.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit of this measurement, if one was set.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Returns the tags of this measurement.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns a reference to the payload.
    pub fn value(&self) -> &V {
        &self.value
    }
}
