use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;

#[derive(Debug, Default)]
struct CounterState {
    count: i64,
    items: IndexMap<String, i64>,
}

/// A counter accumulator.
///
/// Tracks a signed running count, and optionally a breakdown of that count by item (a "set" counter, such as requests
/// by endpoint). Clones share the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    state: Arc<Mutex<CounterState>>,
}

impl Counter {
    /// Creates a new `Counter` starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by `amount`.
    pub fn increment(&self, amount: i64) {
        self.lock().count += amount;
    }

    /// Decrements the counter by `amount`.
    pub fn decrement(&self, amount: i64) {
        self.lock().count -= amount;
    }

    /// Increments the counter by `amount`, attributing the increment to `item`.
    pub fn increment_item(&self, item: &str, amount: i64) {
        let mut state = self.lock();
        state.count += amount;
        match state.items.get_mut(item) {
            Some(count) => *count += amount,
            None => {
                state.items.insert(item.to_string(), amount);
            }
        }
    }

    /// Returns the current value without resetting it.
    pub fn value(&self) -> CounterValue {
        self.read(false)
    }

    /// Resets the counter, and all of its items, to zero.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.items.clear();
    }

    fn read(&self, reset: bool) -> CounterValue {
        let mut state = self.lock();

        let total = state.count;
        let items = state
            .items
            .iter()
            .map(|(item, count)| SetItem {
                item: item.clone(),
                count: *count,
                percent: if total == 0 {
                    0.0
                } else {
                    *count as f64 / total as f64 * 100.0
                },
            })
            .collect();

        if reset {
            state.count = 0;
            state.items.clear();
        }

        CounterValue { count: total, items }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterState> {
        // Counter state is always left consistent between statements, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A single item of a set counter.
#[derive(Clone, Debug, PartialEq)]
pub struct SetItem {
    /// Item name.
    pub item: String,

    /// Count attributed to this item.
    pub count: i64,

    /// Share of the counter's total attributed to this item, as a percentage.
    pub percent: f64,
}

/// A point-in-time counter reading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterValue {
    /// Total count.
    pub count: i64,

    /// Per-item breakdown, in the order items were first seen.
    pub items: Vec<SetItem>,
}

/// A counter as it appears in a snapshot.
///
/// Holds a handle to the live [`Counter`] along with the reporting options for it. The counter's value is captured when
/// the source is created, and that captured value is what gets reported. With reset-on-reporting enabled, the counter is
/// instead read (and reset) when the snapshot is reported, so that every increment is reported exactly once.
#[derive(Clone, Debug)]
pub struct CounterSource {
    counter: Counter,
    captured: CounterValue,
    reset_on_reporting: bool,
    report_set_items: bool,
}

impl CounterSource {
    /// Creates a new `CounterSource` for the given counter, with both reporting options disabled.
    pub fn new(counter: Counter) -> Self {
        Self {
            captured: counter.value(),
            counter,
            reset_on_reporting: false,
            report_set_items: false,
        }
    }

    /// Sets whether reading this counter for a report resets it.
    pub fn with_reset_on_reporting(mut self, reset_on_reporting: bool) -> Self {
        self.reset_on_reporting = reset_on_reporting;
        self
    }

    /// Sets whether per-item counts are reported.
    pub fn with_report_set_items(mut self, report_set_items: bool) -> Self {
        self.report_set_items = report_set_items;
        self
    }

    /// Returns `true` if reading this counter for a report resets it.
    pub fn reset_on_reporting(&self) -> bool {
        self.reset_on_reporting
    }

    /// Returns `true` if per-item counts are reported.
    pub fn report_set_items(&self) -> bool {
        self.report_set_items
    }

    /// Reads the counter for reporting.
    ///
    /// Without reset-on-reporting, this returns the value captured when the source was created, so repeated reads agree.
    ///
    /// When reset-on-reporting is enabled, the counter is reset atomically with the read, so this must be called exactly
    /// once per report: every value derived for the report has to come from the same returned `CounterValue`.
    pub fn read(&self) -> CounterValue {
        if self.reset_on_reporting {
            self.counter.read(true)
        } else {
            self.captured.clone()
        }
    }
}
