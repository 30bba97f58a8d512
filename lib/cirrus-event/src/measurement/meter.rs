use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use quanta::{Clock, Instant};

// Moving averages are advanced in fixed steps, matching the classic load-average style meter.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Ewma {
    alpha: f64,
    rate: f64,
    uncounted: u64,
    initialized: bool,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp(),
            rate: 0.0,
            uncounted: 0,
            initialized: false,
        }
    }

    fn update(&mut self, n: u64) {
        self.uncounted += n;
    }

    fn tick(&mut self) {
        let instant_rate = self.uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        self.uncounted = 0;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    fn reset(&mut self) {
        self.rate = 0.0;
        self.uncounted = 0;
        self.initialized = false;
    }
}

#[derive(Debug)]
struct MeterState {
    count: u64,
    start: Instant,
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterState {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            start: now,
            last_tick: now,
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
        }
    }

    fn tick_if_necessary(&mut self, now: Instant) {
        let age = now.duration_since(self.last_tick);
        if age < TICK_INTERVAL {
            return;
        }

        let ticks = (age.as_nanos() / TICK_INTERVAL.as_nanos()) as u32;
        self.last_tick = self.last_tick + TICK_INTERVAL * ticks;
        for _ in 0..ticks {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }

    fn snapshot(&self, now: Instant) -> MeterValue {
        let elapsed = now.duration_since(self.start).as_secs_f64();
        let mean_rate = if self.count == 0 || elapsed <= 0.0 {
            0.0
        } else {
            self.count as f64 / elapsed
        };

        MeterValue {
            count: self.count,
            mean_rate,
            one_minute_rate: self.m1.rate,
            five_minute_rate: self.m5.rate,
            fifteen_minute_rate: self.m15.rate,
        }
    }

    fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.start = now;
        self.last_tick = now;
        self.m1.reset();
        self.m5.reset();
        self.m15.reset();
    }
}

/// A meter accumulator.
///
/// Tracks the number of events marked, the mean rate since creation (or the last reset), and exponentially-weighted
/// moving average rates over one, five, and fifteen minutes. All rates are per second. Clones share the same underlying
/// state.
#[derive(Clone, Debug)]
pub struct Meter {
    clock: Clock,
    state: Arc<Mutex<MeterState>>,
}

impl Meter {
    /// Creates a new `Meter` using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    /// Creates a new `Meter` using the given clock.
    pub fn with_clock(clock: Clock) -> Self {
        let now = clock.now();
        Self {
            clock,
            state: Arc::new(Mutex::new(MeterState::new(now))),
        }
    }

    /// Marks a single event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Marks `n` events.
    pub fn mark_n(&self, n: u64) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.tick_if_necessary(now);
        state.count += n;
        state.m1.update(n);
        state.m5.update(n);
        state.m15.update(n);
    }

    /// Returns the current value without resetting it.
    pub fn value(&self) -> MeterValue {
        self.read(false)
    }

    fn read(&self, reset: bool) -> MeterValue {
        let now = self.clock.now();
        let mut state = self.lock();
        state.tick_if_necessary(now);

        let value = state.snapshot(now);
        if reset {
            state.reset(now);
        }
        value
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MeterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time meter reading. All rates are per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterValue {
    /// Number of events marked.
    pub count: u64,

    /// Mean rate since the meter was created or last reset.
    pub mean_rate: f64,

    /// One-minute exponentially-weighted moving average rate.
    pub one_minute_rate: f64,

    /// Five-minute exponentially-weighted moving average rate.
    pub five_minute_rate: f64,

    /// Fifteen-minute exponentially-weighted moving average rate.
    pub fifteen_minute_rate: f64,
}

/// A meter as it appears in a snapshot.
///
/// Holds a handle to the live [`Meter`]. The meter is read when the source is created, so its rates are fixed as of that
/// instant. With reset-on-reporting enabled, the meter is instead read (and reset) when the snapshot is reported.
#[derive(Clone, Debug)]
pub struct MeterSource {
    meter: Meter,
    captured: MeterValue,
    reset_on_reporting: bool,
}

impl MeterSource {
    /// Creates a new `MeterSource` for the given meter, without reset-on-reporting.
    pub fn new(meter: Meter) -> Self {
        Self {
            captured: meter.value(),
            meter,
            reset_on_reporting: false,
        }
    }

    /// Sets whether reading this meter for a report resets it.
    pub fn with_reset_on_reporting(mut self, reset_on_reporting: bool) -> Self {
        self.reset_on_reporting = reset_on_reporting;
        self
    }

    /// Returns `true` if reading this meter for a report resets it.
    pub fn reset_on_reporting(&self) -> bool {
        self.reset_on_reporting
    }

    /// Reads the meter for reporting.
    ///
    /// Without reset-on-reporting, this returns the reading taken when the source was created.
    ///
    /// When reset-on-reporting is enabled, the meter is reset atomically with the read, so this must be called exactly
    /// once per report.
    pub fn read(&self) -> MeterValue {
        if self.reset_on_reporting {
            self.meter.read(true)
        } else {
            self.captured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_rate_over_elapsed_time() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::with_clock(clock);

        meter.mark_n(10);
        mock.increment(Duration::from_secs(2));

        let value = meter.value();
        assert_eq!(value.count, 10);
        assert_eq!(value.mean_rate, 5.0);
        // No tick has elapsed yet.
        assert_eq!(value.one_minute_rate, 0.0);
    }

    #[test]
    fn first_tick_seeds_moving_averages() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::with_clock(clock);

        meter.mark_n(25);
        mock.increment(TICK_INTERVAL);

        let value = meter.value();
        assert_eq!(value.one_minute_rate, 5.0);
        assert_eq!(value.five_minute_rate, 5.0);
        assert_eq!(value.fifteen_minute_rate, 5.0);
    }

    #[test]
    fn moving_averages_decay_without_events() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::with_clock(clock);

        meter.mark_n(25);
        mock.increment(TICK_INTERVAL);
        let seeded = meter.value();

        mock.increment(Duration::from_secs(60));
        let decayed = meter.value();

        assert!(decayed.one_minute_rate < seeded.one_minute_rate);
        assert!(decayed.one_minute_rate < decayed.five_minute_rate);
        assert!(decayed.five_minute_rate < decayed.fifteen_minute_rate);
    }

    #[test]
    fn read_with_reset() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::with_clock(clock);
        let source = MeterSource::new(meter.clone()).with_reset_on_reporting(true);

        meter.mark_n(4);
        mock.increment(Duration::from_secs(1));

        let first = source.read();
        assert_eq!(first.count, 4);
        assert_eq!(first.mean_rate, 4.0);

        mock.increment(Duration::from_secs(1));
        assert_eq!(source.read(), MeterValue::default());
    }

    #[test]
    fn read_without_reset_is_fixed_at_capture() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::with_clock(clock);

        meter.mark_n(10);
        mock.increment(Duration::from_secs(2));
        let source = MeterSource::new(meter.clone());

        mock.increment(Duration::from_secs(3));
        meter.mark_n(10);
        assert_eq!(source.read().count, 10);
        assert_eq!(source.read().mean_rate, 5.0);
        assert_eq!(source.read(), source.read());
        assert_eq!(meter.value().count, 20);
    }
}
