//! Exponentially weighted moving average of an event rate.
//!
//! Events accumulate between ticks; each tick turns them into an
//! instantaneous rate and folds it into the average:
//! `rate += alpha * (instant - rate)` with
//! `alpha = 1 - exp(-tick_secs / 60 / window_minutes)`. The first tick seeds
//! the average with the instantaneous rate.
//!
//! Ticks are expected from a single scheduler thread; reads may happen from
//! anywhere.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use super::atomic_f64::AtomicF64;
use super::time_unit::TimeUnit;

/// Tick interval the one/five/fifteen minute averages are tuned for.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

const SECONDS_PER_MINUTE: f64 = 60.0;

#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_nanos: f64,
    uncounted: AtomicI64,
    // events per nanosecond
    rate: AtomicF64,
    initialized: AtomicBool,
}

impl Ewma {
    pub fn new(alpha: f64, tick_interval: Duration) -> Self {
        Self {
            alpha,
            interval_nanos: tick_interval.as_nanos() as f64,
            uncounted: AtomicI64::new(0),
            rate: AtomicF64::new(0.0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Average over `window_minutes`, ticked every `tick_interval`.
    pub fn with_window(window_minutes: f64, tick_interval: Duration) -> Self {
        Self::new(alpha_for(window_minutes, tick_interval), tick_interval)
    }

    pub fn one_minute() -> Self {
        Self::with_window(1.0, DEFAULT_TICK_INTERVAL)
    }

    pub fn five_minute() -> Self {
        Self::with_window(5.0, DEFAULT_TICK_INTERVAL)
    }

    pub fn fifteen_minute() -> Self {
        Self::with_window(15.0, DEFAULT_TICK_INTERVAL)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Records `count` events for the current tick.
    pub fn update(&self, count: i64) {
        self.uncounted.fetch_add(count, Ordering::Relaxed);
    }

    /// Folds the events recorded since the previous tick into the average.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        self.tick_with(count);
    }

    /// Folds an externally counted number of events into the average.
    pub(crate) fn tick_with(&self, count: i64) {
        let instant_rate = count as f64 / self.interval_nanos;
        if self.initialized.load(Ordering::Acquire) {
            let rate = self.rate.load();
            self.rate.store(rate + self.alpha * (instant_rate - rate));
        } else {
            self.rate.store(instant_rate);
            self.initialized.store(true, Ordering::Release);
        }
    }

    /// Current average expressed as events per `unit`.
    pub fn rate(&self, unit: TimeUnit) -> f64 {
        self.rate.load() * unit.nanos_per_unit() as f64
    }

    /// Back to the pre-first-tick state; the next tick seeds again.
    pub fn reset(&self) {
        self.uncounted.store(0, Ordering::Relaxed);
        self.rate.store(0.0);
        self.initialized.store(false, Ordering::Release);
    }
}

pub(crate) fn alpha_for(window_minutes: f64, tick_interval: Duration) -> f64 {
    1.0 - (-tick_interval.as_secs_f64() / SECONDS_PER_MINUTE / window_minutes).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn elapse_minute(ewma: &Ewma) {
        for _ in 0..12 {
            ewma.tick();
        }
    }

    fn run_fixture(ewma: Ewma, expected_per_minute: &[f64]) {
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(TimeUnit::Seconds), 0.6);
        for expected in expected_per_minute {
            elapse_minute(&ewma);
            assert_close(ewma.rate(TimeUnit::Seconds), *expected);
        }
    }

    #[test]
    fn one_minute_average_with_a_value_of_three() {
        run_fixture(
            Ewma::one_minute(),
            &[
                0.22072766, 0.08120117, 0.02987224, 0.01098938, 0.00404277, 0.00148725,
                0.00054713, 0.00020128, 0.00007405, 0.00002724, 0.00001002, 0.00000369,
                0.00000136, 0.00000050, 0.00000018,
            ],
        );
    }

    #[test]
    fn five_minute_average_with_a_value_of_three() {
        run_fixture(
            Ewma::five_minute(),
            &[
                0.49123845, 0.40219203, 0.32928698, 0.26959738, 0.22072766, 0.18071653,
                0.14795818, 0.12113791, 0.09917933, 0.08120117, 0.06648190, 0.05443077,
                0.04456415, 0.03648604, 0.02987224,
            ],
        );
    }

    #[test]
    fn fifteen_minute_average_with_a_value_of_three() {
        run_fixture(
            Ewma::fifteen_minute(),
            &[
                0.56130419, 0.52510399, 0.49123845, 0.45955700, 0.42991879, 0.40219203,
                0.37625345, 0.35198773, 0.32928698, 0.30805027, 0.28818318, 0.26959738,
                0.25221023, 0.23594443, 0.22072766,
            ],
        );
    }

    #[test]
    fn rate_converts_units() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(TimeUnit::Minutes), 36.0);
        assert_close(ewma.rate(TimeUnit::Milliseconds), 0.0006);
    }

    #[test]
    fn reset_reseeds_on_next_tick() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        ewma.reset();
        assert_eq!(ewma.rate(TimeUnit::Seconds), 0.0);
        ewma.update(10);
        ewma.tick();
        assert_close(ewma.rate(TimeUnit::Seconds), 2.0);
    }
}
