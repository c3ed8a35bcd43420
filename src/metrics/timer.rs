//! Timer: a duration histogram plus a meter of how often durations arrive.
//!
//! Durations are recorded in nanoseconds. Sessions can be timed three ways:
//! [`TimerMetric::time`] around a closure, a [`TimerContext`] that records
//! when dropped or disposed, or raw
//! [`start_recording`](TimerMetric::start_recording) /
//! [`end_recording`](TimerMetric::end_recording) around an explicit
//! [`record`](Timer::record).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::{Histogram, HistogramMetric, Meter, MeterMetric, MetricValueProvider, Timer};
use crate::metric_data::TimerValue;
use crate::sampling::{Reservoir, SamplingType};
use crate::utils::adder::StripedLongAdder;
use crate::utils::clock::{default_clock, Clock};
use crate::utils::time_unit::TimeUnit;

pub struct TimerMetric {
    clock: Arc<dyn Clock>,
    histogram: HistogramMetric,
    meter: MeterMetric,
    active_sessions: StripedLongAdder,
    total_recorded_time: StripedLongAdder,
}

impl TimerMetric {
    pub fn new() -> Self {
        Self::with_sampling_type(SamplingType::Default)
    }

    pub fn with_sampling_type(sampling_type: SamplingType) -> Self {
        Self::with_histogram(HistogramMetric::with_sampling_type(sampling_type))
    }

    pub fn with_reservoir(reservoir: Box<dyn Reservoir>) -> Self {
        Self::with_histogram(HistogramMetric::with_reservoir(reservoir))
    }

    pub fn with_histogram(histogram: HistogramMetric) -> Self {
        Self::with_parts(histogram, MeterMetric::new(), default_clock())
    }

    /// Timer assembled from explicit parts; `clock` measures sessions and
    /// should be the one `meter` runs on.
    pub fn with_parts(histogram: HistogramMetric, meter: MeterMetric, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            histogram,
            meter,
            active_sessions: StripedLongAdder::new(),
            total_recorded_time: StripedLongAdder::new(),
        }
    }

    /// Runs `action` as one timed session. The duration is recorded even if
    /// `action` panics.
    pub fn time<R>(&self, action: impl FnOnce() -> R) -> R {
        self.time_with_tag(None, action)
    }

    pub fn time_with_tag<R>(&self, tag: Option<&str>, action: impl FnOnce() -> R) -> R {
        let _session = self.new_context(tag);
        action()
    }

    /// Opens a session and returns its start timestamp in nanoseconds.
    pub fn start_recording(&self) -> i64 {
        self.active_sessions.increment();
        self.current_time()
    }

    /// Closes a session and returns its end timestamp in nanoseconds. Pair
    /// with [`record`](Timer::record) to store the duration.
    pub fn end_recording(&self) -> i64 {
        self.active_sessions.decrement();
        self.current_time()
    }

    pub fn current_time(&self) -> i64 {
        self.clock.nanoseconds()
    }

    pub fn new_context(&self, tag: Option<&str>) -> TimerContext<'_> {
        TimerContext {
            session: Arc::new(Session {
                timer: self,
                start: self.start_recording(),
                recorded: AtomicBool::new(false),
                tag: Mutex::new(tag.map(str::to_owned)),
            }),
        }
    }
}

impl Default for TimerMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for TimerMetric {
    fn record(&self, duration: i64, unit: TimeUnit, tag: Option<&str>) {
        let nanos = unit.to_nanoseconds(duration);
        if nanos < 0 {
            trace!(duration, ?unit, "dropping negative duration");
            return;
        }
        self.histogram.update(nanos, tag);
        self.meter.mark();
        self.total_recorded_time.add(nanos);
    }

    fn reset(&self) {
        Meter::reset(&self.meter);
        Histogram::reset(&self.histogram);
        self.total_recorded_time.reset();
    }
}

impl MetricValueProvider<TimerValue> for TimerMetric {
    fn get_value(&self, reset: bool) -> TimerValue {
        let total_time = if reset {
            self.total_recorded_time.get_and_reset()
        } else {
            self.total_recorded_time.value()
        };
        TimerValue {
            rate: self.meter.get_value(reset),
            histogram: self.histogram.get_value(reset),
            active_sessions: self.active_sessions.value(),
            total_time,
            duration_unit: TimeUnit::Nanoseconds,
        }
    }
}

impl std::fmt::Debug for TimerMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerMetric")
            .field("active_sessions", &self.active_sessions.value())
            .field("total_recorded_time", &self.total_recorded_time.value())
            .finish()
    }
}

struct Session<'a> {
    timer: &'a TimerMetric,
    start: i64,
    recorded: AtomicBool,
    tag: Mutex<Option<String>>,
}

impl Session<'_> {
    fn finish(&self) {
        if self
            .recorded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let end = self.timer.end_recording();
        let tag = self.tag.lock().take();
        self.timer
            .record(end - self.start, TimeUnit::Nanoseconds, tag.as_deref());
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// One timed session. Recorded exactly once: on the first
/// [`dispose`](Self::dispose) or when the last copy is dropped, whichever
/// comes first. Clones share the session.
#[derive(Clone)]
pub struct TimerContext<'a> {
    session: Arc<Session<'a>>,
}

impl TimerContext<'_> {
    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        let nanos = self.session.timer.current_time() - self.session.start;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
    }

    /// Sets the tag the duration will be recorded with.
    pub fn track_user_value(&self, tag: impl Into<String>) {
        *self.session.tag.lock() = Some(tag.into());
    }

    /// Ends the session and records its duration. Later calls, on this or
    /// any copy, do nothing.
    pub fn dispose(&self) {
        self.session.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::UniformReservoir;
    use crate::utils::clock::TestClock;
    use crate::utils::scheduler::TestScheduler;

    fn test_timer() -> (Arc<TestClock>, TimerMetric) {
        let clock = TestClock::new();
        let meter = MeterMetric::with_clock(
            clock.clone(),
            Box::new(TestScheduler::new(clock.clone())),
        );
        let histogram = HistogramMetric::with_reservoir(Box::new(UniformReservoir::new(100)));
        (clock.clone(), TimerMetric::with_parts(histogram, meter, clock))
    }

    #[test]
    fn records_durations_in_nanoseconds() {
        let (_, timer) = test_timer();
        timer.record(2, TimeUnit::Milliseconds, Some("a"));

        let value = timer.value();
        assert_eq!(value.rate.count, 1);
        assert_eq!(value.histogram.count(), 1);
        assert_eq!(value.histogram.snapshot.max(), 2_000_000);
        assert_eq!(value.histogram.last_user_value.as_deref(), Some("a"));
        assert_eq!(value.total_time, 2_000_000);
        assert_eq!(value.duration_unit, TimeUnit::Nanoseconds);
    }

    #[test]
    fn drops_negative_durations() {
        let (_, timer) = test_timer();
        timer.record(-1, TimeUnit::Seconds, None);
        let value = timer.value();
        assert_eq!(value.rate.count, 0);
        assert_eq!(value.histogram.count(), 0);
        assert_eq!(value.total_time, 0);
    }

    #[test]
    fn time_measures_the_closure() {
        let (clock, timer) = test_timer();
        let out = timer.time(|| {
            assert_eq!(timer.value().active_sessions, 1);
            clock.advance(TimeUnit::Milliseconds, 100);
            "done"
        });
        assert_eq!(out, "done");

        let value = timer.value();
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.histogram.snapshot.max(), 100_000_000);
        assert_eq!(value.rate.count, 1);
    }

    #[test]
    fn time_records_even_when_the_closure_panics() {
        let (clock, timer) = test_timer();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            timer.time_with_tag(Some("boom"), || {
                clock.advance(TimeUnit::Milliseconds, 7);
                panic!("failing action");
            })
        }));
        assert!(result.is_err());

        let value = timer.value();
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.histogram.count(), 1);
        assert_eq!(value.histogram.snapshot.max(), 7_000_000);
        assert_eq!(value.histogram.last_user_value.as_deref(), Some("boom"));
    }

    #[test]
    fn context_records_once_across_copies() {
        let (clock, timer) = test_timer();
        let context = timer.new_context(None);
        let copy = context.clone();
        clock.advance(TimeUnit::Milliseconds, 3);
        assert_eq!(context.elapsed(), Duration::from_millis(3));

        context.track_user_value("tracked");
        context.dispose();
        copy.dispose();
        drop(copy);
        drop(context);

        let value = timer.value();
        assert_eq!(value.histogram.count(), 1);
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.histogram.snapshot.min_user_value(), Some("tracked"));
    }

    #[test]
    fn context_records_when_last_copy_drops() {
        let (clock, timer) = test_timer();
        let context = timer.new_context(Some("scoped"));
        let copy = context.clone();
        drop(context);
        assert_eq!(timer.value().histogram.count(), 0);

        clock.advance(TimeUnit::Milliseconds, 1);
        drop(copy);
        let value = timer.value();
        assert_eq!(value.histogram.count(), 1);
        assert_eq!(value.histogram.snapshot.max(), 1_000_000);
    }

    #[test]
    fn manual_sessions_track_active_count() {
        let (clock, timer) = test_timer();
        let start = timer.start_recording();
        clock.advance(TimeUnit::Microseconds, 5);
        assert_eq!(timer.value().active_sessions, 1);

        let end = timer.end_recording();
        timer.record(end - start, TimeUnit::Nanoseconds, None);
        let value = timer.value();
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.histogram.snapshot.max(), 5_000);
    }

    #[test]
    fn get_value_with_reset_zeroes_totals() {
        let (_, timer) = test_timer();
        timer.record(10, TimeUnit::Nanoseconds, None);
        assert_eq!(timer.get_value(true).total_time, 10);

        let value = timer.value();
        assert_eq!(value.total_time, 0);
        assert_eq!(value.rate.count, 0);
        assert_eq!(value.histogram.count(), 0);
    }
}
