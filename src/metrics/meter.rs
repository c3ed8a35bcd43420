use std::collections::HashMap;
use std::sync::atomic::{fence, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{Meter, MetricValueProvider};
use crate::metric_data::counter::percent_of;
use crate::metric_data::{MeterItem, MeterValue};
use crate::utils::adder::StripedLongAdder;
use crate::utils::clock::{default_clock, Clock};
use crate::utils::ewma::{Ewma, DEFAULT_TICK_INTERVAL};
use crate::utils::scheduler::{ActionScheduler, ScheduledAction, Scheduler};
use crate::utils::time_unit::TimeUnit;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Count plus one, five and fifteen minute moving averages. Marks land in a
/// striped adder; [`tick`](Self::tick) drains it into the total and the
/// averages.
///
/// A drain moves marks from the adder to the total, so readers use `epoch`
/// as a sequence lock: it is odd while marks are in flight between the two.
#[derive(Debug)]
pub struct SimpleMeter {
    uncounted: StripedLongAdder,
    total: AtomicI64,
    epoch: AtomicU64,
    drain_lock: Mutex<()>,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl SimpleMeter {
    pub fn new() -> Self {
        Self::with_tick_interval(DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self {
            uncounted: StripedLongAdder::new(),
            total: AtomicI64::new(0),
            epoch: AtomicU64::new(0),
            drain_lock: Mutex::new(()),
            m1: Ewma::with_window(1.0, tick_interval),
            m5: Ewma::with_window(5.0, tick_interval),
            m15: Ewma::with_window(15.0, tick_interval),
        }
    }

    pub fn mark(&self, count: i64) {
        self.uncounted.add(count);
    }

    pub fn tick(&self) {
        let count = self.drain(|| {
            let count = self.uncounted.get_and_reset();
            self.total.fetch_add(count, Ordering::Relaxed);
            count
        });
        self.m1.tick_with(count);
        self.m5.tick_with(count);
        self.m15.tick_with(count);
    }

    /// Total marks so far. Never observes a tick halfway through moving
    /// marks into the total.
    pub fn count(&self) -> i64 {
        loop {
            let before = self.epoch.load(Ordering::Acquire);
            if before % 2 == 0 {
                let count = self.total.load(Ordering::Relaxed) + self.uncounted.value();
                fence(Ordering::Acquire);
                if self.epoch.load(Ordering::Relaxed) == before {
                    return count;
                }
            }
            std::hint::spin_loop();
        }
    }

    fn drain<T>(&self, f: impl FnOnce() -> T) -> T {
        let _drain = self.drain_lock.lock();
        self.epoch.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
        let out = f();
        self.epoch.fetch_add(1, Ordering::Release);
        out
    }

    /// Value with per-second rates; `elapsed_nanos` is the time the mean
    /// rate is computed over.
    pub fn get_value(&self, elapsed_nanos: i64) -> MeterValue {
        let count = self.count();
        MeterValue {
            count,
            mean_rate: mean_rate(count, elapsed_nanos),
            one_minute_rate: self.m1.rate(TimeUnit::Seconds),
            five_minute_rate: self.m5.rate(TimeUnit::Seconds),
            fifteen_minute_rate: self.m15.rate(TimeUnit::Seconds),
            rate_unit: TimeUnit::Seconds,
            items: Vec::new(),
        }
    }

    pub fn reset(&self) {
        self.drain(|| {
            self.uncounted.reset();
            self.total.store(0, Ordering::Relaxed);
        });
        self.m1.reset();
        self.m5.reset();
        self.m15.reset();
    }
}

impl Default for SimpleMeter {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_rate(count: i64, elapsed_nanos: i64) -> f64 {
    if elapsed_nanos <= 0 {
        0.0
    } else {
        count as f64 / elapsed_nanos as f64 * NANOS_PER_SECOND
    }
}

/// Meter ticked by a scheduler, with optional per-item sub-meters.
pub struct MeterMetric {
    state: Arc<MeterState>,
    scheduler: Box<dyn Scheduler>,
}

struct MeterState {
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    start_time: AtomicI64,
    meter: SimpleMeter,
    items: RwLock<HashMap<String, SimpleMeter>>,
}

impl MeterState {
    fn tick(&self) {
        self.meter.tick();
        for meter in self.items.read().values() {
            meter.tick();
        }
    }

    fn elapsed(&self) -> i64 {
        self.clock.nanoseconds() - self.start_time.load(Ordering::Relaxed)
    }
}

impl MeterMetric {
    /// Meter on the default clock with its own tick thread.
    pub fn new() -> Self {
        Self::with_clock(default_clock(), Box::new(ActionScheduler::named("metrics-tick")))
    }

    pub fn with_clock(clock: Arc<dyn Clock>, scheduler: Box<dyn Scheduler>) -> Self {
        Self::with_tick_interval(clock, scheduler, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn Scheduler>,
        tick_interval: Duration,
    ) -> Self {
        let state = Arc::new(MeterState {
            start_time: AtomicI64::new(clock.nanoseconds()),
            clock,
            tick_interval,
            meter: SimpleMeter::with_tick_interval(tick_interval),
            items: RwLock::new(HashMap::new()),
        });

        let weak: Weak<MeterState> = Arc::downgrade(&state);
        let tick: ScheduledAction = Arc::new(move || {
            if let Some(state) = weak.upgrade() {
                state.tick();
            }
        });
        scheduler.start(tick_interval, tick);

        Self { state, scheduler }
    }

    /// Drains pending marks into the moving averages. The scheduler calls
    /// this every tick interval.
    pub fn tick(&self) {
        self.state.tick();
    }
}

impl Default for MeterMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter for MeterMetric {
    fn mark_n(&self, count: i64) {
        self.state.meter.mark(count);
    }

    fn mark_item(&self, item: &str, count: i64) {
        self.mark_n(count);
        if let Some(meter) = self.state.items.read().get(item) {
            meter.mark(count);
            return;
        }
        let mut items = self.state.items.write();
        items
            .entry(item.to_owned())
            .or_insert_with(|| SimpleMeter::with_tick_interval(self.state.tick_interval))
            .mark(count);
    }

    fn reset(&self) {
        self.state
            .start_time
            .store(self.state.clock.nanoseconds(), Ordering::Relaxed);
        self.state.meter.reset();
        for meter in self.state.items.read().values() {
            meter.reset();
        }
    }
}

impl MetricValueProvider<MeterValue> for MeterMetric {
    fn get_value(&self, reset: bool) -> MeterValue {
        let elapsed = self.state.elapsed();
        let mut value = self.state.meter.get_value(elapsed);
        {
            let items = self.state.items.read();
            value.items = items
                .iter()
                .map(|(name, meter)| {
                    let item = meter.get_value(elapsed);
                    MeterItem {
                        item: name.clone(),
                        percent: percent_of(item.count, value.count),
                        value: item,
                    }
                })
                .collect();
        }
        value.items.sort_by(|a, b| a.item.cmp(&b.item));
        if reset {
            Meter::reset(self);
        }
        value
    }
}

impl Drop for MeterMetric {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

impl std::fmt::Debug for MeterMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterMetric")
            .field("count", &self.state.meter.count())
            .field("items", &self.state.items.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::TestClock;
    use crate::utils::scheduler::TestScheduler;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn test_meter() -> (Arc<TestClock>, MeterMetric) {
        let clock = TestClock::new();
        let meter = MeterMetric::with_clock(
            clock.clone(),
            Box::new(TestScheduler::new(clock.clone())),
        );
        (clock, meter)
    }

    #[test]
    fn starts_at_zero() {
        let (_, meter) = test_meter();
        let value = meter.value();
        assert_eq!(value.count, 0);
        assert_eq!(value.mean_rate, 0.0);
        assert_eq!(value.one_minute_rate, 0.0);
        assert!(value.items.is_empty());
    }

    #[test]
    fn counts_marks_before_any_tick() {
        let (_, meter) = test_meter();
        meter.mark();
        meter.mark_n(4);
        assert_eq!(meter.value().count, 5);
    }

    #[test]
    fn computes_rates_after_a_tick() {
        let (clock, meter) = test_meter();
        meter.mark();
        clock.advance(TimeUnit::Seconds, 5);

        let value = meter.value();
        assert_eq!(value.count, 1);
        assert_close(value.mean_rate, 0.2);
        assert_close(value.one_minute_rate, 0.2);
        assert_close(value.five_minute_rate, 0.2);
        assert_close(value.fifteen_minute_rate, 0.2);
    }

    #[test]
    fn one_minute_rate_decays_while_idle() {
        let (clock, meter) = test_meter();
        meter.mark_n(3);
        clock.advance(TimeUnit::Seconds, 5);
        assert_close(meter.value().one_minute_rate, 0.6);

        clock.advance(TimeUnit::Minutes, 1);
        assert_close(meter.value().one_minute_rate, 0.22072766);
    }

    #[test]
    fn tracks_items_sorted_with_percentages() {
        let (clock, meter) = test_meter();
        meter.mark_item("B", 3);
        meter.mark_item("A", 1);
        clock.advance(TimeUnit::Seconds, 5);

        let value = meter.value();
        assert_eq!(value.count, 4);
        assert_eq!(value.items.len(), 2);
        assert_eq!(value.items[0].item, "A");
        assert_eq!(value.items[0].percent, 25.0);
        assert_eq!(value.items[1].percent, 75.0);
        assert_close(value.items[1].value.one_minute_rate, 0.6);
    }

    #[test]
    fn reset_restarts_counts_and_elapsed_time() {
        let (clock, meter) = test_meter();
        meter.mark_item("A", 2);
        clock.advance(TimeUnit::Seconds, 10);

        let before = meter.get_value(true);
        assert_eq!(before.count, 2);

        let after = meter.value();
        assert_eq!(after.count, 0);
        assert_eq!(after.mean_rate, 0.0);
        assert_eq!(after.one_minute_rate, 0.0);
        assert_eq!(after.items[0].value.count, 0);
    }

    #[test]
    fn count_never_goes_backwards_while_ticking() {
        const MARKS: i64 = 200_000;

        let meter = SimpleMeter::new();
        let marking = std::sync::atomic::AtomicBool::new(true);
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..MARKS {
                    meter.mark(1);
                }
                marking.store(false, Ordering::Release);
            });
            s.spawn(|| {
                while marking.load(Ordering::Acquire) {
                    meter.tick();
                }
            });

            let mut last = 0;
            while marking.load(Ordering::Acquire) {
                let count = meter.count();
                assert!(count >= last, "count went from {last} to {count}");
                last = count;
            }
        });

        assert_eq!(meter.count(), MARKS);
        meter.tick();
        assert_eq!(meter.count(), MARKS);
    }

    #[test]
    fn stops_ticking_once_dropped() {
        let (clock, meter) = test_meter();
        meter.mark();
        drop(meter);
        // no live listener left to tick
        clock.advance(TimeUnit::Minutes, 5);
    }
}
