use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use super::time_unit::TimeUnit;

/// Time source for every timed behavior in the crate.
///
/// Metrics never read `Instant::now()` directly; they go through a `Clock`
/// so tests can swap in a [`TestClock`].
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds since an arbitrary origin.
    fn nanoseconds(&self) -> i64;

    /// Wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Whole seconds of [`Clock::nanoseconds`].
    fn seconds(&self) -> i64 {
        TimeUnit::Nanoseconds.to_seconds(self.nanoseconds())
    }
}

// ─── Production clocks ───────────────────────────────────────────

/// Monotonic clock backed by `Instant`.
#[derive(Debug)]
pub struct StopwatchClock {
    origin: Instant,
}

impl StopwatchClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StopwatchClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StopwatchClock {
    fn nanoseconds(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock nanoseconds since the Unix epoch. Not monotonic.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn nanoseconds(&self) -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Process-wide stopwatch clock shared by metrics built without an explicit
/// clock.
pub fn default_clock() -> Arc<dyn Clock> {
    static DEFAULT: OnceLock<Arc<StopwatchClock>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(StopwatchClock::new())).clone()
}

// ─── Deterministic test clock ────────────────────────────────────

/// Notified synchronously every time a [`TestClock`] moves forward.
pub trait AdvanceListener: Send + Sync {
    fn on_advance(&self, now_nanos: i64);
}

/// Clock that only moves when told to.
///
/// Listeners (see [`crate::utils::scheduler::TestScheduler`]) run on the
/// thread calling [`TestClock::advance`], so scheduled work happens without
/// any real sleeping.
pub struct TestClock {
    nanos: AtomicI64,
    listeners: Mutex<Vec<Weak<dyn AdvanceListener>>>,
}

impl TestClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nanos: AtomicI64::new(0),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Moves the clock forward and fires every live listener.
    pub fn advance(&self, unit: TimeUnit, value: i64) {
        let delta = unit.to_nanoseconds(value);
        let now = self.nanos.fetch_add(delta, Ordering::SeqCst) + delta;

        // Listeners may read the clock or subscribe again; never call them
        // with the list locked.
        let live: Vec<Arc<dyn AdvanceListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.on_advance(now);
        }
    }

    /// Registers a listener. The clock only holds a weak reference; dropping
    /// the last `Arc` unsubscribes.
    pub fn subscribe(&self, listener: &Arc<dyn AdvanceListener>) {
        self.listeners.lock().push(Arc::downgrade(listener));
    }
}

impl Clock for TestClock {
    fn nanoseconds(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.nanoseconds())
    }
}
