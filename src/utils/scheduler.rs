use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use super::clock::{AdvanceListener, Clock, TestClock};

/// Periodic callback run by a [`Scheduler`].
pub type ScheduledAction = Arc<dyn Fn() + Send + Sync>;

/// Cancellable periodic callback.
///
/// `stop` prevents future runs and waits for an in-flight run to finish, so
/// the owner may release state the action touches once it returns.
pub trait Scheduler: Send + Sync {
    /// Starts running `action` every `interval`. Starting again replaces the
    /// previous action.
    fn start(&self, interval: Duration, action: ScheduledAction);

    fn stop(&self);
}

// ─── ActionScheduler ─────────────────────────────────────────────

/// Runs its action on a dedicated OS thread.
pub struct ActionScheduler {
    name: String,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::named("metrics-scheduler")
    }

    /// Scheduler whose thread carries `name` (shows up in panics and
    /// debuggers).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worker: Mutex::new(None),
        }
    }

    fn run(signal: Arc<StopSignal>, interval: Duration, action: ScheduledAction) {
        let mut deadline = Instant::now() + interval;
        loop {
            {
                let mut stopped = signal.stopped.lock();
                while !*stopped {
                    if signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                if *stopped {
                    return;
                }
            }

            if panic::catch_unwind(AssertUnwindSafe(|| action())).is_err() {
                error!("scheduled action panicked; keeping schedule");
            }

            deadline += interval;
            let now = Instant::now();
            if deadline < now {
                // Fell behind (slow action or suspended process): skip the
                // missed runs instead of firing them back to back.
                deadline = now + interval;
            }
        }
    }
}

impl Default for ActionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ActionScheduler {
    fn start(&self, interval: Duration, action: ScheduledAction) {
        self.stop();

        let signal = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = signal.clone();
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || Self::run(thread_signal, interval, action));

        match spawned {
            Ok(handle) => {
                debug!(name = %self.name, ?interval, "scheduler started");
                *self.worker.lock() = Some(Worker { signal, handle });
            }
            Err(err) => error!(name = %self.name, %err, "failed to spawn scheduler thread"),
        }
    }

    fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        *worker.signal.stopped.lock() = true;
        worker.signal.wake.notify_all();

        // An action stopping its own scheduler cannot wait for itself.
        if worker.handle.thread().id() != thread::current().id() {
            let _ = worker.handle.join();
        }
        debug!(name = %self.name, "scheduler stopped");
    }
}

impl Drop for ActionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── TestScheduler ───────────────────────────────────────────────

/// Runs its action synchronously whenever the [`TestClock`] it watches
/// crosses an interval boundary: once per boundary crossed.
pub struct TestScheduler {
    clock: Arc<TestClock>,
    task: Mutex<Option<Arc<TestTask>>>,
}

struct TestTask {
    interval_nanos: i64,
    last_run: Mutex<i64>,
    action: ScheduledAction,
    stopped: AtomicBool,
}

impl AdvanceListener for TestTask {
    fn on_advance(&self, now_nanos: i64) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let runs = {
            let mut last = self.last_run.lock();
            let runs = (now_nanos - *last) / self.interval_nanos;
            if runs > 0 {
                *last += runs * self.interval_nanos;
            }
            runs
        };
        for _ in 0..runs {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            (self.action)();
        }
    }
}

impl TestScheduler {
    pub fn new(clock: Arc<TestClock>) -> Self {
        Self {
            clock,
            task: Mutex::new(None),
        }
    }
}

impl Scheduler for TestScheduler {
    fn start(&self, interval: Duration, action: ScheduledAction) {
        self.stop();
        let interval_nanos = i64::try_from(interval.as_nanos())
            .unwrap_or(i64::MAX)
            .max(1);
        let task = Arc::new(TestTask {
            interval_nanos,
            last_run: Mutex::new(self.clock.nanoseconds()),
            action,
            stopped: AtomicBool::new(false),
        });
        let listener: Arc<dyn AdvanceListener> = task.clone();
        self.clock.subscribe(&listener);
        *self.task.lock() = Some(task);
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.stopped.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time_unit::TimeUnit;
    use std::sync::atomic::AtomicUsize;

    fn counting_action() -> (Arc<AtomicUsize>, ScheduledAction) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let action: ScheduledAction = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, action)
    }

    #[test]
    fn test_scheduler_fires_once_per_interval_crossed() {
        let clock = TestClock::new();
        let scheduler = TestScheduler::new(clock.clone());
        let (count, action) = counting_action();
        scheduler.start(Duration::from_secs(5), action);

        clock.advance(TimeUnit::Seconds, 4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        clock.advance(TimeUnit::Seconds, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        clock.advance(TimeUnit::Seconds, 12);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        clock.advance(TimeUnit::Seconds, 3);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_scheduler_stop_prevents_future_runs() {
        let clock = TestClock::new();
        let scheduler = TestScheduler::new(clock.clone());
        let (count, action) = counting_action();
        scheduler.start(Duration::from_secs(1), action);
        clock.advance(TimeUnit::Seconds, 1);
        scheduler.stop();
        clock.advance(TimeUnit::Seconds, 10);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn action_scheduler_runs_and_stops() {
        let scheduler = ActionScheduler::named("test-scheduler");
        let (count, action) = counting_action();
        scheduler.start(Duration::from_millis(5), action);

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        scheduler.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn action_scheduler_survives_panicking_action() {
        let scheduler = ActionScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        scheduler.start(
            Duration::from_millis(2),
            Arc::new(move || {
                if inner.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        scheduler.stop();
        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
