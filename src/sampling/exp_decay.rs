//! Forward-decaying priority reservoir.
//!
//! Each value gets weight `exp(alpha * (t - t0))`, where `t0` is the
//! landmark (creation or last rescale, in whole seconds), and priority
//! `weight / u` with `u` uniform in `(0, 1)`. The `k` highest priorities
//! are kept, which biases the sample toward recent values.
//!
//! Weights grow without bound as `t - t0` grows, so a scheduler rescales
//! every hour: all priorities and weights are multiplied by
//! `exp(-alpha * (t0' - t0))` and the landmark moves to `t0'`. Ratios
//! between weights are unchanged. An extreme rescale can underflow old
//! priorities to zero; colliding keys collapse and the insert counter is
//! resynchronized to what is actually retained.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::weighted_snapshot::WeightedSnapshot;
use super::{Reservoir, Snapshot, WeightedSample, DEFAULT_RESERVOIR_SIZE};
use crate::utils::clock::{default_clock, Clock};
use crate::utils::scheduler::{ActionScheduler, ScheduledAction, Scheduler};

pub const DEFAULT_ALPHA: f64 = 0.015;
pub const DEFAULT_RESCALE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct ExponentiallyDecayingReservoir {
    state: Arc<DecayingState>,
    scheduler: Box<dyn Scheduler>,
}

struct DecayingState {
    size: usize,
    alpha: f64,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

struct Inner {
    values: BTreeMap<Priority, WeightedSample>,
    count: u64,
    start_time: i64,
    rng: StdRng,
}

/// Map key ordered by `f64::total_cmp`.
#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

impl ExponentiallyDecayingReservoir {
    /// Reservoir on the default clock with its own rescale thread.
    pub fn new(size: usize, alpha: f64) -> Self {
        Self::with_clock(
            size,
            alpha,
            default_clock(),
            Box::new(ActionScheduler::named("metrics-rescale")),
        )
    }

    pub fn with_clock(
        size: usize,
        alpha: f64,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self::with_options(
            size,
            alpha,
            DEFAULT_RESCALE_INTERVAL,
            clock,
            scheduler,
            StdRng::from_entropy(),
        )
    }

    /// Fully specified reservoir; `rng` drives the priority draws.
    pub fn with_options(
        size: usize,
        alpha: f64,
        rescale_interval: Duration,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn Scheduler>,
        rng: StdRng,
    ) -> Self {
        let start_time = clock.seconds();
        let state = Arc::new(DecayingState {
            size: size.max(1),
            alpha,
            clock,
            inner: Mutex::new(Inner {
                values: BTreeMap::new(),
                count: 0,
                start_time,
                rng,
            }),
        });

        let weak: Weak<DecayingState> = Arc::downgrade(&state);
        let rescale: ScheduledAction = Arc::new(move || {
            if let Some(state) = weak.upgrade() {
                state.rescale();
            }
        });
        scheduler.start(rescale_interval, rescale);

        Self { state, scheduler }
    }

    /// Forces a rescale to the current time. Normally the scheduler does
    /// this every rescale interval.
    pub fn rescale(&self) {
        self.state.rescale();
    }
}

impl Default for ExponentiallyDecayingReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_ALPHA)
    }
}

impl DecayingState {
    fn update(&self, value: i64, tag: Option<&str>, timestamp: i64) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let weight = (self.alpha * (timestamp - inner.start_time) as f64).exp();
        let mut random = 0.0;
        while random == 0.0 {
            random = inner.rng.gen::<f64>();
        }
        let priority = Priority(weight / random);
        let sample = WeightedSample {
            value,
            tag: tag.map(str::to_owned),
            weight,
        };

        inner.count += 1;
        if inner.count <= self.size as u64 {
            inner.values.insert(priority, sample);
            return;
        }

        let Some(lowest) = inner.values.first_key_value().map(|(k, _)| *k) else {
            inner.values.insert(priority, sample);
            return;
        };
        if lowest < priority {
            inner.values.pop_first();
            inner.values.insert(priority, sample);
        }
    }

    fn rescale(&self) {
        let mut inner = self.inner.lock();
        let old_start = inner.start_time;
        inner.start_time = self.clock.seconds();
        let factor = (-self.alpha * (inner.start_time - old_start) as f64).exp();

        let old_values = std::mem::take(&mut inner.values);
        for (key, mut sample) in old_values {
            sample.weight *= factor;
            inner.values.insert(Priority(key.0 * factor), sample);
        }
        inner.count = inner.values.len() as u64;

        debug!(
            retained = inner.count,
            landmark = inner.start_time,
            factor,
            "rescaled decaying reservoir"
        );
    }

    fn reset_locked(&self, inner: &mut Inner) {
        inner.values.clear();
        inner.count = 0;
        inner.start_time = self.clock.seconds();
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn size(&self) -> usize {
        let count = self.state.inner.lock().count;
        count.min(self.state.size as u64) as usize
    }

    fn update(&self, value: i64, tag: Option<&str>) {
        self.state.update(value, tag, self.state.clock.seconds());
    }

    fn snapshot(&self, reset: bool) -> Box<dyn Snapshot> {
        let mut inner = self.state.inner.lock();
        let snapshot = WeightedSnapshot::new(inner.count, inner.values.values().cloned().collect());
        if reset {
            self.state.reset_locked(&mut inner);
        }
        Box::new(snapshot)
    }

    fn reset(&self) {
        let mut inner = self.state.inner.lock();
        self.state.reset_locked(&mut inner);
    }
}

impl Drop for ExponentiallyDecayingReservoir {
    fn drop(&mut self) {
        // Waits for an in-flight rescale before the state can go away.
        self.scheduler.stop();
    }
}
