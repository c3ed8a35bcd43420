//! Reservoir backed by HdrHistogram.
//!
//! Writers record into one of several interval histograms. Each writer
//! starts at the shard picked by its thread slot and takes the first shard
//! whose lock is free, so writers only wait on each other when every shard
//! is busy. A snapshot drains every interval histogram into the running
//! totals under the totals lock and hands out a copy.
//!
//! `hdrhistogram::sync::Recorder` is not used for the intervals: its phase
//! shift waits on every active recorder, and an idle recorder only ships its
//! samples at the next phase it observes while active. Metrics writers are
//! sporadic and short-lived threads, so a snapshot would either block on a
//! parked writer or miss samples it already recorded.
//!
//! The histogram itself records no tags, so the min/max values and their
//! tags are tracked on the side with CAS loops; a tag lock is only taken
//! when a value ties or beats the current extreme.

use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;
use hdrhistogram::errors::RecordError;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use tracing::trace;

use super::{Reservoir, Snapshot};
use crate::error::{MetricsError, Result};
use crate::utils::adder::thread_slot;

pub const DEFAULT_SIGNIFICANT_DIGITS: u8 = 2;

const INTERVAL_SHARDS: usize = 4;

pub struct HdrHistogramReservoir {
    intervals: Box<[CachePadded<Mutex<Histogram<u64>>>]>,
    totals: Mutex<Histogram<u64>>,
    min: TrackedExtreme,
    max: TrackedExtreme,
}

impl HdrHistogramReservoir {
    pub fn new() -> Self {
        Self::with_significant_digits(DEFAULT_SIGNIFICANT_DIGITS)
            .expect("default significant digits are in range")
    }

    /// Auto-resizing histograms with `digits` of precision (0..=5).
    pub fn with_significant_digits(digits: u8) -> Result<Self> {
        let build = || {
            Histogram::<u64>::new(digits).map_err(|e| {
                MetricsError::InvalidConfig(format!("hdr histogram with {digits} digits: {e:?}"))
            })
        };

        let intervals = (0..INTERVAL_SHARDS)
            .map(|_| build().map(|h| CachePadded::new(Mutex::new(h))))
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        Ok(Self {
            intervals,
            totals: Mutex::new(build()?),
            min: TrackedExtreme::new(i64::MAX),
            max: TrackedExtreme::new(i64::MIN),
        })
    }

    fn record_interval(&self, value: u64) -> std::result::Result<(), RecordError> {
        let shards = self.intervals.len();
        let home = thread_slot() % shards;
        for offset in 0..shards {
            if let Some(mut interval) = self.intervals[(home + offset) % shards].try_lock() {
                return interval.record(value);
            }
        }
        self.intervals[home].lock().record(value)
    }

    fn track_extremes(&self, value: i64, tag: Option<&str>) {
        self.max.offer(value, tag, |candidate, current| candidate > current);
        self.min.offer(value, tag, |candidate, current| candidate < current);
    }
}

impl Default for HdrHistogramReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl Reservoir for HdrHistogramReservoir {
    fn size(&self) -> usize {
        let pending: u64 = self.intervals.iter().map(|h| h.lock().len()).sum();
        (self.totals.lock().len() + pending) as usize
    }

    fn update(&self, value: i64, tag: Option<&str>) {
        let Ok(unsigned) = u64::try_from(value) else {
            trace!(value, "hdr reservoir ignores negative value");
            return;
        };

        if let Err(err) = self.record_interval(unsigned) {
            trace!(value, ?err, "hdr reservoir could not record value");
            return;
        }
        self.track_extremes(value, tag);
    }

    fn snapshot(&self, reset: bool) -> Box<dyn Snapshot> {
        let mut totals = self.totals.lock();
        for interval in self.intervals.iter() {
            let mut interval = interval.lock();
            if let Err(err) = totals.add(&*interval) {
                trace!(?err, "hdr reservoir could not merge interval histogram");
            }
            interval.reset();
        }

        let histogram = totals.clone();
        let (min, min_tag) = self.min.get();
        let (max, max_tag) = self.max.get();

        if reset {
            totals.reset();
            self.min.reset();
            self.max.reset();
        }
        drop(totals);

        Box::new(HdrSnapshot::new(histogram, min, min_tag, max, max_tag))
    }

    fn reset(&self) {
        let mut totals = self.totals.lock();
        for interval in self.intervals.iter() {
            interval.lock().reset();
        }
        totals.reset();
        self.min.reset();
        self.max.reset();
    }
}

// ─── Extreme tracking ────────────────────────────────────────────

struct TrackedExtreme {
    initial: i64,
    value: AtomicI64,
    tag: Mutex<Option<String>>,
}

impl TrackedExtreme {
    fn new(initial: i64) -> Self {
        Self {
            initial,
            value: AtomicI64::new(initial),
            tag: Mutex::new(None),
        }
    }

    fn offer(&self, candidate: i64, tag: Option<&str>, beats: fn(i64, i64) -> bool) {
        let mut current = self.value.load(Ordering::Acquire);
        let mut won = false;
        while beats(candidate, current) {
            match self.value.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    current = candidate;
                    won = true;
                    break;
                }
                Err(actual) => current = actual,
            }
        }

        if candidate != current || (!won && tag.is_none()) {
            return;
        }
        let mut slot = self.tag.lock();
        // Another writer may have moved the extreme since our CAS.
        if self.value.load(Ordering::Acquire) != candidate {
            return;
        }
        if won {
            // A new extreme owns the tag, even when it carries none.
            *slot = tag.map(str::to_owned);
        } else if let Some(tag) = tag {
            *slot = Some(tag.to_owned());
        }
    }

    fn get(&self) -> (i64, Option<String>) {
        let tag = self.tag.lock();
        (self.value.load(Ordering::Acquire), tag.clone())
    }

    fn reset(&self) {
        let mut tag = self.tag.lock();
        self.value.store(self.initial, Ordering::Release);
        *tag = None;
    }
}

// ─── HdrSnapshot ─────────────────────────────────────────────────

/// Snapshot over a frozen copy of the running HDR totals.
#[derive(Debug, Clone)]
pub struct HdrSnapshot {
    histogram: Histogram<u64>,
    min: i64,
    min_user_value: Option<String>,
    max: i64,
    max_user_value: Option<String>,
}

impl HdrSnapshot {
    fn new(
        histogram: Histogram<u64>,
        min: i64,
        min_user_value: Option<String>,
        max: i64,
        max_user_value: Option<String>,
    ) -> Self {
        if histogram.is_empty() {
            return Self {
                histogram,
                min: 0,
                min_user_value: None,
                max: 0,
                max_user_value: None,
            };
        }
        Self {
            histogram,
            min,
            min_user_value,
            max,
            max_user_value,
        }
    }
}

impl Snapshot for HdrSnapshot {
    fn count(&self) -> u64 {
        self.histogram.len()
    }

    /// Number of distinct recorded buckets, matching `values().len()`.
    fn size(&self) -> usize {
        self.histogram.iter_recorded().count()
    }

    fn min(&self) -> i64 {
        self.min
    }

    fn max(&self) -> i64 {
        self.max
    }

    fn min_user_value(&self) -> Option<&str> {
        self.min_user_value.as_deref()
    }

    fn max_user_value(&self) -> Option<&str> {
        self.max_user_value.as_deref()
    }

    fn mean(&self) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.mean()
    }

    fn std_dev(&self) -> f64 {
        if self.histogram.len() <= 1 {
            return 0.0;
        }
        self.histogram.stdev()
    }

    fn values(&self) -> Vec<i64> {
        self.histogram
            .iter_recorded()
            .map(|v| v.value_iterated_to() as i64)
            .collect()
    }

    fn value_at_quantile(&self, quantile: f64) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.value_at_quantile(quantile) as f64
    }
}
