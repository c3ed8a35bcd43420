//! The metric kinds applications record into.
//!
//! Each metric exposes two separate contracts: a narrow mutation trait
//! ([`Counter`], [`Meter`], [`Histogram`], [`Timer`]) for the code being
//! instrumented, and [`MetricValueProvider`] for whatever reads and reports
//! values. Gauges only have the read side.

pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod timer;

pub use counter::CounterMetric;
pub use gauge::{DerivedGauge, FunctionGauge, ValueGauge};
pub use histogram::HistogramMetric;
pub use meter::{MeterMetric, SimpleMeter};
pub use timer::{TimerContext, TimerMetric};

use crate::utils::time_unit::TimeUnit;

/// Read side of every metric.
pub trait MetricValueProvider<T>: Send + Sync {
    /// Current value; with `reset`, the metric returns to its zero baseline
    /// right after the read.
    fn get_value(&self, reset: bool) -> T;

    fn value(&self) -> T {
        self.get_value(false)
    }
}

/// Running count that may go up and down, optionally broken down by item.
pub trait Counter: Send + Sync {
    fn increment(&self) {
        self.increment_by(1);
    }

    fn increment_by(&self, amount: i64);

    fn decrement(&self) {
        self.decrement_by(1);
    }

    fn decrement_by(&self, amount: i64) {
        self.increment_by(-amount);
    }

    /// Counts toward the total and toward `item`.
    fn increment_item(&self, item: &str, amount: i64);

    fn decrement_item(&self, item: &str, amount: i64) {
        self.increment_item(item, -amount);
    }

    fn reset(&self);
}

/// Rate of events.
pub trait Meter: Send + Sync {
    fn mark(&self) {
        self.mark_n(1);
    }

    fn mark_n(&self, count: i64);

    /// Marks toward the total and toward `item`'s own rates.
    fn mark_item(&self, item: &str, count: i64);

    fn reset(&self);
}

/// Distribution of values.
pub trait Histogram: Send + Sync {
    fn update(&self, value: i64, tag: Option<&str>);

    fn reset(&self);
}

/// Distribution of durations plus the rate they occur at.
pub trait Timer: Send + Sync {
    /// Records a duration measured elsewhere. Durations that are negative
    /// once converted to nanoseconds are dropped.
    fn record(&self, duration: i64, unit: TimeUnit, tag: Option<&str>);

    fn reset(&self);
}
