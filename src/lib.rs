//! In-process application metrics: counters, meters, histograms and timers.
//!
//! Recording is safe from any number of threads and never blocks for long:
//! counts go through striped adders, rates through exponentially weighted
//! moving averages, and distributions through bounded sampling reservoirs
//! (uniform, sliding window, forward-decaying or HdrHistogram).
//!
//! ```no_run
//! use sampling_metrics::{MetricValueProvider, Timer, TimerMetric, TimeUnit};
//!
//! let timer = TimerMetric::new();
//! timer.time(|| std::thread::sleep(std::time::Duration::from_millis(3)));
//! timer.record(12, TimeUnit::Milliseconds, Some("cache-miss"));
//!
//! let value = timer.value().scale(TimeUnit::Seconds, TimeUnit::Milliseconds);
//! println!("p99 = {} ms", value.histogram.snapshot.percentile_99());
//! ```

pub mod config;
pub mod error;
pub mod metric_data;
pub mod metrics;
pub mod sampling;
pub mod utils;

pub use crate::config::MetricsConfig;
pub use crate::metrics::{
    Counter, CounterMetric, DerivedGauge, FunctionGauge, Histogram, HistogramMetric, Meter,
    MeterMetric, MetricValueProvider, SimpleMeter, Timer, TimerContext, TimerMetric, ValueGauge,
};
pub use crate::error::{MetricsError, Result};
pub use crate::metric_data::{
    CounterItem, CounterValue, HistogramValue, MeterItem, MeterValue, SnapshotSummary, TimerValue,
};
pub use crate::sampling::{Reservoir, SamplingType, Snapshot};
pub use crate::utils::{default_clock, Clock, TimeUnit};
