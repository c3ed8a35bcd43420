//! Streaming reservoirs and the statistical snapshots they produce.
//!
//! A [`Reservoir`] keeps a bounded sample of an unbounded stream of `i64`
//! observations; [`Reservoir::snapshot`] freezes the current sample into a
//! [`Snapshot`] that can be queried without holding any lock.

pub mod exp_decay;
pub mod hdr;
pub mod scaled;
pub mod sliding_window;
pub mod uniform;
pub mod uniform_snapshot;
pub mod weighted_snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

pub use exp_decay::ExponentiallyDecayingReservoir;
pub use hdr::{HdrHistogramReservoir, HdrSnapshot};
pub use scaled::ScaledSnapshot;
pub use sliding_window::SlidingWindowReservoir;
pub use uniform::UniformReservoir;
pub use uniform_snapshot::UniformSnapshot;
pub use weighted_snapshot::WeightedSnapshot;

/// Default capacity of the sampling reservoirs.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// One observed value and the optional free-form tag recorded with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    pub value: i64,
    pub tag: Option<String>,
}

impl Sample {
    pub fn new(value: i64, tag: Option<&str>) -> Self {
        Self {
            value,
            tag: tag.map(str::to_owned),
        }
    }
}

/// A [`Sample`] with the decay weight it was inserted with.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSample {
    pub value: i64,
    pub tag: Option<String>,
    pub weight: f64,
}

/// Which reservoir backs a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingType {
    /// Whatever the configuration names as default
    #[default]
    Default,
    HighDynamicRange,
    ExponentiallyDecaying,
    /// Uniform sample over the whole lifetime
    LongTerm,
    SlidingWindow,
}

/// Bounded sample of a value stream. Every method may be called
/// concurrently from any thread.
pub trait Reservoir: Send + Sync {
    /// Number of samples currently retained.
    fn size(&self) -> usize;

    fn update(&self, value: i64, tag: Option<&str>);

    /// Freezes the current contents. With `reset`, the reservoir is emptied
    /// after the snapshot is taken.
    fn snapshot(&self, reset: bool) -> Box<dyn Snapshot>;

    fn reset(&self);
}

/// Immutable statistical view of a reservoir at one instant.
pub trait Snapshot: Send + Sync + fmt::Debug {
    /// Values seen by the reservoir (may exceed [`Snapshot::size`]).
    fn count(&self) -> u64;

    /// Values retained in this snapshot.
    fn size(&self) -> usize;

    fn min(&self) -> i64;
    fn max(&self) -> i64;
    fn min_user_value(&self) -> Option<&str>;
    fn max_user_value(&self) -> Option<&str>;
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;

    /// Retained values, ascending.
    fn values(&self) -> Vec<i64>;

    /// Value at `quantile`. The caller guarantees `0.0 <= quantile <= 1.0`;
    /// use [`Snapshot::value`] for unchecked input.
    fn value_at_quantile(&self, quantile: f64) -> f64;

    /// Value at `quantile`, rejecting anything outside `[0, 1]`.
    fn value(&self, quantile: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(MetricsError::InvalidQuantile(quantile));
        }
        Ok(self.value_at_quantile(quantile))
    }

    fn median(&self) -> f64 {
        self.value_at_quantile(0.5)
    }

    fn percentile_75(&self) -> f64 {
        self.value_at_quantile(0.75)
    }

    fn percentile_95(&self) -> f64 {
        self.value_at_quantile(0.95)
    }

    fn percentile_98(&self) -> f64 {
        self.value_at_quantile(0.98)
    }

    fn percentile_99(&self) -> f64 {
        self.value_at_quantile(0.99)
    }

    fn percentile_999(&self) -> f64 {
        self.value_at_quantile(0.999)
    }
}
