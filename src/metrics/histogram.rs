use std::sync::Arc;

use parking_lot::Mutex;

use super::{Histogram, MetricValueProvider};
use crate::config::MetricsConfig;
use crate::metric_data::HistogramValue;
use crate::sampling::{Reservoir, Sample, SamplingType};
use crate::utils::clock::default_clock;

/// Histogram over any [`Reservoir`], remembering the last value recorded.
pub struct HistogramMetric {
    reservoir: Box<dyn Reservoir>,
    last: Mutex<Sample>,
}

impl HistogramMetric {
    /// Histogram over the default forward-decaying reservoir.
    pub fn new() -> Self {
        Self::with_sampling_type(SamplingType::Default)
    }

    pub fn with_sampling_type(sampling_type: SamplingType) -> Self {
        Self::with_reservoir(MetricsConfig::default().build_reservoir(sampling_type, default_clock()))
    }

    pub fn with_reservoir(reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            reservoir,
            last: Mutex::new(Sample::default()),
        }
    }
}

impl Default for HistogramMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram for HistogramMetric {
    fn update(&self, value: i64, tag: Option<&str>) {
        *self.last.lock() = Sample::new(value, tag);
        self.reservoir.update(value, tag);
    }

    fn reset(&self) {
        *self.last.lock() = Sample::default();
        self.reservoir.reset();
    }
}

impl MetricValueProvider<HistogramValue> for HistogramMetric {
    fn get_value(&self, reset: bool) -> HistogramValue {
        let last = {
            let mut last = self.last.lock();
            if reset {
                std::mem::take(&mut *last)
            } else {
                last.clone()
            }
        };
        let snapshot = self.reservoir.snapshot(reset);
        HistogramValue::new(last.value, last.tag, Arc::from(snapshot))
    }
}

impl std::fmt::Debug for HistogramMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistogramMetric")
            .field("size", &self.reservoir.size())
            .field("last", &*self.last.lock())
            .finish()
    }
}
