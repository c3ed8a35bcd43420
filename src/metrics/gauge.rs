//! Gauges: instantaneous `f64` readings with no history. They only have the
//! read side; `reset` on a read is ignored.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use super::MetricValueProvider;
use crate::utils::atomic_f64::AtomicF64;

type GaugeFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Reads its value from a function on every read. A panicking function reads
/// as `NaN`.
pub struct FunctionGauge {
    read: GaugeFn,
}

impl FunctionGauge {
    pub fn new(read: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            read: Box::new(read),
        }
    }
}

impl MetricValueProvider<f64> for FunctionGauge {
    fn get_value(&self, _reset: bool) -> f64 {
        guarded(|| (self.read)())
    }
}

/// Transforms the reading of another gauge.
pub struct DerivedGauge {
    source: Arc<dyn MetricValueProvider<f64>>,
    transform: Box<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl DerivedGauge {
    pub fn new(
        source: Arc<dyn MetricValueProvider<f64>>,
        transform: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            transform: Box::new(transform),
        }
    }
}

impl MetricValueProvider<f64> for DerivedGauge {
    fn get_value(&self, _reset: bool) -> f64 {
        let value = self.source.value();
        guarded(|| (self.transform)(value))
    }
}

/// Gauge holding the last value set.
#[derive(Debug, Default)]
pub struct ValueGauge {
    value: AtomicF64,
}

impl ValueGauge {
    pub fn new(initial: f64) -> Self {
        Self {
            value: AtomicF64::new(initial),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.store(value);
    }
}

impl MetricValueProvider<f64> for ValueGauge {
    fn get_value(&self, _reset: bool) -> f64 {
        self.value.load()
    }
}

fn guarded(read: impl FnOnce() -> f64) -> f64 {
    match catch_unwind(AssertUnwindSafe(read)) {
        Ok(value) => value,
        Err(_) => {
            warn!("gauge read panicked");
            f64::NAN
        }
    }
}
