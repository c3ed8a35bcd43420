use std::sync::Arc;

use super::Snapshot;

/// A snapshot re-expressed in another unit: every value multiplied by
/// `factor`. Integer accessors truncate toward zero.
#[derive(Debug, Clone)]
pub struct ScaledSnapshot {
    source: Arc<dyn Snapshot>,
    factor: f64,
}

impl ScaledSnapshot {
    pub fn new(source: Arc<dyn Snapshot>, factor: f64) -> Self {
        Self { source, factor }
    }

    fn scale(&self, value: i64) -> i64 {
        (value as f64 * self.factor) as i64
    }
}

impl Snapshot for ScaledSnapshot {
    fn count(&self) -> u64 {
        self.source.count()
    }

    fn size(&self) -> usize {
        self.source.size()
    }

    fn min(&self) -> i64 {
        self.scale(self.source.min())
    }

    fn max(&self) -> i64 {
        self.scale(self.source.max())
    }

    fn min_user_value(&self) -> Option<&str> {
        self.source.min_user_value()
    }

    fn max_user_value(&self) -> Option<&str> {
        self.source.max_user_value()
    }

    fn mean(&self) -> f64 {
        self.source.mean() * self.factor
    }

    fn std_dev(&self) -> f64 {
        self.source.std_dev() * self.factor
    }

    fn values(&self) -> Vec<i64> {
        self.source.values().into_iter().map(|v| self.scale(v)).collect()
    }

    fn value_at_quantile(&self, quantile: f64) -> f64 {
        self.source.value_at_quantile(quantile) * self.factor
    }
}
