use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use super::summary::SnapshotSummary;
use crate::sampling::{ScaledSnapshot, Snapshot};

/// Point-in-time histogram read: the last recorded value and a snapshot of
/// the reservoir.
#[derive(Debug, Clone)]
pub struct HistogramValue {
    pub last_value: i64,
    pub last_user_value: Option<String>,
    pub snapshot: Arc<dyn Snapshot>,
}

impl HistogramValue {
    pub fn new(last_value: i64, last_user_value: Option<String>, snapshot: Arc<dyn Snapshot>) -> Self {
        Self {
            last_value,
            last_user_value,
            snapshot,
        }
    }

    pub fn count(&self) -> u64 {
        self.snapshot.count()
    }

    /// Same value with every recorded quantity multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> HistogramValue {
        if factor == 1.0 {
            return self.clone();
        }
        HistogramValue {
            last_value: (self.last_value as f64 * factor) as i64,
            last_user_value: self.last_user_value.clone(),
            snapshot: Arc::new(ScaledSnapshot::new(self.snapshot.clone(), factor)),
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary::from_snapshot(self.snapshot.as_ref())
    }
}

#[derive(serde::Serialize)]
struct HistogramValueRepr<'a> {
    last_value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_user_value: Option<&'a str>,
    #[serde(flatten)]
    snapshot: SnapshotSummary,
}

impl Serialize for HistogramValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        HistogramValueRepr {
            last_value: self.last_value,
            last_user_value: self.last_user_value.as_deref(),
            snapshot: self.summary(),
        }
        .serialize(serializer)
    }
}
