use serde::Serialize;

use crate::sampling::Snapshot;

/// Flattened, serializable view of a snapshot: the usual percentile
/// breakdown plus extremes and their tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_user_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_user_value: Option<String>,
    pub mean: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl SnapshotSummary {
    /// Extracts the full breakdown. An empty snapshot yields all zeros.
    pub fn from_snapshot(snapshot: &dyn Snapshot) -> Self {
        if snapshot.size() == 0 {
            return Self {
                count: snapshot.count(),
                ..Self::empty()
            };
        }

        Self {
            count: snapshot.count(),
            min: snapshot.min(),
            max: snapshot.max(),
            min_user_value: snapshot.min_user_value().map(str::to_owned),
            max_user_value: snapshot.max_user_value().map(str::to_owned),
            mean: snapshot.mean(),
            std_dev: snapshot.std_dev(),
            p50: snapshot.median(),
            p75: snapshot.percentile_75(),
            p95: snapshot.percentile_95(),
            p98: snapshot.percentile_98(),
            p99: snapshot.percentile_99(),
            p999: snapshot.percentile_999(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0,
            max: 0,
            min_user_value: None,
            max_user_value: None,
            mean: 0.0,
            std_dev: 0.0,
            p50: 0.0,
            p75: 0.0,
            p95: 0.0,
            p98: 0.0,
            p99: 0.0,
            p999: 0.0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
