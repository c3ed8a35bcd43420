//! Point-in-time values read out of metrics. Everything here is plain data:
//! cloneable, serializable, detached from the metric it came from.

pub mod counter;
pub mod histogram;
pub mod meter;
pub mod summary;
pub mod timer;

pub use counter::{CounterItem, CounterValue};
pub use histogram::HistogramValue;
pub use meter::{MeterItem, MeterValue};
pub use summary::SnapshotSummary;
pub use timer::TimerValue;
