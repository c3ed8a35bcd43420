use std::fmt;

use serde::{Deserialize, Serialize};

/// Time granularity used for durations and rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub const fn nanos_per_unit(self) -> i64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Converts `value` of this unit to nanoseconds, saturating at the
    /// `i64` bounds.
    pub fn to_nanoseconds(self, value: i64) -> i64 {
        value.saturating_mul(self.nanos_per_unit())
    }

    pub fn to_milliseconds(self, value: i64) -> i64 {
        self.convert(TimeUnit::Milliseconds, value)
    }

    pub fn to_seconds(self, value: i64) -> i64 {
        self.convert(TimeUnit::Seconds, value)
    }

    /// Converts `value` of this unit into `target`, truncating toward zero
    /// when `target` is coarser.
    pub fn convert(self, target: TimeUnit, value: i64) -> i64 {
        let from = self.nanos_per_unit();
        let to = target.nanos_per_unit();
        if from >= to {
            value.saturating_mul(from / to)
        } else {
            value / (to / from)
        }
    }

    /// Factor that turns a quantity expressed in this unit into `target`
    /// (e.g. nanoseconds -> milliseconds is `1e-6`).
    pub fn scaling_factor_for(self, target: TimeUnit) -> f64 {
        self.nanos_per_unit() as f64 / target.nanos_per_unit() as f64
    }

    /// Short name used when formatting values.
    pub const fn unit_name(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit_name())
    }
}
