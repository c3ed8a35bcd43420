use serde::Serialize;

use super::histogram::HistogramValue;
use super::meter::MeterValue;
use crate::utils::time_unit::TimeUnit;

/// Point-in-time timer read: call rate, duration distribution, sessions in
/// flight and the total time recorded.
#[derive(Debug, Clone, Serialize)]
pub struct TimerValue {
    pub rate: MeterValue,
    pub histogram: HistogramValue,
    pub active_sessions: i64,
    pub total_time: i64,
    pub duration_unit: TimeUnit,
}

impl TimerValue {
    /// Re-expresses rates per `rate_unit` and durations in `duration_unit`.
    pub fn scale(&self, rate_unit: TimeUnit, duration_unit: TimeUnit) -> TimerValue {
        let factor = self.duration_unit.scaling_factor_for(duration_unit);
        TimerValue {
            rate: self.rate.scale(rate_unit),
            histogram: self.histogram.scale(factor),
            active_sessions: self.active_sessions,
            total_time: self.duration_unit.convert(duration_unit, self.total_time),
            duration_unit,
        }
    }
}
