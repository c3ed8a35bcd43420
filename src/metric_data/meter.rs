use serde::Serialize;

use crate::utils::time_unit::TimeUnit;

/// Point-in-time meter read. Rates are events per `rate_unit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterValue {
    pub count: i64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minute_rate: f64,
    pub fifteen_minute_rate: f64,
    pub rate_unit: TimeUnit,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<MeterItem>,
}

/// Rates for one marked item, with its share of the meter's count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterItem {
    pub item: String,
    pub percent: f64,
    pub value: MeterValue,
}

impl MeterValue {
    pub fn empty(rate_unit: TimeUnit) -> Self {
        Self {
            count: 0,
            mean_rate: 0.0,
            one_minute_rate: 0.0,
            five_minute_rate: 0.0,
            fifteen_minute_rate: 0.0,
            rate_unit,
            items: Vec::new(),
        }
    }

    /// Same value with every rate expressed per `unit`.
    pub fn scale(&self, unit: TimeUnit) -> MeterValue {
        if unit == self.rate_unit {
            return self.clone();
        }
        let factor = unit.nanos_per_unit() as f64 / self.rate_unit.nanos_per_unit() as f64;
        MeterValue {
            count: self.count,
            mean_rate: self.mean_rate * factor,
            one_minute_rate: self.one_minute_rate * factor,
            five_minute_rate: self.five_minute_rate * factor,
            fifteen_minute_rate: self.fifteen_minute_rate * factor,
            rate_unit: unit,
            items: self
                .items
                .iter()
                .map(|i| MeterItem {
                    item: i.item.clone(),
                    percent: i.percent,
                    value: i.value.scale(unit),
                })
                .collect(),
        }
    }

    pub fn item(&self, name: &str) -> Option<&MeterItem> {
        self.items.iter().find(|i| i.item == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_rates_including_items() {
        let mut value = MeterValue::empty(TimeUnit::Seconds);
        value.count = 10;
        value.mean_rate = 2.0;
        value.one_minute_rate = 1.0;
        value.items.push(MeterItem {
            item: "a".into(),
            percent: 100.0,
            value: MeterValue {
                one_minute_rate: 0.5,
                ..MeterValue::empty(TimeUnit::Seconds)
            },
        });

        let per_minute = value.scale(TimeUnit::Minutes);
        assert_eq!(per_minute.rate_unit, TimeUnit::Minutes);
        assert_eq!(per_minute.count, 10);
        assert_eq!(per_minute.mean_rate, 120.0);
        assert_eq!(per_minute.one_minute_rate, 60.0);
        assert_eq!(per_minute.items[0].value.one_minute_rate, 30.0);
    }
}
