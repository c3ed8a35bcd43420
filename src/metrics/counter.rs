use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Counter, MetricValueProvider};
use crate::metric_data::CounterValue;
use crate::utils::adder::StripedLongAdder;

/// Counter over a striped adder, with per-item adders created on first use.
#[derive(Debug, Default)]
pub struct CounterMetric {
    total: StripedLongAdder,
    items: RwLock<HashMap<String, StripedLongAdder>>,
}

impl CounterMetric {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_item(&self, item: &str, apply: impl FnOnce(&StripedLongAdder)) {
        if let Some(adder) = self.items.read().get(item) {
            apply(adder);
            return;
        }
        let mut items = self.items.write();
        apply(items.entry(item.to_owned()).or_default());
    }
}

impl Counter for CounterMetric {
    fn increment_by(&self, amount: i64) {
        self.total.add(amount);
    }

    fn increment_item(&self, item: &str, amount: i64) {
        self.total.add(amount);
        self.with_item(item, |adder| adder.add(amount));
    }

    fn reset(&self) {
        self.total.reset();
        for adder in self.items.read().values() {
            adder.reset();
        }
    }
}

impl MetricValueProvider<CounterValue> for CounterMetric {
    fn get_value(&self, reset: bool) -> CounterValue {
        let total = self.total.value();
        let value = {
            let items = self.items.read();
            if items.is_empty() {
                CounterValue::new(total)
            } else {
                CounterValue::with_items(
                    total,
                    items.iter().map(|(name, adder)| (name.clone(), adder.value())),
                )
            }
        };
        if reset {
            Counter::reset(self);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_from_zero() {
        assert_eq!(CounterMetric::new().value().count, 0);
    }

    #[test]
    fn can_increment_and_decrement() {
        let counter = CounterMetric::new();
        counter.increment();
        counter.increment_by(4);
        counter.decrement();
        counter.decrement_by(2);
        assert_eq!(counter.value().count, 2);
    }

    #[test]
    fn tracks_items_with_percentages() {
        let counter = CounterMetric::new();
        counter.increment_item("A", 1);
        counter.increment_item("B", 3);
        counter.decrement_item("B", 1);

        let value = counter.value();
        assert_eq!(value.count, 3);
        assert_eq!(value.items.len(), 2);
        assert_eq!(value.items[0].item, "A");
        assert_eq!(value.items[0].count, 1);
        assert!((value.items[0].percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(value.item("B").map(|i| i.count), Some(2));
    }

    #[test]
    fn item_percent_is_zero_when_total_is_zero() {
        let counter = CounterMetric::new();
        counter.increment_item("A", 2);
        counter.decrement_by(2);
        let value = counter.value();
        assert_eq!(value.count, 0);
        assert_eq!(value.items[0].percent, 0.0);
    }

    #[test]
    fn reset_zeroes_total_and_items() {
        let counter = CounterMetric::new();
        counter.increment_item("A", 5);
        Counter::reset(&counter);
        let value = counter.value();
        assert_eq!(value.count, 0);
        assert!(value.items.iter().all(|i| i.count == 0));

        // never-used counter resets quietly
        Counter::reset(&CounterMetric::new());
    }

    #[test]
    fn get_value_with_reset_returns_then_clears() {
        let counter = CounterMetric::new();
        counter.increment_by(7);
        assert_eq!(counter.get_value(true).count, 7);
        assert_eq!(counter.value().count, 0);
    }
}
