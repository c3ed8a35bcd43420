use serde::Serialize;

/// Point-in-time counter read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterValue {
    pub count: i64,
    /// Per-item breakdown, sorted by item name. Empty when no item was ever
    /// counted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CounterItem>,
}

/// Count for one item and its share of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterItem {
    pub item: String,
    pub count: i64,
    /// Percentage of the counter total; 0 when the total is 0
    pub percent: f64,
}

impl CounterValue {
    pub fn new(count: i64) -> Self {
        Self {
            count,
            items: Vec::new(),
        }
    }

    /// Builds the breakdown from raw `(item, count)` pairs.
    pub fn with_items(count: i64, items: impl IntoIterator<Item = (String, i64)>) -> Self {
        let mut items: Vec<CounterItem> = items
            .into_iter()
            .map(|(item, value)| CounterItem {
                item,
                count: value,
                percent: percent_of(value, count),
            })
            .collect();
        items.sort_by(|a, b| a.item.cmp(&b.item));
        Self { count, items }
    }

    pub fn item(&self, name: &str) -> Option<&CounterItem> {
        self.items.iter().find(|i| i.item == name)
    }
}

pub(crate) fn percent_of(part: i64, total: i64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_sorted_with_percentages() {
        let value = CounterValue::with_items(4, [("b".to_owned(), 3), ("a".to_owned(), 1)]);
        assert_eq!(value.items[0].item, "a");
        assert_eq!(value.items[0].percent, 25.0);
        assert_eq!(value.item("b").map(|i| i.percent), Some(75.0));
    }

    #[test]
    fn zero_total_gives_zero_percent() {
        let value = CounterValue::with_items(0, [("a".to_owned(), 0)]);
        assert_eq!(value.items[0].percent, 0.0);
        assert!(percent_of(5, -5) == 0.0);
    }
}
