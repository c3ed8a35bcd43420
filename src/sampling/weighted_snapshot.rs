use super::{Snapshot, WeightedSample};

/// Snapshot over samples carrying decay weights.
///
/// Weights are normalized to sum to one and accumulated into quantile
/// boundaries; a quantile resolves to the sample whose boundary range
/// contains it (no interpolation).
#[derive(Debug, Clone, Default)]
pub struct WeightedSnapshot {
    count: u64,
    values: Vec<i64>,
    norm_weights: Vec<f64>,
    quantiles: Vec<f64>,
    min_user_value: Option<String>,
    max_user_value: Option<String>,
}

impl WeightedSnapshot {
    pub fn new(count: u64, mut samples: Vec<WeightedSample>) -> Self {
        samples.sort_by_key(|s| s.value);

        let n = samples.len();
        let sum_weight: f64 = samples.iter().map(|s| s.weight).sum();
        // All weights may have decayed to zero after an extreme rescale;
        // treat the survivors as equally weighted then.
        let uniform = !(sum_weight.is_finite() && sum_weight > 0.0);

        let mut values = Vec::with_capacity(n);
        let mut norm_weights = Vec::with_capacity(n);
        let mut quantiles = Vec::with_capacity(n);
        for (i, s) in samples.iter().enumerate() {
            values.push(s.value);
            norm_weights.push(if uniform {
                1.0 / n as f64
            } else {
                s.weight / sum_weight
            });
            quantiles.push(if i == 0 {
                0.0
            } else {
                quantiles[i - 1] + norm_weights[i - 1]
            });
        }

        let min_user_value = samples.first().and_then(|s| s.tag.clone());
        let max_user_value = samples.last().and_then(|s| s.tag.clone());

        Self {
            count,
            values,
            norm_weights,
            quantiles,
            min_user_value,
            max_user_value,
        }
    }
}

impl Snapshot for WeightedSnapshot {
    fn count(&self) -> u64 {
        self.count
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or_default()
    }

    fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or_default()
    }

    fn min_user_value(&self) -> Option<&str> {
        self.min_user_value.as_deref()
    }

    fn max_user_value(&self) -> Option<&str> {
        self.max_user_value.as_deref()
    }

    fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.norm_weights)
            .map(|(&v, w)| v as f64 * w)
            .sum()
    }

    fn std_dev(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.norm_weights)
            .map(|(&v, w)| {
                let diff = v as f64 - mean;
                w * diff * diff
            })
            .sum();
        variance.sqrt()
    }

    fn values(&self) -> Vec<i64> {
        self.values.clone()
    }

    fn value_at_quantile(&self, quantile: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }

        let pos = match self.quantiles.binary_search_by(|b| b.total_cmp(&quantile)) {
            Ok(i) => i,
            Err(0) => return self.values[0] as f64,
            Err(i) => i - 1,
        };

        if pos < 1 {
            return self.values[0] as f64;
        }
        self.values[pos.min(n - 1)] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: i64, weight: f64) -> WeightedSample {
        WeightedSample {
            value,
            tag: None,
            weight,
        }
    }

    fn snapshot() -> WeightedSnapshot {
        WeightedSnapshot::new(
            5,
            vec![
                sample(5, 1.0),
                sample(1, 2.0),
                sample(2, 3.0),
                sample(3, 2.0),
                sample(4, 2.0),
            ],
        )
    }

    #[test]
    fn small_quantiles_are_the_first_value() {
        assert_eq!(snapshot().value(0.0).unwrap(), 1.0);
    }

    #[test]
    fn big_quantiles_are_the_last_value() {
        assert_eq!(snapshot().value(1.0).unwrap(), 5.0);
    }

    #[test]
    fn has_weighted_percentiles() {
        let s = snapshot();
        assert_eq!(s.median(), 3.0);
        assert_eq!(s.percentile_75(), 4.0);
        assert_eq!(s.percentile_95(), 5.0);
        assert_eq!(s.percentile_98(), 5.0);
        assert_eq!(s.percentile_99(), 5.0);
        assert_eq!(s.percentile_999(), 5.0);
    }

    #[test]
    fn has_values_min_max_and_weighted_mean() {
        let s = snapshot();
        assert_eq!(s.values(), vec![1, 2, 3, 4, 5]);
        assert_eq!(s.min(), 1);
        assert_eq!(s.max(), 5);
        assert!((s.mean() - 2.7).abs() < 1e-9);
        assert!((s.std_dev() - 1.2688).abs() < 1e-4);
    }

    #[test]
    fn rejects_invalid_quantiles() {
        assert!(snapshot().value(1.5).is_err());
        assert!(snapshot().value(-0.5).is_err());
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let s = WeightedSnapshot::new(0, Vec::new());
        assert_eq!(s.min(), 0);
        assert_eq!(s.max(), 0);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.std_dev(), 0.0);
        assert_eq!(s.median(), 0.0);
    }

    #[test]
    fn single_item_has_zero_std_dev() {
        let s = WeightedSnapshot::new(1, vec![sample(1, 1.0)]);
        assert_eq!(s.std_dev(), 0.0);
    }

    #[test]
    fn zero_weights_fall_back_to_equal_weights() {
        let s = WeightedSnapshot::new(2, vec![sample(10, 0.0), sample(20, 0.0)]);
        assert_eq!(s.mean(), 15.0);
        assert!(!s.median().is_nan());
    }
}
