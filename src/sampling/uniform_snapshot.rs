use super::{Sample, Snapshot};

/// Snapshot over equally weighted values.
///
/// Quantiles interpolate linearly between the two closest ranks, using
/// position `q * (n + 1)`.
#[derive(Debug, Clone, Default)]
pub struct UniformSnapshot {
    count: u64,
    values: Vec<i64>,
    min_user_value: Option<String>,
    max_user_value: Option<String>,
}

impl UniformSnapshot {
    pub fn new(count: u64, mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self {
            count,
            values,
            min_user_value: None,
            max_user_value: None,
        }
    }

    /// Builds from tagged samples; min/max tags come from the smallest and
    /// largest sample.
    pub fn from_samples(count: u64, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.value);
        let min_user_value = samples.first().and_then(|s| s.tag.clone());
        let max_user_value = samples.last().and_then(|s| s.tag.clone());
        Self {
            count,
            values: samples.into_iter().map(|s| s.value).collect(),
            min_user_value,
            max_user_value,
        }
    }
}

impl Snapshot for UniformSnapshot {
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
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let sum: f64 = self
            .values
            .iter()
            .map(|&v| {
                let diff = v as f64 - mean;
                diff * diff
            })
            .sum();
        (sum / (n - 1) as f64).sqrt()
    }

    fn values(&self) -> Vec<i64> {
        self.values.clone()
    }

    fn value_at_quantile(&self, quantile: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }

        let pos = quantile * (n + 1) as f64;
        let index = pos.floor() as usize;

        if index < 1 {
            return self.values[0] as f64;
        }
        if index >= n {
            return self.values[n - 1] as f64;
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_to_hundred() -> UniformSnapshot {
        UniformSnapshot::new(100, (1..=100).rev().collect())
    }

    #[test]
    fn min_max_and_interpolated_median() {
        let snapshot = one_to_hundred();
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 100);
        // pos = 0.5 * 101 = 50.5 -> halfway between the 50th and 51st value
        assert_eq!(snapshot.median(), 50.5);
        assert_eq!(snapshot.value(0.5).unwrap(), 50.5);
    }

    #[test]
    fn quantile_boundaries_clamp_to_extremes() {
        let snapshot = one_to_hundred();
        assert_eq!(snapshot.value(0.0).unwrap(), 1.0);
        assert_eq!(snapshot.value(1.0).unwrap(), 100.0);
        // pos = 0.999 * 101 = 100.899 -> index 100 >= n
        assert_eq!(snapshot.percentile_999(), 100.0);
        // pos = 0.75 * 101 = 75.75
        assert!((snapshot.percentile_75() - 75.75).abs() < 1e-9);
    }

    #[test]
    fn rejects_quantiles_outside_unit_interval() {
        let snapshot = one_to_hundred();
        assert!(snapshot.value(-0.1).is_err());
        assert!(snapshot.value(1.01).is_err());
        assert!(snapshot.value(f64::NAN).is_err());
    }

    #[test]
    fn mean_and_sample_std_dev() {
        let snapshot = UniformSnapshot::new(5, vec![5, 1, 2, 3, 4]);
        assert_eq!(snapshot.values(), vec![1, 2, 3, 4, 5]);
        assert_eq!(snapshot.mean(), 3.0);
        assert!((snapshot.std_dev() - 1.5811).abs() < 1e-4);
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let snapshot = UniformSnapshot::new(0, Vec::new());
        assert_eq!(snapshot.size(), 0);
        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.median(), 0.0);
    }

    #[test]
    fn single_value_has_zero_std_dev() {
        let snapshot = UniformSnapshot::new(1, vec![1]);
        assert_eq!(snapshot.mean(), 1.0);
        assert_eq!(snapshot.std_dev(), 0.0);
    }

    #[test]
    fn tags_follow_extremes() {
        let snapshot = UniformSnapshot::from_samples(
            2,
            vec![Sample::new(2, Some("B")), Sample::new(1, Some("A"))],
        );
        assert_eq!(snapshot.min_user_value(), Some("A"));
        assert_eq!(snapshot.max_user_value(), Some("B"));
    }
}
