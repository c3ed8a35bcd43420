//! Tunables shared by the metrics a process builds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::MeterMetric;
use crate::error::{MetricsError, Result};
use crate::sampling::{
    ExponentiallyDecayingReservoir, HdrHistogramReservoir, Reservoir, SamplingType,
    SlidingWindowReservoir, UniformReservoir,
};
use crate::utils::clock::Clock;
use crate::utils::scheduler::{ActionScheduler, Scheduler};

const MAX_HDR_SIGNIFICANT_DIGITS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Reservoir used when a histogram asks for `SamplingType::Default`
    #[serde(default = "default_sampling_type")]
    pub default_sampling_type: SamplingType,

    /// Capacity of the uniform, sliding window and decaying reservoirs
    #[serde(default = "default_reservoir_size")]
    pub reservoir_size: usize,

    /// Decay factor of the forward-decaying reservoir
    #[serde(default = "default_decay_alpha")]
    pub decay_alpha: f64,

    #[serde(default = "default_rescale_interval")]
    pub rescale_interval_secs: u64,

    /// How often meters fold marks into their moving averages
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_hdr_significant_digits")]
    pub hdr_significant_digits: u8,
}

fn default_sampling_type() -> SamplingType {
    SamplingType::ExponentiallyDecaying
}
fn default_reservoir_size() -> usize {
    crate::sampling::DEFAULT_RESERVOIR_SIZE
}
fn default_decay_alpha() -> f64 {
    crate::sampling::exp_decay::DEFAULT_ALPHA
}
fn default_rescale_interval() -> u64 {
    3600
}
fn default_tick_interval() -> u64 {
    5
}
fn default_hdr_significant_digits() -> u8 {
    crate::sampling::hdr::DEFAULT_SIGNIFICANT_DIGITS
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_sampling_type: default_sampling_type(),
            reservoir_size: default_reservoir_size(),
            decay_alpha: default_decay_alpha(),
            rescale_interval_secs: default_rescale_interval(),
            tick_interval_secs: default_tick_interval(),
            hdr_significant_digits: default_hdr_significant_digits(),
        }
    }
}

impl MetricsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MetricsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.reservoir_size == 0 {
            Some("reservoir_size must be at least 1".to_owned())
        } else if !(self.decay_alpha.is_finite() && self.decay_alpha > 0.0) {
            Some(format!("decay_alpha must be positive, got {}", self.decay_alpha))
        } else if self.rescale_interval_secs == 0 {
            Some("rescale_interval_secs must be at least 1".to_owned())
        } else if self.tick_interval_secs == 0 {
            Some("tick_interval_secs must be at least 1".to_owned())
        } else if self.hdr_significant_digits > MAX_HDR_SIGNIFICANT_DIGITS {
            Some(format!(
                "hdr_significant_digits must be between 0 and {MAX_HDR_SIGNIFICANT_DIGITS}, got {}",
                self.hdr_significant_digits
            ))
        } else {
            None
        };

        match problem {
            Some(reason) => {
                warn!(%reason, "rejecting metrics configuration");
                Err(MetricsError::InvalidConfig(reason))
            }
            None => Ok(()),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn rescale_interval(&self) -> Duration {
        Duration::from_secs(self.rescale_interval_secs)
    }

    /// Concrete reservoir for `sampling_type`; `Default` resolves to
    /// `default_sampling_type`. The decaying reservoir gets its own rescale
    /// thread.
    pub fn build_reservoir(&self, sampling_type: SamplingType, clock: Arc<dyn Clock>) -> Box<dyn Reservoir> {
        self.build_reservoir_with_scheduler(
            sampling_type,
            clock,
            Box::new(ActionScheduler::named("metrics-rescale")),
        )
    }

    /// Like [`build_reservoir`](Self::build_reservoir); `scheduler` drives
    /// rescaling and is unused by the other reservoirs.
    pub fn build_reservoir_with_scheduler(
        &self,
        sampling_type: SamplingType,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn Scheduler>,
    ) -> Box<dyn Reservoir> {
        match self.resolve(sampling_type) {
            SamplingType::HighDynamicRange => {
                match HdrHistogramReservoir::with_significant_digits(self.hdr_significant_digits) {
                    Ok(reservoir) => Box::new(reservoir),
                    Err(e) => {
                        warn!(error = %e, "falling back to default hdr precision");
                        Box::new(HdrHistogramReservoir::new())
                    }
                }
            }
            SamplingType::LongTerm => Box::new(UniformReservoir::new(self.reservoir_size)),
            SamplingType::SlidingWindow => {
                Box::new(SlidingWindowReservoir::new(self.reservoir_size))
            }
            SamplingType::ExponentiallyDecaying | SamplingType::Default => {
                Box::new(ExponentiallyDecayingReservoir::with_options(
                    self.reservoir_size,
                    self.decay_alpha,
                    self.rescale_interval(),
                    clock,
                    scheduler,
                    StdRng::from_entropy(),
                ))
            }
        }
    }

    /// Meter ticking at the configured interval on its own thread.
    pub fn build_meter(&self, clock: Arc<dyn Clock>) -> MeterMetric {
        MeterMetric::with_tick_interval(
            clock,
            Box::new(ActionScheduler::named("metrics-tick")),
            self.tick_interval(),
        )
    }

    fn resolve(&self, sampling_type: SamplingType) -> SamplingType {
        match sampling_type {
            SamplingType::Default => self.default_sampling_type,
            other => other,
        }
    }
}
