//! Error types for the metrics engine.

use thiserror::Error;

/// Errors surfaced to callers of the metrics engine.
///
/// Recording never fails; only queries with bad arguments and configuration
/// loading do.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Quantile outside `[0, 1]` (or NaN)
    #[error("{0} is not in [0..1]")]
    InvalidQuantile(f64),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while reading a configuration file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
