//! Error types for adaptive admission.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating an [`AdaptiveConfig`].
///
/// [`AdaptiveConfig`]: crate::AdaptiveConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("min ceiling {min} is greater than max ceiling {max}")]
    InvertedBounds { min: u32, max: u32 },

    #[error("max failure rate must be within 0.0..=1.0, got {0}")]
    FailureRateOutOfRange(f64),

    #[error("smoothing factor {name} must be within (0.0, 1.0], got {value}")]
    AlphaOutOfRange { name: &'static str, value: f64 },

    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),
}

/// Returned by [`AdaptiveLimiter::execute`] when the unit of work is not
/// admitted in the current window.
///
/// [`AdaptiveLimiter::execute`]: crate::AdaptiveLimiter::execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limited: admission ceiling of {ceiling} reached for this window")]
pub struct Rejected {
    /// Ceiling in force when the work was turned away.
    pub ceiling: u32,
}
