//! Limiter configuration and its TOML representation.
//!
//! ```toml
//! target_latency = "200ms"
//! max_failure_rate = 0.05
//! increase_step = 1
//! decrease_step = 2
//! min_ceiling = 1
//! max_ceiling = 100
//! cooldown = "2s"
//!
//! # optional
//! window = "1s"
//! adjust_interval = "1s"
//! latency_alpha = 0.3
//! failure_alpha = 0.2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, ConfigResult};
use crate::ewma::{DEFAULT_FAILURE_ALPHA, DEFAULT_LATENCY_ALPHA};

/// Controls how the limiter retunes its ceiling.
///
/// Nothing here is checked by [`AdaptiveLimiter::new`]; out-of-range
/// values produce odd but non-crashing behavior. Call [`validate`] or use
/// [`AdaptiveLimiter::try_new`] to fail fast instead.
///
/// [`AdaptiveLimiter::new`]: crate::AdaptiveLimiter::new
/// [`AdaptiveLimiter::try_new`]: crate::AdaptiveLimiter::try_new
/// [`validate`]: AdaptiveConfig::validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Smoothed latency above this shrinks the ceiling.
    #[serde(with = "duration_str")]
    pub target_latency: Duration,

    /// Smoothed failure rate (0.0–1.0) above this shrinks the ceiling.
    pub max_failure_rate: f64,

    /// Ceiling delta applied on a healthy tick.
    pub increase_step: u32,

    /// Ceiling delta applied on an unhealthy tick.
    pub decrease_step: u32,

    /// Lower bound on the ceiling.
    pub min_ceiling: u32,

    /// Upper bound on the ceiling.
    pub max_ceiling: u32,

    /// Minimum time between two consecutive adjustments.
    #[serde(with = "duration_str")]
    pub cooldown: Duration,

    /// Length of one admission window.
    #[serde(with = "duration_str", default = "default_tick")]
    pub window: Duration,

    /// How often the controller evaluates the smoothed signals.
    #[serde(with = "duration_str", default = "default_tick")]
    pub adjust_interval: Duration,

    /// Smoothing factor for the latency estimator.
    #[serde(default = "default_latency_alpha")]
    pub latency_alpha: f64,

    /// Smoothing factor for the failure estimator.
    #[serde(default = "default_failure_alpha")]
    pub failure_alpha: f64,
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_latency_alpha() -> f64 {
    DEFAULT_LATENCY_ALPHA
}

fn default_failure_alpha() -> f64 {
    DEFAULT_FAILURE_ALPHA
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            target_latency: Duration::from_millis(200),
            max_failure_rate: 0.05,
            increase_step: 1,
            decrease_step: 2,
            min_ceiling: 1,
            max_ceiling: 100,
            cooldown: Duration::from_secs(2),
            window: default_tick(),
            adjust_interval: default_tick(),
            latency_alpha: DEFAULT_LATENCY_ALPHA,
            failure_alpha: DEFAULT_FAILURE_ALPHA,
        }
    }
}

impl AdaptiveConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the configuration for values that would make the controller
    /// misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_ceiling > self.max_ceiling {
            return Err(ConfigError::InvertedBounds {
                min: self.min_ceiling,
                max: self.max_ceiling,
            });
        }
        if !(0.0..=1.0).contains(&self.max_failure_rate) {
            return Err(ConfigError::FailureRateOutOfRange(self.max_failure_rate));
        }
        for (name, value) in [
            ("latency_alpha", self.latency_alpha),
            ("failure_alpha", self.failure_alpha),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::AlphaOutOfRange { name, value });
            }
        }
        if self.window.is_zero() {
            return Err(ConfigError::ZeroInterval("window"));
        }
        if self.adjust_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("adjust"));
        }
        Ok(())
    }
}

/// Parse a duration string like "500us", "250ms", "2s" or "5m".
///
/// `ns` and `us` are accepted for sub-millisecond values. A bare integer
/// is read as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let (digits, scale_ns) = if let Some(ns) = s.strip_suffix("ns") {
        (ns, 1)
    } else if let Some(us) = s.strip_suffix("us") {
        (us, 1_000)
    } else if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1_000_000)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000_000_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000_000_000)
    } else {
        (s, 1_000_000_000)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale_ns))
        .map(Duration::from_nanos)
        .ok_or_else(invalid)
}

/// Render a duration in the largest unit [`parse_duration`] reads back
/// without losing precision.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    for (unit, scale) in [
        ("m", 60_000_000_000),
        ("s", 1_000_000_000),
        ("ms", 1_000_000),
        ("us", 1_000),
    ] {
        if nanos % scale == 0 {
            return format!("{}{unit}", nanos / scale);
        }
    }
    format!("{nanos}ns")
}

mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
