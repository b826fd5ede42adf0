//! adaptive-admission: in-process admission control with a self-tuning ceiling.
//!
//! Decides per unit of work whether to admit it, and retunes the
//! per-window admission ceiling from smoothed latency and failure signals.
//! Limits are local to one process; nothing is coordinated across
//! instances or persisted.
//!
//! # Architecture
//!
//! ```text
//! AdaptiveLimiter
//!   ├── decide()  → LimiterState::try_admit()     (hot path, one lock)
//!   ├── report()  → latency Ewma + failure Ewma   (own locks)
//!   ├── window reset task   → LimiterState::reset_window() every window
//!   └── controller task     → controller::step() every adjust interval
//! ```
//!
//! # Control Algorithm
//!
//! ```text
//! if now - last_adjustment < cooldown:
//!     skip
//! if avg_latency > target_latency or failure_rate > max_failure_rate:
//!     ceiling = max(ceiling - decrease_step, min_ceiling)
//! else:
//!     ceiling = min(ceiling + increase_step, max_ceiling)
//! last_adjustment = now
//! ```
//!
//! Asymmetric steps (decrease larger than increase) bias the limiter
//! toward caution.

pub mod config;
pub mod controller;
pub mod error;
pub mod ewma;
pub mod limiter;
mod tick;
pub mod window;

pub use config::AdaptiveConfig;
pub use controller::Adjustment;
pub use error::{ConfigError, ConfigResult, Rejected};
pub use ewma::Ewma;
pub use limiter::{AdaptiveLimiter, LimiterSnapshot};
pub use window::LimiterState;
