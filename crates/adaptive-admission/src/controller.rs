//! Threshold controller. Moves the admission ceiling from smoothed signals.
//!
//! Each tick the controller checks the cooldown, reads the latency and
//! failure estimators, and steps the ceiling down when either is over
//! its threshold or up otherwise. The ceiling is clamped into
//! `min_ceiling..=max_ceiling` on the way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::AdaptiveConfig;
use crate::ewma::Ewma;
use crate::limiter::Shared;
use crate::tick::ticker;
use crate::window::LimiterState;

/// Outcome of one controller tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    /// Still inside the cooldown since the previous adjustment.
    Cooldown { remaining: Duration },
    /// Signals were healthy; `to` may equal `from` when already at max.
    Increased { from: u32, to: u32 },
    /// A signal was over threshold; `to` may equal `from` when already at min.
    Decreased { from: u32, to: u32 },
}

impl Adjustment {
    /// Whether the ceiling value moved on this tick.
    pub fn changed(&self) -> bool {
        match self {
            Adjustment::Cooldown { .. } => false,
            Adjustment::Increased { from, to } | Adjustment::Decreased { from, to } => from != to,
        }
    }
}

/// Run one controller step against `state` at `now`.
///
/// The estimators are only read once the cooldown has elapsed. The
/// adjustment instant is recorded even when the ceiling is pinned at a
/// bound, so a saturated ceiling still waits out the cooldown.
pub fn step(
    state: &mut LimiterState,
    config: &AdaptiveConfig,
    latency: &Ewma,
    failures: &Ewma,
    now: Instant,
) -> Adjustment {
    if let Some(last) = state.last_adjustment {
        let elapsed = now.saturating_duration_since(last);
        if elapsed < config.cooldown {
            return Adjustment::Cooldown {
                remaining: config.cooldown - elapsed,
            };
        }
    }

    let latency_ms = latency.value();
    let failure_rate = failures.value();
    let target_ms = config.target_latency.as_secs_f64() * 1000.0;

    let from = state.ceiling;
    let adjustment = if latency_ms > target_ms || failure_rate > config.max_failure_rate {
        let mut to = from.saturating_sub(config.decrease_step);
        if to < config.min_ceiling {
            to = config.min_ceiling;
        }
        debug!(from, to, latency_ms, failure_rate, "decreasing ceiling");
        Adjustment::Decreased { from, to }
    } else {
        let mut to = from.saturating_add(config.increase_step);
        if to > config.max_ceiling {
            to = config.max_ceiling;
        }
        debug!(from, to, latency_ms, failure_rate, "increasing ceiling");
        Adjustment::Increased { from, to }
    };

    if let Adjustment::Increased { to, .. } | Adjustment::Decreased { to, .. } = adjustment {
        state.ceiling = to;
    }
    state.last_adjustment = Some(now);
    adjustment
}

/// Periodically run [`step`] until shutdown is signalled.
pub(crate) async fn run_adjust_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = ticker(shared.config.adjust_interval, "adjust");
    info!(
        interval_ms = shared.config.adjust_interval.as_millis() as u64,
        "ceiling controller started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let mut state = shared.lock_state();
                let adjustment = step(
                    &mut state,
                    &shared.config,
                    &shared.latency,
                    &shared.failures,
                    now,
                );
                drop(state);

                if let Adjustment::Cooldown { remaining } = adjustment {
                    trace!(?remaining, "controller in cooldown");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("ceiling controller stopped");
}
