//! Fixed-period tickers for the background loops.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::warn;

/// Shortest period a loop will tick at.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);

/// Build a ticker whose first tick fires one full period after now.
///
/// A zero period is raised to [`MIN_TICK`] rather than panicking.
pub(crate) fn ticker(period: Duration, name: &'static str) -> Interval {
    let period = if period < MIN_TICK {
        warn!(loop_name = name, ?period, "tick period below minimum, clamping");
        MIN_TICK
    } else {
        period
    };

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_out() {
        let start = Instant::now();
        let mut t = ticker(Duration::from_secs(1), "test");
        t.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped() {
        let mut t = ticker(Duration::ZERO, "test");
        assert_eq!(t.period(), MIN_TICK);
        t.tick().await;
        t.tick().await;
    }
}
