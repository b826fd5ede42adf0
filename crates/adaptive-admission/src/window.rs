//! Fixed-window admission counter and the ceiling it is measured against.
//!
//! Count, window start, ceiling and last-adjustment instant live in one
//! struct so a single lock covers every read and write of the tuple.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::limiter::Shared;
use crate::tick::ticker;

/// State shared by `decide`, the window reset loop and the controller.
#[derive(Debug, Clone)]
pub struct LimiterState {
    /// Ceiling at construction.
    pub(crate) base_ceiling: u32,
    /// Current admission ceiling for one window.
    pub(crate) ceiling: u32,
    /// Units admitted since the window started.
    pub(crate) admitted: u32,
    /// When the current window started.
    pub(crate) window_start: Instant,
    /// When the controller last acted; `None` until its first eligible tick.
    pub(crate) last_adjustment: Option<Instant>,
}

impl LimiterState {
    /// Create state for a fresh window starting at `now`.
    pub fn new(ceiling: u32, now: Instant) -> Self {
        Self {
            base_ceiling: ceiling,
            ceiling,
            admitted: 0,
            window_start: now,
            last_adjustment: None,
        }
    }

    /// Admit one unit if the window still has room.
    ///
    /// Returns `false` without touching the count once `admitted` has
    /// reached the ceiling.
    pub fn try_admit(&mut self) -> bool {
        if self.admitted >= self.ceiling {
            return false;
        }
        self.admitted += 1;
        true
    }

    /// Start a new window at `now`.
    pub fn reset_window(&mut self, now: Instant) {
        self.admitted = 0;
        self.window_start = now;
    }

    /// Ceiling at construction.
    pub fn base_ceiling(&self) -> u32 {
        self.base_ceiling
    }

    /// Current admission ceiling.
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Units admitted in the current window.
    pub fn admitted(&self) -> u32 {
        self.admitted
    }

    /// When the current window started.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// When the controller last adjusted, if ever.
    pub fn last_adjustment(&self) -> Option<Instant> {
        self.last_adjustment
    }
}

/// Zero the admission count once per window until shutdown is signalled.
///
/// Windows roll over on the tick, not on the first request, so an idle
/// window still resets on schedule.
pub(crate) async fn run_reset_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = ticker(shared.config.window, "window");
    debug!(
        window_ms = shared.config.window.as_millis() as u64,
        "window reset loop started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                let mut state = shared.lock_state();
                let admitted = state.admitted;
                state.reset_window(Instant::now());
                drop(state);
                trace!(admitted, "admission window reset");
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("window reset loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn admits_up_to_ceiling() {
        let mut state = LimiterState::new(2, Instant::now());
        assert!(state.try_admit());
        assert!(state.try_admit());
        assert!(!state.try_admit());
        assert_eq!(state.admitted(), 2);
    }

    #[test]
    fn rejection_leaves_count_untouched() {
        let mut state = LimiterState::new(1, Instant::now());
        assert!(state.try_admit());
        for _ in 0..10 {
            assert!(!state.try_admit());
        }
        assert_eq!(state.admitted(), 1);
    }

    #[test]
    fn zero_ceiling_rejects_everything() {
        let mut state = LimiterState::new(0, Instant::now());
        assert!(!state.try_admit());
        state.reset_window(Instant::now());
        assert!(!state.try_admit());
    }

    #[test]
    fn reset_reopens_exhausted_window() {
        let start = Instant::now();
        let mut state = LimiterState::new(1, start);
        assert!(state.try_admit());
        assert!(!state.try_admit());

        let next = start + Duration::from_secs(1);
        state.reset_window(next);
        assert_eq!(state.admitted(), 0);
        assert_eq!(state.window_start(), next);
        assert!(state.try_admit());
    }

    #[test]
    fn raised_ceiling_applies_within_window() {
        let mut state = LimiterState::new(1, Instant::now());
        assert!(state.try_admit());
        assert!(!state.try_admit());

        state.ceiling = 3;
        assert!(state.try_admit());
        assert!(state.try_admit());
        assert!(!state.try_admit());
    }

    #[test]
    fn lowered_ceiling_rejects_until_reset() {
        let mut state = LimiterState::new(5, Instant::now());
        for _ in 0..4 {
            assert!(state.try_admit());
        }
        state.ceiling = 2;
        assert!(!state.try_admit());
        assert_eq!(state.admitted(), 4);

        state.reset_window(Instant::now());
        assert!(state.try_admit());
    }

    #[test]
    fn new_state_has_no_adjustment() {
        let state = LimiterState::new(7, Instant::now());
        assert_eq!(state.base_ceiling(), 7);
        assert_eq!(state.ceiling(), 7);
        assert!(state.last_adjustment().is_none());
    }
}
