//! Admission facade: the thread-safe surface callers use.
//!
//! `AdaptiveLimiter` combines the window counter, the controller's
//! ceiling and the two estimators, and owns the background window reset
//! and controller tasks.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AdaptiveConfig;
use crate::controller::run_adjust_loop;
use crate::error::{ConfigResult, Rejected};
use crate::ewma::Ewma;
use crate::window::{run_reset_loop, LimiterState};

/// State reachable from both the facade and its background tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: AdaptiveConfig,
    pub(crate) state: Mutex<LimiterState>,
    /// Smoothed latency in milliseconds.
    pub(crate) latency: Ewma,
    /// Smoothed 0/1 failure indicator.
    pub(crate) failures: Ewma,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of a limiter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LimiterSnapshot {
    /// Ceiling the limiter was built with.
    pub base_ceiling: u32,
    /// Ceiling in force for the current window.
    pub ceiling: u32,
    /// Units admitted so far in the current window.
    pub admitted: u32,
    /// Time since the current window started, in milliseconds.
    pub window_age_ms: u64,
    /// Smoothed failure rate (0.0–1.0).
    pub failure_rate: f64,
    /// Smoothed latency in milliseconds.
    pub average_latency_ms: f64,
}

/// An adaptive, instance-local admission controller.
///
/// Call [`decide`](Self::decide) before doing a unit of work and
/// [`report`](Self::report) once it finishes. Two background tasks run
/// until [`stop`](Self::stop) or drop: one resets the admission window,
/// the other retunes the ceiling from the smoothed signals.
#[derive(Debug)]
pub struct AdaptiveLimiter {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AdaptiveLimiter {
    /// Create a limiter starting at `ceiling` admissions per window.
    ///
    /// The configuration is used as given. The initial ceiling is not
    /// clamped into the configured bounds; the first controller step
    /// does that.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(ceiling: u32, config: AdaptiveConfig) -> Self {
        let shared = Arc::new(Shared {
            latency: Ewma::new(config.latency_alpha),
            failures: Ewma::new(config.failure_alpha),
            state: Mutex::new(LimiterState::new(ceiling, Instant::now())),
            config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reset = tokio::spawn(run_reset_loop(shared.clone(), shutdown_rx.clone()));
        let adjust = tokio::spawn(run_adjust_loop(shared.clone(), shutdown_rx));

        info!(
            ceiling,
            min = shared.config.min_ceiling,
            max = shared.config.max_ceiling,
            "adaptive limiter started"
        );

        Self {
            shared,
            shutdown_tx,
            tasks: Mutex::new(vec![reset, adjust]),
        }
    }

    /// Like [`new`](Self::new), but rejects an invalid configuration first.
    pub fn try_new(ceiling: u32, config: AdaptiveConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::new(ceiling, config))
    }

    /// Admit one unit of work if the current window has room.
    ///
    /// `false` means reject now; the limiter keeps no queue.
    pub fn decide(&self) -> bool {
        self.shared.lock_state().try_admit()
    }

    /// Feed one finished unit of work into the estimators.
    ///
    /// Never touches the ceiling or the window count.
    pub fn report(&self, elapsed: Duration, failed: bool) {
        self.shared.latency.update(elapsed.as_secs_f64() * 1000.0);
        self.shared.failures.update(if failed { 1.0 } else { 0.0 });
    }

    /// Report an outcome, counting any `Err` as a failure.
    pub fn report_result<T, E>(&self, elapsed: Duration, result: &Result<T, E>) {
        self.report(elapsed, result.is_err());
    }

    /// Run `work` if admitted, timing it and reporting its outcome.
    ///
    /// When not admitted, `work` is dropped unpolled and `Rejected` is
    /// returned.
    pub async fn execute<F, T, E>(&self, work: F) -> Result<Result<T, E>, Rejected>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.decide() {
            return Err(Rejected {
                ceiling: self.current_ceiling(),
            });
        }

        let start = Instant::now();
        let outcome = work.await;
        self.report_result(start.elapsed(), &outcome);
        Ok(outcome)
    }

    /// Ceiling in force for the current window.
    pub fn current_ceiling(&self) -> u32 {
        self.shared.lock_state().ceiling()
    }

    /// Smoothed failure rate, `0.0` before any report.
    pub fn current_failure_rate(&self) -> f64 {
        self.shared.failures.value()
    }

    /// Smoothed latency, zero before any report.
    pub fn current_average_latency(&self) -> Duration {
        Duration::try_from_secs_f64(self.shared.latency.value() / 1000.0).unwrap_or_default()
    }

    /// Read ceiling, window count and both estimates together.
    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.shared.lock_state();
        LimiterSnapshot {
            base_ceiling: state.base_ceiling(),
            ceiling: state.ceiling(),
            admitted: state.admitted(),
            window_age_ms: state.window_start().elapsed().as_millis() as u64,
            failure_rate: self.shared.failures.value(),
            average_latency_ms: self.shared.latency.value(),
        }
    }

    /// The configuration the limiter was built with.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.shared.config
    }

    /// Whether shutdown has been signalled.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signal both background tasks to exit.
    ///
    /// Idempotent. Tasks observe the signal between ticks, so an update
    /// already in progress completes first. Use [`shutdown`](Self::shutdown)
    /// to also wait for them.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("adaptive limiter stopping");
        }
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.stop();

        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "limiter task ended abnormally");
            }
        }
        debug!("adaptive limiter tasks joined");
    }
}

impl Drop for AdaptiveLimiter {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
