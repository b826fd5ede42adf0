//! Exponentially weighted moving average over a scalar signal.
//!
//! One type, instantiated once per signal stream: the limiter keeps one
//! for latency (milliseconds) and one for the 0/1 failure indicator.

use std::sync::{Mutex, PoisonError};

/// Smoothing factor used for the latency stream by default.
pub const DEFAULT_LATENCY_ALPHA: f64 = 0.3;

/// Smoothing factor used for the failure stream by default.
pub const DEFAULT_FAILURE_ALPHA: f64 = 0.2;

/// A thread-safe exponentially weighted moving average.
///
/// The first sample seeds the average exactly. Every later sample is
/// blended as `alpha * sample + (1 - alpha) * average`. Inputs are not
/// checked; negative values and zero are accepted as-is.
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    average: Mutex<Option<f64>>,
}

impl Ewma {
    /// Create an unseeded average with the given smoothing factor.
    ///
    /// `alpha` is expected in `(0, 1]`; lower values smooth harder.
    pub const fn new(alpha: f64) -> Self {
        Self {
            alpha,
            average: Mutex::new(None),
        }
    }

    /// The smoothing factor fixed at construction.
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Incorporate one observation and return the updated average.
    pub fn update(&self, sample: f64) -> f64 {
        let mut average = self.average.lock().unwrap_or_else(PoisonError::into_inner);
        let next = match *average {
            None => sample,
            Some(avg) => sample.mul_add(self.alpha, avg * (1.0 - self.alpha)),
        };
        *average = Some(next);
        next
    }

    /// Current average, or `None` before the first sample.
    pub fn average(&self) -> Option<f64> {
        *self.average.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current average, reading as `0.0` before the first sample.
    pub fn value(&self) -> f64 {
        self.average().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_reads_zero() {
        let ewma = Ewma::new(0.5);
        assert_eq!(ewma.average(), None);
        assert_eq!(ewma.value(), 0.0);
    }

    #[test]
    fn first_sample_seeds_exactly() {
        let ewma = Ewma::new(0.3);
        assert_eq!(ewma.update(42.0), 42.0);
        assert_eq!(ewma.average(), Some(42.0));
    }

    #[test]
    fn converges_on_constant_input() {
        let ewma = Ewma::new(0.5);
        ewma.update(100.0);
        ewma.update(100.0);
        ewma.update(100.0);

        let v = ewma.value();
        assert!((90.0..=110.0).contains(&v), "expected ~100, got {v}");
    }

    #[test]
    fn converges_from_a_distant_seed() {
        let ewma = Ewma::new(0.3);
        ewma.update(1000.0);
        for _ in 0..100 {
            ewma.update(10.0);
        }
        assert!((ewma.value() - 10.0).abs() < 0.01);
    }

    #[test]
    fn spike_raises_average_but_is_damped() {
        let ewma = Ewma::new(0.5);
        ewma.update(100.0);
        ewma.update(100.0);
        let before = ewma.value();

        ewma.update(300.0);
        let after = ewma.value();

        assert!(after > before);
        assert!(after - before < 300.0 - before);
        assert_eq!(after, 200.0);
    }

    #[test]
    fn blends_by_alpha() {
        let ewma = Ewma::new(0.2);
        ewma.update(0.0);
        ewma.update(1.0);
        assert!((ewma.value() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn alpha_one_tracks_last_sample() {
        let ewma = Ewma::new(1.0);
        ewma.update(5.0);
        ewma.update(-3.0);
        assert_eq!(ewma.value(), -3.0);
    }

    #[test]
    fn concurrent_updates_stay_within_sample_range() {
        let ewma = std::sync::Arc::new(Ewma::new(0.3));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ewma = ewma.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        ewma.update(if i % 2 == 0 { 10.0 } else { 20.0 });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let v = ewma.value();
        assert!((10.0..=20.0).contains(&v), "got {v}");
    }
}
