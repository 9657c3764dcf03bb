//! # Pacing between poll samples.
//!
//! [`Pacing`] decides how long the [`Poller`](super::Poller) sleeps after a sample that
//! did not satisfy the condition. It is parameterized by:
//! - [`Pacing::first`] the initial pause;
//! - [`Pacing::factor`] the multiplicative growth factor;
//! - [`Pacing::max`] the cap.
//!
//! The pause after sample `n` is `first × factor^n`, clamped to `max`. With the default
//! factor of 1.0 the poller samples at a fixed interval.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use lnvisor::Pacing;
//!
//! let pacing = Pacing {
//!     first: Duration::from_millis(20),
//!     max: Duration::from_millis(500),
//!     factor: 2.0,
//! };
//!
//! assert_eq!(pacing.next(0), Duration::from_millis(20));
//! assert_eq!(pacing.next(1), Duration::from_millis(40));
//! assert_eq!(pacing.next(10), Duration::from_millis(500));
//! ```

use std::time::Duration;

/// Pause schedule between samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pacing {
    /// Pause after the first unsatisfied sample.
    pub first: Duration,
    /// Cap on any single pause.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for Pacing {
    /// Constant 20ms pacing.
    fn default() -> Self {
        Self::constant(Duration::from_millis(20))
    }
}

impl Pacing {
    /// Fixed pause of `interval` between samples.
    pub const fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
        }
    }

    /// Computes the pause after the given sample number (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}
