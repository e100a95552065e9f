//! Window statistics over recent readings.
//!
//! The model consumes two derived features alongside the observed inputs: a
//! moving average of viscosity and the population standard deviation of
//! velocity, both computed over the window of readings that precede the
//! point being predicted.
//!
//! Window convention: slices handed to this module are **oldest first**. The
//! mean and population standard deviation are order-insensitive, but fixing
//! the direction here keeps the door open for order-sensitive statistics
//! later.

use crate::storage::Reading;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Derived statistics for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Arithmetic mean of viscosity across the window
    pub viscosity_ma: f64,
    /// Population standard deviation (divisor = count) of velocity
    pub velocity_std5: f64,
}

/// The 4-field input consumed by the prediction model, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub elapsedtime: f64,
    pub velocity: f64,
    pub viscosity_ma: f64,
    pub velocity_std5: f64,
}

impl FeatureVector {
    /// Assemble a feature vector from observed inputs and window statistics.
    pub fn new(elapsedtime: f64, velocity: f64, stats: WindowStats) -> Self {
        Self {
            elapsedtime,
            velocity,
            viscosity_ma: stats.viscosity_ma,
            velocity_std5: stats.velocity_std5,
        }
    }

    /// The model input row `[elapsedtime, velocity, viscosity_ma, velocity_std5]`.
    pub fn to_array(self) -> [f64; 4] {
        [
            self.elapsedtime,
            self.velocity,
            self.viscosity_ma,
            self.velocity_std5,
        ]
    }
}

/// Compute window statistics from an oldest-first window of readings.
///
/// Callers guard window sufficiency; this function only requires a non-empty
/// window. A single-reading window is well-defined: its standard deviation
/// is exactly `0.0`.
pub fn compute_window_stats(window: &[Reading]) -> WindowStats {
    debug_assert!(!window.is_empty(), "window statistics need at least one reading");

    let viscosity_ma = window.iter().map(|r| r.viscosity).mean();
    let velocity_std5 = window.iter().map(|r| r.velocity).population_std_dev();

    WindowStats {
        viscosity_ma,
        velocity_std5,
    }
}
