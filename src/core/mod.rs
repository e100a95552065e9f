//! Core pipeline functionality.
//!
//! This module contains:
//! - Sanitization of numeric rows for JSON-safe output
//! - Window statistics (moving average, population standard deviation)
//! - The predictor capability trait and the feature-vector adapter

pub mod features;
pub mod predictor;
pub mod sanitize;

// Re-export commonly used types
pub use features::{compute_window_stats, FeatureVector, WindowStats};
pub use predictor::{
    predict_with_window, LinearModel, ModelLoadError, PredictionError, Predictor, FEATURE_ARITY,
    FEATURE_NAMES,
};
pub use sanitize::{sanitize_reading, sanitize_row, sanitize_rows, sanitize_value};
