//! Prediction capability and the feature-vector adapter.
//!
//! The model is opaque to the pipeline: anything implementing [`Predictor`]
//! can stand behind it, from the shipped [`LinearModel`] to a deterministic
//! test double. The adapter assembles the 4-element input row, invokes the
//! model, and surfaces failure unchanged; it never inspects the output
//! (non-finite predictions are legal and absorbed by sanitization
//! downstream).

use crate::core::features::{compute_window_stats, FeatureVector};
use crate::storage::Reading;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of fields in the model input vector.
pub const FEATURE_ARITY: usize = 4;

/// Model input field names, in wire order.
pub const FEATURE_NAMES: [&str; FEATURE_ARITY] =
    ["elapsedtime", "velocity", "viscosity_ma", "velocity_std5"];

/// The opaque prediction function failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionError {
    message: String,
}

impl PredictionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PredictionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prediction failed: {}", self.message)
    }
}

impl std::error::Error for PredictionError {}

/// Narrow capability interface over the prediction model.
///
/// Implementations must be deterministic. No timeout is enforced here;
/// callers wanting bounded latency wrap the call themselves.
pub trait Predictor: Send + Sync {
    /// Predict a single scalar from one input row.
    fn predict(&self, input: [f64; FEATURE_ARITY]) -> Result<f64, PredictionError>;
}

/// Assemble the feature vector for one prediction and invoke the model.
///
/// `window` is the oldest-first window of readings preceding the point being
/// predicted; `elapsedtime` and `velocity` are the observed inputs of that
/// point itself. Model failure propagates to the caller, which owns the
/// recovery policy.
pub fn predict_with_window(
    predictor: &dyn Predictor,
    elapsedtime: f64,
    velocity: f64,
    window: &[Reading],
) -> Result<f64, PredictionError> {
    let stats = compute_window_stats(window);
    let features = FeatureVector::new(elapsedtime, velocity, stats);
    predictor.predict(features.to_array())
}

/// Failed to load a model artifact from disk.
#[derive(Debug)]
pub enum ModelLoadError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelLoadError::IoError(e) => write!(f, "IO error: {e}"),
            ModelLoadError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ModelLoadError {}

/// Linear regression model: coefficient per input field plus an intercept.
///
/// The production artifact is exported to JSON with the same shape, so the
/// file doubles as the deterministic stand-in used in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: [f64; FEATURE_ARITY],
    pub intercept: f64,
}

impl LinearModel {
    /// Load a model from a JSON artifact.
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelLoadError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ModelLoadError::ParseError(e.to_string()))
    }

    /// Fallback model predicting the window's viscosity moving average.
    ///
    /// Used when no trained artifact is available, so the pipeline stays
    /// runnable end to end.
    pub fn baseline() -> Self {
        Self {
            coefficients: [0.0, 0.0, 1.0, 0.0],
            intercept: 0.0,
        }
    }
}

impl Predictor for LinearModel {
    fn predict(&self, input: [f64; FEATURE_ARITY]) -> Result<f64, PredictionError> {
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(input.iter())
            .map(|(c, x)| c * x)
            .sum();
        Ok(dot + self.intercept)
    }
}
