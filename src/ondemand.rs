//! On-demand prediction over the current trailing window.
//!
//! The synchronous request/response path: validate the request, take the
//! most recent stored readings as the window (the request itself is not
//! persisted), compute features with the request's own observed inputs, and
//! invoke the model. Unlike the broadcast path, every failure here
//! propagates to the caller as a structured error.

use crate::core::predictor::{predict_with_window, Predictor};
use crate::core::sanitize::sanitize_reading;
use crate::storage::{Reading, ReadingStore};
use serde::Deserialize;

/// An on-demand prediction request.
///
/// Fields are optional at the wire level so that a missing field is a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PredictRequest {
    pub elapsedtime: Option<f64>,
    pub velocity: Option<f64>,
}

/// Why an on-demand prediction could not be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    /// A required input field is missing
    Validation(String),
    /// Fewer readings stored than the window requires
    InsufficientData { have: usize, need: usize },
    /// The model failed; carries the underlying message
    Prediction(String),
}

impl std::fmt::Display for PredictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictError::Validation(field) => {
                write!(f, "missing required feature: {field}")
            }
            PredictError::InsufficientData { have, need } => {
                write!(f, "not enough data to predict: have {have}, need {need}")
            }
            PredictError::Prediction(message) => write!(f, "prediction failed: {message}"),
        }
    }
}

impl std::error::Error for PredictError {}

/// Predict for an explicit `(elapsedtime, velocity)` pair.
///
/// Validation happens before any storage access. The window is the
/// `window_size` most recent stored readings; if fewer exist the request is
/// refused rather than degraded.
pub fn predict_on_demand(
    store: &dyn ReadingStore,
    predictor: &dyn Predictor,
    window_size: usize,
    request: &PredictRequest,
) -> Result<f64, PredictError> {
    let elapsedtime = request
        .elapsedtime
        .ok_or_else(|| PredictError::Validation("elapsedtime".to_string()))?;
    let velocity = request
        .velocity
        .ok_or_else(|| PredictError::Validation("velocity".to_string()))?;

    let mut window = store.fetch_latest(window_size);
    if window.len() < window_size {
        return Err(PredictError::InsufficientData {
            have: window.len(),
            need: window_size,
        });
    }

    // Store returns newest first; statistics take oldest first.
    window.reverse();
    let window: Vec<Reading> = window.iter().map(sanitize_reading).collect();

    predict_with_window(predictor, elapsedtime, velocity, &window)
        .map_err(|e| PredictError::Prediction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predictor::{LinearModel, PredictionError, FEATURE_ARITY};
    use crate::storage::{MemoryStore, ReadingFields};

    fn seeded_store(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 1..=count {
            store.append(ReadingFields {
                elapsedtime: i as f64,
                velocity: i as f64,
                density: 1.0,
                viscosity: 2.0 * i as f64,
                tds: 0.1,
                mass: 50.0,
            });
        }
        store
    }

    fn request(elapsedtime: Option<f64>, velocity: Option<f64>) -> PredictRequest {
        PredictRequest {
            elapsedtime,
            velocity,
        }
    }

    /// A store that must never be touched.
    struct UnreachableStore;

    impl ReadingStore for UnreachableStore {
        fn fetch_latest(&self, _n: usize) -> Vec<Reading> {
            panic!("storage accessed during validation");
        }
        fn fetch_before(&self, _id: u64, _n: usize) -> Vec<Reading> {
            panic!("storage accessed during validation");
        }
        fn append(&self, _fields: ReadingFields) -> u64 {
            panic!("storage accessed during validation");
        }
        fn len(&self) -> usize {
            panic!("storage accessed during validation");
        }
    }

    #[test]
    fn test_missing_field_fails_before_storage_access() {
        let model = LinearModel::baseline();

        let err = predict_on_demand(
            &UnreachableStore,
            &model,
            5,
            &request(Some(1.0), None),
        )
        .unwrap_err();
        assert_eq!(err, PredictError::Validation("velocity".to_string()));

        let err = predict_on_demand(
            &UnreachableStore,
            &model,
            5,
            &request(None, Some(1.0)),
        )
        .unwrap_err();
        assert_eq!(err, PredictError::Validation("elapsedtime".to_string()));
    }

    #[test]
    fn test_insufficient_data() {
        let store = seeded_store(4);
        let err = predict_on_demand(
            &store,
            &LinearModel::baseline(),
            5,
            &request(Some(10.0), Some(2.0)),
        )
        .unwrap_err();
        assert_eq!(err, PredictError::InsufficientData { have: 4, need: 5 });
    }

    #[test]
    fn test_successful_prediction_uses_trailing_window() {
        let store = seeded_store(7);
        // Trailing window is ids 3..7, viscosities {6,8,10,12,14}, mean 10.
        let p = predict_on_demand(
            &store,
            &LinearModel::baseline(),
            5,
            &request(Some(10.0), Some(2.0)),
        )
        .unwrap();
        assert_eq!(p, 10.0);
    }

    #[test]
    fn test_request_inputs_feed_the_model() {
        let store = seeded_store(5);
        let pick_velocity = LinearModel {
            coefficients: [0.0, 1.0, 0.0, 0.0],
            intercept: 0.0,
        };
        let p = predict_on_demand(&store, &pick_velocity, 5, &request(Some(0.0), Some(42.5)))
            .unwrap();
        assert_eq!(p, 42.5);
    }

    #[test]
    fn test_model_failure_propagates() {
        struct FailingModel;
        impl Predictor for FailingModel {
            fn predict(&self, _input: [f64; FEATURE_ARITY]) -> Result<f64, PredictionError> {
                Err(PredictionError::new("artifact mismatch"))
            }
        }

        let store = seeded_store(5);
        let err = predict_on_demand(&store, &FailingModel, 5, &request(Some(1.0), Some(1.0)))
            .unwrap_err();
        match err {
            PredictError::Prediction(message) => assert!(message.contains("artifact mismatch")),
            other => panic!("expected Prediction error, got {other:?}"),
        }
    }
}
