//! Viscostream - streaming feature-derivation and prediction-broadcast agent.
//!
//! This library ingests a continuous stream of instrument readings, derives
//! rolling statistical features from a sliding window of recent readings,
//! produces a point prediction from those features, and pushes both raw and
//! derived data to connected observers at a fixed cadence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Viscostream                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐ │
//! │  │  Ingest  │──▶│  Store   │──▶│ Features │──▶│ Predictor │ │
//! │  │ (serial) │   │ (append) │   │ (window) │   │  (model)  │ │
//! │  └──────────┘   └──────────┘   └──────────┘   └───────────┘ │
//! │                      │                              │       │
//! │                      ▼                              ▼       │
//! │               ┌──────────────┐             ┌─────────────┐  │
//! │               │  On-Demand   │             │  Broadcast  │  │
//! │               │ POST /predict│             │   GET /ws   │  │
//! │               └──────────────┘             └─────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The broadcast path runs as an independent periodic task: every tick it
//! fetches the latest readings, computes a prediction for each one from that
//! reading's own strictly-preceding window, and publishes one sanitized
//! snapshot to all current subscribers. The on-demand path answers a single
//! request against the current trailing window. The two paths share only the
//! append-only reading store.

pub mod broadcast;
pub mod config;
pub mod core;
pub mod ingest;
pub mod ondemand;
pub mod server;
pub mod storage;

// Re-export key types at crate root for convenience
pub use broadcast::{BroadcastConfig, Broadcaster, Snapshot, PREDICTION_UNAVAILABLE};
pub use config::Config;
pub use crate::core::{
    compute_window_stats, predict_with_window, sanitize_reading, sanitize_row, sanitize_rows,
    sanitize_value, FeatureVector, LinearModel, PredictionError, Predictor, WindowStats,
};
pub use ingest::IngestWorker;
pub use ondemand::{predict_on_demand, PredictError, PredictRequest};
pub use storage::{MemoryStore, Reading, ReadingFields, ReadingStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
