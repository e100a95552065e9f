//! Periodic snapshot broadcaster.
//!
//! An independently scheduled task that, on every tick, fetches the latest
//! readings, computes a prediction for each one from that reading's own
//! strictly-preceding window, and publishes one sanitized snapshot to every
//! current subscriber. Subscribers joining mid-interval receive only future
//! ticks; there is no replay.
//!
//! The tick loop never blocks the request-serving path: it holds no lock
//! and carries no sliding-window state between ticks. Every window is a
//! fresh read of the append-only store, so there is nothing to invalidate
//! at the cost of repeated queries per tick (fine at this tick rate and
//! window size).
//!
//! Fault isolation is per reading: an insufficient window or a failed model
//! call degrades that one prediction to the placeholder and never skips the
//! tick or disturbs its neighbors.

use crate::core::predictor::{predict_with_window, Predictor};
use crate::core::sanitize::{sanitize_reading, sanitize_row};
use crate::storage::{Reading, ReadingStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

/// Placeholder emitted when a reading's prediction is unavailable.
///
/// Keeps `predictions` positionally aligned with `readings` instead of
/// dropping the entry.
pub const PREDICTION_UNAVAILABLE: f64 = 0.0;

/// Capacity of the fan-out channel. A subscriber that lags further than
/// this skips ahead to the newest snapshot.
const CHANNEL_CAPACITY: usize = 16;

/// Timing and sizing knobs for the broadcast loop.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Period between ticks
    pub poll_interval: Duration,
    /// One-off delay before the first tick
    pub settle_delay: Duration,
    /// How many of the latest readings each snapshot carries
    pub batch_size: usize,
    /// Required window size for a genuine prediction
    pub window_size: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            batch_size: 5,
            window_size: 5,
        }
    }
}

/// One broadcast unit: sanitized reading rows paired with aligned
/// predictions (`predictions[i]` belongs to `data[i]`).
///
/// Constructed fresh each tick, never persisted. The raw-readings-only
/// variant is simply a snapshot whose predictions are all placeholders or
/// an empty pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sanitized positional rows, newest first
    pub data: Vec<Vec<f64>>,
    /// Per-row predictions, same order
    pub predictions: Vec<f64>,
}

/// Owns the periodic tick loop and the subscriber fan-out channel.
pub struct Broadcaster {
    store: Arc<dyn ReadingStore>,
    predictor: Arc<dyn Predictor>,
    config: BroadcastConfig,
    sender: broadcast::Sender<Snapshot>,
}

impl Broadcaster {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        predictor: Arc<dyn Predictor>,
        config: BroadcastConfig,
    ) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            store,
            predictor,
            config,
            sender,
        }
    }

    /// Subscribe to future snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.sender.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Build one snapshot from the current state of the store.
    ///
    /// Pure of time and of broadcaster state, so it is testable without a
    /// clock: feed a store, get the snapshot a tick would publish.
    pub fn build_snapshot(&self) -> Snapshot {
        let latest = self.store.fetch_latest(self.config.batch_size);

        let data: Vec<Vec<f64>> = latest.iter().map(|r| sanitize_row(&r.as_row())).collect();
        let predictions: Vec<f64> = latest.iter().map(|r| self.predict_for(r)).collect();

        Snapshot { data, predictions }
    }

    /// Predict for one reading from its own strictly-preceding window.
    fn predict_for(&self, reading: &Reading) -> f64 {
        let mut window = self.store.fetch_before(reading.id, self.config.window_size);
        if window.len() < self.config.window_size {
            return PREDICTION_UNAVAILABLE;
        }

        // Store returns newest first; statistics take oldest first.
        window.reverse();
        let window: Vec<Reading> = window.iter().map(sanitize_reading).collect();
        let clean = sanitize_reading(reading);

        match predict_with_window(
            self.predictor.as_ref(),
            clean.elapsedtime,
            clean.velocity,
            &window,
        ) {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::warn!(id = reading.id, error = %e, "emitting placeholder prediction");
                PREDICTION_UNAVAILABLE
            }
        }
    }

    /// Run the tick loop until the shutdown signal fires.
    ///
    /// Publishing to zero subscribers is not an error; the loop keeps its
    /// cadence regardless of who is listening.
    pub async fn run(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("broadcaster shutdown before first tick");
                return;
            }
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("broadcaster shutdown signal received");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    let snapshot = self.build_snapshot();
                    tracing::debug!(
                        readings = snapshot.data.len(),
                        subscribers = self.subscriber_count(),
                        "publishing snapshot"
                    );
                    // Err means no subscribers right now; the next tick retries.
                    let _ = self.sender.send(snapshot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predictor::{LinearModel, PredictionError, FEATURE_ARITY};
    use crate::storage::{MemoryStore, ReadingFields};

    fn seeded_store(count: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
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

    fn broadcaster_with(
        store: Arc<MemoryStore>,
        predictor: Arc<dyn Predictor>,
        batch_size: usize,
    ) -> Broadcaster {
        Broadcaster::new(
            store,
            predictor,
            BroadcastConfig {
                batch_size,
                window_size: 5,
                ..BroadcastConfig::default()
            },
        )
    }

    #[test]
    fn test_snapshot_alignment_and_sentinels() {
        // 6 readings, W=5, N=3: reading 6 has a full preceding window
        // {1..5}; readings 5 and 4 do not.
        let store = seeded_store(6);
        let model = LinearModel {
            coefficients: [0.0, 0.0, 1.0, 0.0],
            intercept: 0.0,
        };
        let broadcaster = broadcaster_with(store, Arc::new(model), 3);

        let snapshot = broadcaster.build_snapshot();

        assert_eq!(snapshot.data.len(), 3);
        assert_eq!(snapshot.predictions.len(), snapshot.data.len());

        // Rows are newest first: ids 6, 5, 4
        assert_eq!(snapshot.data[0][0], 6.0);
        assert_eq!(snapshot.data[1][0], 5.0);
        assert_eq!(snapshot.data[2][0], 4.0);

        // Reading 6's window is viscosities of ids 1..5: mean of {2,4,6,8,10}
        assert_eq!(snapshot.predictions[0], 6.0);
        assert_eq!(snapshot.predictions[1], PREDICTION_UNAVAILABLE);
        assert_eq!(snapshot.predictions[2], PREDICTION_UNAVAILABLE);
    }

    #[test]
    fn test_windows_are_per_reading() {
        // With 8 readings and N=3, readings 8, 7, 6 all have full windows,
        // each computed from its own preceding ids only.
        let store = seeded_store(8);
        let model = LinearModel {
            coefficients: [0.0, 0.0, 1.0, 0.0],
            intercept: 0.0,
        };
        let broadcaster = broadcaster_with(store, Arc::new(model), 3);

        let snapshot = broadcaster.build_snapshot();

        // Window of id 8 is ids 3..7 (viscosities 6..14, mean 10), of id 7
        // is ids 2..6 (mean 8), of id 6 is ids 1..5 (mean 6).
        assert_eq!(snapshot.predictions, vec![10.0, 8.0, 6.0]);
    }

    #[test]
    fn test_model_failure_degrades_single_reading() {
        struct FailAboveId7;
        impl Predictor for FailAboveId7 {
            fn predict(&self, input: [f64; FEATURE_ARITY]) -> Result<f64, PredictionError> {
                // elapsedtime mirrors the id in the seeded store
                if input[0] > 7.0 {
                    Err(PredictionError::new("bad input"))
                } else {
                    Ok(1.0)
                }
            }
        }

        let store = seeded_store(8);
        let broadcaster = broadcaster_with(store, Arc::new(FailAboveId7), 3);

        let snapshot = broadcaster.build_snapshot();
        assert_eq!(
            snapshot.predictions,
            vec![PREDICTION_UNAVAILABLE, 1.0, 1.0]
        );
    }

    #[test]
    fn test_non_finite_fields_are_sanitized() {
        let store = Arc::new(MemoryStore::new());
        for i in 1..=6 {
            store.append(ReadingFields {
                elapsedtime: i as f64,
                velocity: if i == 3 { f64::NAN } else { 1.0 },
                density: 1.0,
                viscosity: f64::INFINITY,
                tds: 0.0,
                mass: 0.0,
            });
        }
        let broadcaster = broadcaster_with(store, Arc::new(LinearModel::baseline()), 3);

        let snapshot = broadcaster.build_snapshot();

        for row in &snapshot.data {
            assert!(row.iter().all(|x| x.is_finite()));
        }
        // The NaN velocity entered the window as 0.0, so predictions stay finite too.
        assert!(snapshot.predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_empty_store_yields_empty_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = broadcaster_with(store, Arc::new(LinearModel::baseline()), 5);

        let snapshot = broadcaster.build_snapshot();
        assert!(snapshot.data.is_empty());
        assert!(snapshot.predictions.is_empty());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let store = seeded_store(1);
        let broadcaster = broadcaster_with(store, Arc::new(LinearModel::baseline()), 5);

        let json = serde_json::to_value(broadcaster.build_snapshot()).unwrap();
        assert!(json["data"].is_array());
        assert!(json["predictions"].is_array());
        assert_eq!(json["data"][0][0], 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_cadence_and_shutdown() {
        let store = seeded_store(6);
        let broadcaster = Arc::new(Broadcaster::new(
            store,
            Arc::new(LinearModel::baseline()),
            BroadcastConfig {
                poll_interval: Duration::from_secs(5),
                settle_delay: Duration::from_secs(1),
                batch_size: 3,
                window_size: 5,
            },
        ));

        let mut rx = broadcaster.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(Arc::clone(&broadcaster).run(shutdown_rx));

        // Nothing before settle delay + first interval
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        // First tick lands at t = 6s
        tokio::time::sleep(Duration::from_secs(2)).await;
        let first = rx.try_recv().expect("first snapshot");
        assert_eq!(first.data.len(), 3);

        // One more tick per interval
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_ok());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_gets_no_replay() {
        let store = seeded_store(6);
        let broadcaster = Arc::new(Broadcaster::new(
            store,
            Arc::new(LinearModel::baseline()),
            BroadcastConfig {
                poll_interval: Duration::from_secs(5),
                settle_delay: Duration::from_secs(1),
                batch_size: 3,
                window_size: 5,
            },
        ));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(Arc::clone(&broadcaster).run(shutdown_rx));

        // Two ticks pass with no one listening
        tokio::time::sleep(Duration::from_secs(12)).await;

        let mut rx = broadcaster.subscribe();
        assert!(rx.try_recv().is_err());

        // The next tick is the first thing the late subscriber sees
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_ok());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
