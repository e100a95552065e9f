//! Reading storage collaborators.
//!
//! The pipeline never owns reading history itself; it reads from (and
//! ingestion appends to) a [`ReadingStore`]. Readings are append-only and
//! never mutated, so every fetch returns an immutable point-in-time slice
//! and the window math upstream needs no locking of its own.

pub mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped instrument record.
///
/// Created by ingestion, append-only, totally ordered by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Monotonically increasing identifier assigned by the store
    pub id: u64,
    /// Seconds since the measurement run started
    pub elapsedtime: f64,
    /// Spindle velocity
    pub velocity: f64,
    /// Fluid density
    pub density: f64,
    /// Measured viscosity
    pub viscosity: f64,
    /// Total dissolved solids
    pub tds: f64,
    /// Sample mass
    pub mass: f64,
    /// Wall-clock time the reading was stored
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Positional numeric row used by the broadcast payload:
    /// `[id, elapsedtime, velocity, density, viscosity, tds, mass]`.
    pub fn as_row(&self) -> Vec<f64> {
        vec![
            self.id as f64,
            self.elapsedtime,
            self.velocity,
            self.density,
            self.viscosity,
            self.tds,
            self.mass,
        ]
    }
}

/// The measured fields of a reading, before the store assigns id and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingFields {
    pub elapsedtime: f64,
    pub velocity: f64,
    pub density: f64,
    pub viscosity: f64,
    pub tds: f64,
    pub mass: f64,
}

/// Read/append interface the pipeline consumes.
///
/// Both query methods return readings most recent first; the caller reverses
/// when it wants the oldest-first window convention used for statistics.
pub trait ReadingStore: Send + Sync {
    /// The most recent readings, newest first, at most `n`.
    fn fetch_latest(&self, n: usize) -> Vec<Reading>;

    /// Readings with id strictly less than `id`, newest first, at most `n`.
    fn fetch_before(&self, id: u64, n: usize) -> Vec<Reading>;

    /// Append one reading, assigning the next id and a timestamp.
    /// Returns the assigned id.
    fn append(&self, fields: ReadingFields) -> u64;

    /// Total number of stored readings.
    fn len(&self) -> usize;

    /// Whether the store holds no readings.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
