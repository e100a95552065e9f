//! In-memory append-only reading store.
//!
//! The reference [`ReadingStore`] implementation. A durable engine can be
//! swapped in behind the same trait without touching the pipeline.

use crate::storage::{Reading, ReadingFields, ReadingStore};
use chrono::Utc;
use std::sync::RwLock;

/// Append-only vector of readings behind a read-write lock.
///
/// Readings are stored in id order (ids start at 1), so both fetch paths are
/// slices off the tail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tail_desc(readings: &[Reading], n: usize) -> Vec<Reading> {
        readings.iter().rev().take(n).cloned().collect()
    }
}

impl ReadingStore for MemoryStore {
    fn fetch_latest(&self, n: usize) -> Vec<Reading> {
        let readings = self.readings.read().unwrap_or_else(|e| e.into_inner());
        Self::tail_desc(&readings, n)
    }

    fn fetch_before(&self, id: u64, n: usize) -> Vec<Reading> {
        let readings = self.readings.read().unwrap_or_else(|e| e.into_inner());
        // Ids are dense and 1-based, but search by value so the store also
        // works if earlier history was truncated.
        let cut = readings.partition_point(|r| r.id < id);
        Self::tail_desc(&readings[..cut], n)
    }

    fn append(&self, fields: ReadingFields) -> u64 {
        let mut readings = self.readings.write().unwrap_or_else(|e| e.into_inner());
        let id = readings.last().map_or(1, |r| r.id + 1);
        readings.push(Reading {
            id,
            elapsedtime: fields.elapsedtime,
            velocity: fields.velocity,
            density: fields.density,
            viscosity: fields.viscosity,
            tds: fields.tds,
            mass: fields.mass,
            timestamp: Utc::now(),
        });
        id
    }

    fn len(&self) -> usize {
        self.readings.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
