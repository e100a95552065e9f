//! Raw reading ingestion.
//!
//! The instrument emits one numeric value per line over its serial link,
//! six lines per reading, in field order `elapsedtime, velocity, density,
//! viscosity, tds, mass`. The worker consumes decoded lines from a channel,
//! groups them, and appends one complete reading at a time to the store.
//! A malformed line is logged and skipped; the group it belonged to simply
//! completes later.

use crate::storage::{ReadingFields, ReadingStore};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Values per reading on the serial link.
pub const GROUP_SIZE: usize = 6;

/// A serial line did not parse as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unparseable reading line: {:?}", self.line)
    }
}

impl std::error::Error for ParseError {}

/// Parse one serial line: trim whitespace and any trailing commas, then
/// read a float.
pub fn parse_reading_line(line: &str) -> Result<f64, ParseError> {
    let trimmed = line.trim().trim_end_matches(',');
    trimmed.parse().map_err(|_| ParseError {
        line: line.to_string(),
    })
}

/// Groups parsed values into readings and appends them to the store.
pub struct IngestWorker {
    store: Arc<dyn ReadingStore>,
    group: Vec<f64>,
}

impl IngestWorker {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            group: Vec::with_capacity(GROUP_SIZE),
        }
    }

    /// Feed one raw line. Returns the stored reading's id when this line
    /// completed a group.
    pub fn process_line(&mut self, line: &str) -> Option<u64> {
        match parse_reading_line(line) {
            Ok(value) => self.group.push(value),
            Err(e) => {
                tracing::warn!(error = %e, "skipping serial line");
                return None;
            }
        }

        if self.group.len() < GROUP_SIZE {
            return None;
        }

        let fields = ReadingFields {
            elapsedtime: self.group[0],
            velocity: self.group[1],
            density: self.group[2],
            viscosity: self.group[3],
            tds: self.group[4],
            mass: self.group[5],
        };
        self.group.clear();

        let id = self.store.append(fields);
        tracing::debug!(id, "stored reading");
        Some(id)
    }

    /// Consume lines until the sending side disconnects.
    pub fn run(mut self, lines: Receiver<String>) {
        for line in lines.iter() {
            self.process_line(&line);
        }
        tracing::info!("ingest channel closed");
    }
}
