//! Sanitization of numeric data for JSON-safe output.
//!
//! Derived statistics can legitimately go non-finite (a constant-velocity
//! window has zero variance upstream of a division, and the model itself may
//! return infinities), and JSON has no encoding for them. Every row that
//! crosses the broadcast or response boundary passes through here first:
//! non-finite values become `0.0`, everything else is untouched.

use crate::storage::Reading;

/// Replace a non-finite value (`NaN`, `+inf`, `-inf`) with `0.0`.
///
/// Finite values pass through unchanged. Total and idempotent.
pub fn sanitize_value(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Sanitize one row, preserving field order and length.
pub fn sanitize_row(row: &[f64]) -> Vec<f64> {
    row.iter().copied().map(sanitize_value).collect()
}

/// Sanitize a sequence of rows, preserving row order and per-row shape.
pub fn sanitize_rows(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter().map(|row| sanitize_row(row)).collect()
}

/// A copy of the reading with every non-finite measured field zeroed.
///
/// Id and timestamp are carried over as-is.
pub fn sanitize_reading(reading: &Reading) -> Reading {
    Reading {
        id: reading.id,
        elapsedtime: sanitize_value(reading.elapsedtime),
        velocity: sanitize_value(reading.velocity),
        density: sanitize_value(reading.density),
        viscosity: sanitize_value(reading.viscosity),
        tds: sanitize_value(reading.tds),
        mass: sanitize_value(reading.mass),
        timestamp: reading.timestamp,
    }
}
