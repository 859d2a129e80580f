//! Source-specific cleaners turning a [`RawTable`](crate::table::RawTable)
//! into typed records.
//!
//! Cleaners never fail because rows were dropped; they fail only when a
//! required column is missing or a count field holds something that is not a
//! number. Every drop is counted in a [`CleanReport`].

pub mod covid;
pub mod fips;
pub mod trips;

pub use covid::clean_covid;
pub use fips::clean_fips;
pub use trips::clean_trips;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// Row accounting for one cleaner run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanReport {
    pub table: String,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Reason → number of rows discarded for it.
    pub dropped: BTreeMap<String, usize>,
}

impl CleanReport {
    pub fn new(table: &str, rows_in: usize) -> Self {
        Self {
            table: table.to_string(),
            rows_in,
            ..Default::default()
        }
    }

    pub fn drop_row(&mut self, reason: &str) {
        *self.dropped.entry(reason.to_string()).or_default() += 1;
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn log(&self) {
        info!(
            table = %self.table,
            rows_in = self.rows_in,
            rows_out = self.rows_out,
            dropped = self.total_dropped(),
            "Cleaned table"
        );
        for (reason, count) in &self.dropped {
            warn!(table = %self.table, reason = %reason, count, "Rows dropped while cleaning");
        }
    }
}

/// Parses a count field, stripping thousands separators.
///
/// An empty field is a missing count and becomes NaN. `row` is the 1-based
/// data row used in the error.
pub fn parse_count(field: &str, column: &str, row: usize) -> Result<f64> {
    let invalid = || PipelineError::InvalidNumber {
        column: column.to_string(),
        row,
        value: field.to_string(),
    };

    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }

    let cleaned = strip_thousands(trimmed).ok_or_else(invalid)?;
    cleaned.parse::<f64>().map_err(|_| invalid())
}

/// Removes thousands separators from `1,234,567.5`-style numbers.
///
/// Returns `None` when a comma is not a group separator: `1,2,3` and `12,5`
/// are rejected rather than read as 123 and 125.
fn strip_thousands(field: &str) -> Option<String> {
    if !field.contains(',') {
        return Some(field.to_string());
    }

    let (integer, fraction) = match field.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (field, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let unsigned = integer.strip_prefix(['-', '+']).unwrap_or(integer);
    let mut groups = unsigned.split(',');
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 || !lead.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    Some(field.replace(',', ""))
}

/// Parses an integer code such as a FIPS code. Empty fields are `None`.
///
/// Sources sometimes render integer columns as floats (`38.0`), which is
/// accepted when the fraction is zero.
pub fn parse_code(field: &str, column: &str, row: usize) -> Result<Option<u32>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }

    if let Ok(code) = field.parse::<u32>() {
        return Ok(Some(code));
    }

    match field.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 => Ok(Some(v as u32)),
        _ => Err(PipelineError::InvalidNumber {
            column: column.to_string(),
            row,
            value: field.to_string(),
        }),
    }
}
