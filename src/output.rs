//! Diagnostic summaries and CSV persistence of pipeline tables.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::table::RawTable;

const HEAD_ROWS: usize = 5;

/// Logs the shape, first rows and inferred column types of a raw table.
pub fn print_table_summary(table: &RawTable) {
    let (rows, columns) = table.shape();
    info!(table = %table.name, rows, columns, "Table shape");

    debug!(table = %table.name, headers = ?table.headers(), "Head");
    for row in table.rows().iter().take(HEAD_ROWS) {
        debug!(table = %table.name, row = ?row.iter().collect::<Vec<_>>());
    }

    for (column, dtype) in table.dtypes() {
        debug!(table = %table.name, column, dtype = %dtype, "Column type");
    }
}

/// Logs the first rows of a typed table using Rust's debug pretty-print format.
pub fn print_head<T: Debug>(label: &str, records: &[T]) {
    info!(table = label, rows = records.len(), "Table shape");
    for record in records.iter().take(HEAD_ROWS) {
        debug!(table = label, "{:#?}", record);
    }
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes records to `path` as CSV with a header row, replacing any existing file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing CSV");

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = records.len(), "Wrote CSV");
    Ok(())
}

/// Reads every row of a CSV written by [`write_records`].
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }

    debug!(path = %path.display(), rows = rows.len(), "Read CSV");
    Ok(rows)
}
