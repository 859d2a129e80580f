//! Untyped CSV table as fetched from a source.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::fmt;

use crate::error::{PipelineError, Result};

/// Column type inferred from the text of every non-empty field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Text,
    /// Every field in the column is empty.
    Empty,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
            ColumnType::Date => "date",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// Rows of text fields under an ordered header.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    /// Parses comma-separated bytes with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if a row has a different field count than the header
    /// or the bytes are not valid UTF-8.
    pub fn from_csv_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(bytes);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            rows.push(result?);
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Like [`RawTable::column_index`] but a missing column is an error.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn infer_column_type(&self, index: usize) -> ColumnType {
        let mut inferred = ColumnType::Empty;

        for row in &self.rows {
            let field = row.get(index).unwrap_or("").trim();
            if field.is_empty() {
                continue;
            }

            let field_type = infer_field_type(field);
            inferred = match (inferred, field_type) {
                (ColumnType::Empty, t) => t,
                (a, b) if a == b => a,
                (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                    ColumnType::Float
                }
                _ => return ColumnType::Text,
            };
        }

        inferred
    }

    /// Inferred type for every column, in header order.
    pub fn dtypes(&self) -> Vec<(&str, ColumnType)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), self.infer_column_type(i)))
            .collect()
    }
}

fn infer_field_type(field: &str) -> ColumnType {
    if field.parse::<i64>().is_ok() {
        ColumnType::Integer
    } else if field.parse::<f64>().is_ok() {
        ColumnType::Float
    } else if looks_like_date(field) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

fn looks_like_date(field: &str) -> bool {
    let head = field.get(..10).unwrap_or(field);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(head, "%Y/%m/%d").is_ok()
        || NaiveDate::parse_from_str(head, "%m/%d/%Y").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
level,date,state_fips,trips,note
State,2020-04-01T00:00:00.000,38,\"1,200\",a
County,2020-04-02T00:00:00.000,38,300,
National,2020-04-03T00:00:00.000,,12.5,b
";

    #[test]
    fn test_shape_and_headers() {
        let table = RawTable::from_csv_bytes("trips", SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.shape(), (3, 5));
        assert_eq!(table.column_index("trips"), Some(3));
        assert_eq!(table.column_index("missing"), None);
    }

    #[test]
    fn test_require_column_names_table() {
        let table = RawTable::from_csv_bytes("trips", SAMPLE.as_bytes()).unwrap();
        let err = table.require_column("pop_stay_at_home").unwrap_err();
        assert!(err.to_string().contains("pop_stay_at_home"));
        assert!(err.to_string().contains("trips"));
    }

    #[test]
    fn test_dtype_inference() {
        let table = RawTable::from_csv_bytes("trips", SAMPLE.as_bytes()).unwrap();
        let dtypes = table.dtypes();

        assert_eq!(dtypes[0], ("level", ColumnType::Text));
        assert_eq!(dtypes[1], ("date", ColumnType::Date));
        assert_eq!(dtypes[2], ("state_fips", ColumnType::Integer));
        // the thousands separator makes the column textual until cleaned
        assert_eq!(dtypes[3], ("trips", ColumnType::Text));
        assert_eq!(dtypes[4], ("note", ColumnType::Text));
    }

    #[test]
    fn test_mixed_int_and_float_is_float() {
        let table = RawTable::from_csv_bytes("t", b"x\n1\n2.5\n\n").unwrap();
        assert_eq!(table.infer_column_type(0), ColumnType::Float);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let result = RawTable::from_csv_bytes("bad", b"a,b\n1,2\n3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_body() {
        let table = RawTable::from_csv_bytes("empty", b"a,b\n").unwrap();
        assert_eq!(table.shape(), (0, 2));
        assert_eq!(table.infer_column_type(0), ColumnType::Empty);
    }
}
