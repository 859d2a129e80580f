use chrono::NaiveDate;
use tracing::warn;

use super::{CleanReport, parse_count};
use crate::error::Result;
use crate::records::CovidRecord;
use crate::table::RawTable;

/// Parses a `YYYYMMDD` date. Anything else is `None`, never an error.
pub fn parse_covid_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();
    // integer columns can arrive rendered as floats
    let field = field.strip_suffix(".0").unwrap_or(field);
    NaiveDate::parse_from_str(field, "%Y%m%d").ok()
}

/// Projects the case table onto [`CovidRecord`]s.
///
/// Rows are never dropped here: a bad date becomes `None` and simply fails to
/// match during the merge.
#[tracing::instrument(skip(table), fields(table = %table.name, rows = table.shape().0))]
pub fn clean_covid(table: &RawTable) -> Result<(Vec<CovidRecord>, CleanReport)> {
    let date_idx = table.require_column("date")?;
    let state_idx = table.require_column("state")?;
    let positive_idx = table.require_column("positiveIncrease")?;

    let mut report = CleanReport::new(&table.name, table.rows().len());
    let mut records = Vec::with_capacity(table.rows().len());
    let mut missing_dates = 0usize;

    for (i, row) in table.rows().iter().enumerate() {
        let field = move |idx: usize| row.get(idx).unwrap_or("");

        let date = parse_covid_date(field(date_idx));
        if date.is_none() {
            missing_dates += 1;
        }

        records.push(CovidRecord {
            date,
            state: field(state_idx).trim().to_ascii_uppercase(),
            positive_increase: parse_count(field(positive_idx), "positiveIncrease", i + 1)?,
        });
    }

    if missing_dates > 0 {
        warn!(missing_dates, "Case rows with unparsable dates kept without a date");
    }

    report.rows_out = records.len();
    report.log();

    Ok((records, report))
}
