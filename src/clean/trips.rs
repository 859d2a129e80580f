use chrono::{NaiveDate, NaiveDateTime};

use super::{CleanReport, parse_code, parse_count};
use crate::error::Result;
use crate::records::{Level, TripsRecord};
use crate::table::RawTable;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses the date formats seen in the mobility export.
pub fn parse_trips_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(field, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(field, fmt).ok())
        })
}

/// Projects the mobility table onto [`TripsRecord`]s dated after `after`.
///
/// Thousands separators are stripped only from the three count columns, so
/// text columns keep any commas they legitimately contain.
#[tracing::instrument(skip(table), fields(table = %table.name, rows = table.shape().0))]
pub fn clean_trips(table: &RawTable, after: NaiveDate) -> Result<(Vec<TripsRecord>, CleanReport)> {
    let level_idx = table.require_column("level")?;
    let date_idx = table.require_column("date")?;
    let fips_idx = table.require_column("state_fips")?;
    let stay_idx = table.require_column("pop_stay_at_home")?;
    let not_stay_idx = table.require_column("pop_not_stay_at_home")?;
    let trips_idx = table.require_column("trips")?;

    let mut report = CleanReport::new(&table.name, table.rows().len());
    let mut records = Vec::new();

    for (i, row) in table.rows().iter().enumerate() {
        let row_no = i + 1;
        let field = move |idx: usize| row.get(idx).unwrap_or("");

        let Some(date) = parse_trips_date(field(date_idx)) else {
            report.drop_row("unparsable date");
            continue;
        };
        if date <= after {
            report.drop_row("on or before cutoff date");
            continue;
        }

        let Ok(level) = field(level_idx).parse::<Level>() else {
            report.drop_row("unknown level");
            continue;
        };

        records.push(TripsRecord {
            level,
            date,
            state_fips: parse_code(field(fips_idx), "state_fips", row_no)?,
            pop_stay_at_home: parse_count(field(stay_idx), "pop_stay_at_home", row_no)?,
            pop_not_stay_at_home: parse_count(field(not_stay_idx), "pop_not_stay_at_home", row_no)?,
            trips: parse_count(field(trips_idx), "trips", row_no)?,
        });
    }

    report.rows_out = records.len();
    report.log();

    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    }

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_bytes("trips", csv.as_bytes()).unwrap()
    }

    const HEADER: &str =
        "level,date,state_fips,state_code,county_name,pop_stay_at_home,pop_not_stay_at_home,trips\n";

    #[test]
    fn test_parse_trips_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 4, 1);
        assert_eq!(parse_trips_date("2020-04-01T00:00:00.000"), expected);
        assert_eq!(parse_trips_date("2020-04-01"), expected);
        assert_eq!(parse_trips_date("2020/04/01"), expected);
        assert_eq!(parse_trips_date("04/01/2020"), expected);
        assert_eq!(parse_trips_date("April 1st"), None);
    }

    #[test]
    fn test_filters_on_or_before_cutoff() {
        let csv = format!(
            "{HEADER}\
State,2020-02-29T00:00:00.000,38,ND,,1,2,3
State,2020-03-01T00:00:00.000,38,ND,,1,2,3
State,2020-03-02T00:00:00.000,38,ND,,1,2,3
"
        );
        let (records, report) = clean_trips(&table(&csv), cutoff()).unwrap();

        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.date > cutoff()));
        assert_eq!(report.dropped["on or before cutoff date"], 2);
    }

    #[test]
    fn test_projects_and_parses_counts() {
        let csv = format!(
            "{HEADER}\
State,2020-04-01T00:00:00.000,38,ND,,\"300,000\",\"500,000\",\"10,000\"
"
        );
        let (records, _) = clean_trips(&table(&csv), cutoff()).unwrap();

        assert_eq!(
            records[0],
            TripsRecord {
                level: Level::State,
                date: NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
                state_fips: Some(38),
                pop_stay_at_home: 300_000.0,
                pop_not_stay_at_home: 500_000.0,
                trips: 10_000.0,
            }
        );
    }

    #[test]
    fn test_commas_in_text_columns_do_not_break_rows() {
        // county names with commas must not influence the numeric parse
        let csv = format!(
            "{HEADER}\
County,2020-04-01,17,IL,\"Cook County, IL\",1,2,3
"
        );
        let (records, _) = clean_trips(&table(&csv), cutoff()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::County);
        assert_eq!(records[0].trips, 3.0);
    }

    #[test]
    fn test_national_rows_have_no_fips() {
        let csv = format!("{HEADER}National,2020-04-01,,,,1,2,3\n");
        let (records, _) = clean_trips(&table(&csv), cutoff()).unwrap();
        assert_eq!(records[0].state_fips, None);
    }

    #[test]
    fn test_bad_date_and_level_are_dropped() {
        let csv = format!(
            "{HEADER}\
State,not a date,38,ND,,1,2,3
Zip,2020-04-01,38,ND,,1,2,3
"
        );
        let (records, report) = clean_trips(&table(&csv), cutoff()).unwrap();
        assert!(records.is_empty());
        assert_eq!(report.total_dropped(), 2);
    }

    #[test]
    fn test_missing_count_is_nan_and_text_count_errors() {
        let csv = format!("{HEADER}State,2020-04-01,38,ND,,,2,3\n");
        let (records, _) = clean_trips(&table(&csv), cutoff()).unwrap();
        assert!(records[0].pop_stay_at_home.is_nan());

        let csv = format!("{HEADER}State,2020-04-01,38,ND,,many,2,3\n");
        let err = clean_trips(&table(&csv), cutoff()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNumber { row: 1, .. }));
    }

    #[test]
    fn test_missing_column() {
        let csv = "level,date\nState,2020-04-01\n";
        let err = clean_trips(&table(csv), cutoff()).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound { .. }));
    }
}
