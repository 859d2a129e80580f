//! Joins cleaned trips, fips and case records into one state-level daily table.
//!
//! Both joins are inner joins, so rows without a partner disappear. Each stage
//! records how many rows went unmatched on either side and logs a warning with
//! a sample of the lost keys. An unmatched row may be an expected data gap
//! (e.g. a territory without case reporting) or a key mismatch; the sample is
//! there so an operator can tell which.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::records::{CovidRecord, FipsRecord, Level, MergedRecord, TripsRecord};

const UNMATCHED_SAMPLE: usize = 5;

/// Row accounting for one inner join.
#[derive(Debug, Default, Clone, Serialize)]
pub struct JoinStage {
    pub name: String,
    pub left_rows: usize,
    pub right_rows: usize,
    pub output_rows: usize,
    pub unmatched_left: usize,
    pub unmatched_right: usize,
    /// First few distinct left-side keys that found no partner.
    pub unmatched_left_sample: Vec<String>,
}

impl JoinStage {
    fn new(name: &str, left_rows: usize, right_rows: usize) -> Self {
        Self {
            name: name.to_string(),
            left_rows,
            right_rows,
            ..Default::default()
        }
    }

    fn record_unmatched_left(&mut self, key: String) {
        self.unmatched_left += 1;
        if self.unmatched_left_sample.len() < UNMATCHED_SAMPLE
            && !self.unmatched_left_sample.contains(&key)
        {
            self.unmatched_left_sample.push(key);
        }
    }

    fn log(&self) {
        info!(
            stage = %self.name,
            left_rows = self.left_rows,
            right_rows = self.right_rows,
            output_rows = self.output_rows,
            "Join stage complete"
        );
        if self.unmatched_left > 0 || self.unmatched_right > 0 {
            warn!(
                stage = %self.name,
                unmatched_left = self.unmatched_left,
                unmatched_right = self.unmatched_right,
                sample = ?self.unmatched_left_sample,
                "Rows dropped by inner join"
            );
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MergeReport {
    pub fips_join: JoinStage,
    pub covid_join: JoinStage,
    /// Joined rows discarded because they were county or national level.
    pub non_state_rows: usize,
    /// Output rows whose (fips, date) pair was already present.
    pub duplicate_keys: usize,
    pub rows_out: usize,
}

impl MergeReport {
    /// Rows lost to either join, from the left side.
    pub fn total_unmatched(&self) -> usize {
        self.fips_join.unmatched_left + self.covid_join.unmatched_left
    }
}

#[derive(Clone, Copy)]
struct Located<'a> {
    trip: &'a TripsRecord,
    state: &'a FipsRecord,
}

/// Runs trips ⋈ fips ⋈ covid, keeps state rows and projects to [`MergedRecord`].
#[tracing::instrument(skip_all, fields(trips = trips.len(), fips = fips.len(), covid = covid.len()))]
pub fn merge(
    trips: &[TripsRecord],
    fips: &[FipsRecord],
    covid: &[CovidRecord],
) -> (Vec<MergedRecord>, MergeReport) {
    let mut report = MergeReport::default();

    let located = join_fips(trips, fips, &mut report.fips_join);
    report.fips_join.log();

    let joined = join_covid(&located, covid, &mut report.covid_join);
    report.covid_join.log();

    let mut seen: HashSet<(u32, NaiveDate)> = HashSet::new();
    let mut merged = Vec::with_capacity(joined.len());

    for (row, case) in joined {
        if row.trip.level != Level::State {
            report.non_state_rows += 1;
            continue;
        }

        if !seen.insert((row.state.fips, row.trip.date)) {
            report.duplicate_keys += 1;
        }

        merged.push(MergedRecord {
            date: row.trip.date,
            fips: row.state.fips,
            pop_stay_at_home: row.trip.pop_stay_at_home,
            pop_not_stay_at_home: row.trip.pop_not_stay_at_home,
            trips: row.trip.trips,
            name: row.state.name.clone(),
            positive_increase: case.positive_increase,
        });
    }

    report.rows_out = merged.len();

    info!(
        rows_out = report.rows_out,
        non_state_rows = report.non_state_rows,
        "Merged table built"
    );
    if report.duplicate_keys > 0 {
        warn!(
            duplicate_keys = report.duplicate_keys,
            "Merged table has repeated (state, date) pairs"
        );
    }

    (merged, report)
}

fn join_fips<'a>(
    trips: &'a [TripsRecord],
    fips: &'a [FipsRecord],
    stage: &mut JoinStage,
) -> Vec<Located<'a>> {
    *stage = JoinStage::new("trips x fips", trips.len(), fips.len());

    let index: HashMap<u32, &FipsRecord> = fips.iter().map(|f| (f.fips, f)).collect();
    let mut used: HashSet<u32> = HashSet::new();
    let mut out = Vec::with_capacity(trips.len());

    for trip in trips {
        match trip.state_fips.and_then(|code| index.get(&code).copied()) {
            Some(state) => {
                used.insert(state.fips);
                out.push(Located { trip, state });
            }
            None => {
                let key = match trip.state_fips {
                    Some(code) => format!("state_fips={code}"),
                    None => format!("state_fips=<none> level={}", trip.level),
                };
                stage.record_unmatched_left(key);
            }
        }
    }

    stage.output_rows = out.len();
    stage.unmatched_right = fips.len() - used.len();
    out
}

fn join_covid<'a>(
    located: &[Located<'a>],
    covid: &'a [CovidRecord],
    stage: &mut JoinStage,
) -> Vec<(Located<'a>, &'a CovidRecord)> {
    *stage = JoinStage::new("trips x covid", located.len(), covid.len());

    // undated case rows can never match and count as unmatched right rows
    let mut index: HashMap<(&str, NaiveDate), Vec<usize>> = HashMap::new();
    for (i, case) in covid.iter().enumerate() {
        if let Some(date) = case.date {
            index.entry((case.state.as_str(), date)).or_default().push(i);
        }
    }

    let mut used = vec![false; covid.len()];
    let mut out = Vec::with_capacity(located.len());

    for row in located {
        match index.get(&(row.state.postal.as_str(), row.trip.date)) {
            Some(matches) => {
                for &i in matches {
                    used[i] = true;
                    out.push((*row, &covid[i]));
                }
            }
            None => stage.record_unmatched_left(format!("{} {}", row.state.postal, row.trip.date)),
        }
    }

    stage.output_rows = out.len();
    stage.unmatched_right = used.iter().filter(|u| !**u).count();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, d).unwrap()
    }

    fn trip(level: Level, fips: Option<u32>, d: u32) -> TripsRecord {
        TripsRecord {
            level,
            date: date(d),
            state_fips: fips,
            pop_stay_at_home: 300_000.0,
            pop_not_stay_at_home: 500_000.0,
            trips: 10_000.0,
        }
    }

    fn case(state: &str, d: Option<u32>, positive: f64) -> CovidRecord {
        CovidRecord {
            date: d.map(date),
            state: state.to_string(),
            positive_increase: positive,
        }
    }

    fn states() -> Vec<FipsRecord> {
        vec![
            FipsRecord {
                fips: 38,
                postal: "ND".to_string(),
                name: "North Dakota".to_string(),
            },
            FipsRecord {
                fips: 17,
                postal: "IL".to_string(),
                name: "Illinois".to_string(),
            },
        ]
    }

    #[test]
    fn test_merges_matching_state_row() {
        let trips = vec![trip(Level::State, Some(38), 1)];
        let covid = vec![case("ND", Some(1), 20.0)];

        let (merged, report) = merge(&trips, &states(), &covid);

        assert_eq!(
            merged,
            vec![MergedRecord {
                date: date(1),
                fips: 38,
                pop_stay_at_home: 300_000.0,
                pop_not_stay_at_home: 500_000.0,
                trips: 10_000.0,
                name: "North Dakota".to_string(),
                positive_increase: 20.0,
            }]
        );
        assert_eq!(report.rows_out, 1);
        assert_eq!(report.total_unmatched(), 0);
        assert_eq!(report.fips_join.unmatched_right, 1); // IL never used
    }

    #[test]
    fn test_trip_without_case_row_is_dropped_and_counted() {
        let trips = vec![
            trip(Level::State, Some(38), 1),
            trip(Level::State, Some(38), 2),
        ];
        let covid = vec![case("ND", Some(1), 20.0)];

        let (merged, report) = merge(&trips, &states(), &covid);

        assert_eq!(merged.len(), 1);
        assert!(merged.len() < trips.len());
        assert_eq!(report.covid_join.unmatched_left, 1);
        assert_eq!(report.covid_join.unmatched_left_sample, vec!["ND 2020-04-02"]);
    }

    #[test]
    fn test_non_state_levels_filtered_after_join() {
        let trips = vec![
            trip(Level::State, Some(38), 1),
            trip(Level::County, Some(38), 1),
            trip(Level::National, None, 1),
        ];
        let covid = vec![case("ND", Some(1), 20.0)];

        let (merged, report) = merge(&trips, &states(), &covid);

        assert_eq!(merged.len(), 1);
        assert_eq!(report.non_state_rows, 1);
        assert_eq!(report.fips_join.unmatched_left, 1);
        assert_eq!(report.duplicate_keys, 0);
    }

    #[test]
    fn test_every_output_row_has_both_partners() {
        let trips = vec![
            trip(Level::State, Some(38), 1),
            trip(Level::State, Some(17), 1),
            trip(Level::State, Some(72), 1),
        ];
        let covid = vec![
            case("ND", Some(1), 20.0),
            case("IL", Some(2), 5.0),
            case("IL", None, 1.0),
        ];
        let fips = states();

        let (merged, report) = merge(&trips, &fips, &covid);

        for row in &merged {
            let state = fips.iter().find(|f| f.fips == row.fips).unwrap();
            assert!(
                covid
                    .iter()
                    .any(|c| c.state == state.postal && c.date == Some(row.date))
            );
        }
        assert_eq!(merged.len(), 1);
        assert_eq!(report.fips_join.unmatched_left_sample, vec!["state_fips=72"]);
        assert_eq!(report.covid_join.unmatched_right, 2);
    }

    #[test]
    fn test_postal_codes_must_match_exactly() {
        let trips = vec![trip(Level::State, Some(38), 1)];
        let covid = vec![case("nd", Some(1), 20.0)];

        let (merged, report) = merge(&trips, &states(), &covid);

        assert!(merged.is_empty());
        assert_eq!(report.covid_join.unmatched_left, 1);
    }

    #[test]
    fn test_duplicate_state_days_are_reported() {
        let trips = vec![
            trip(Level::State, Some(38), 1),
            trip(Level::State, Some(38), 1),
        ];
        let covid = vec![case("ND", Some(1), 20.0)];

        let (merged, report) = merge(&trips, &states(), &covid);

        assert_eq!(merged.len(), 2);
        assert_eq!(report.duplicate_keys, 1);
    }
}
