//! Per-capita and rate columns derived from merged raw counts.
//!
//! Population is `pop_stay_at_home + pop_not_stay_at_home`. When it is zero,
//! negative or not finite every ratio is NaN: the row is kept, nothing panics,
//! and the number of such rows is logged as a warning.

use tracing::{debug, warn};

use crate::records::{MergedRecord, NormalizedRecord};

fn ratio(part: f64, population: f64) -> f64 {
    if population.is_finite() && population > 0.0 {
        part / population
    } else {
        f64::NAN
    }
}

pub fn normalize_record(record: &MergedRecord) -> NormalizedRecord {
    let population = record.pop_stay_at_home + record.pop_not_stay_at_home;

    NormalizedRecord {
        date: record.date,
        fips: record.fips,
        pop_stay_at_home: record.pop_stay_at_home,
        pop_not_stay_at_home: record.pop_not_stay_at_home,
        trips: record.trips,
        name: record.name.clone(),
        positive_increase: record.positive_increase,
        population,
        trips_per_capita: ratio(record.trips, population),
        at_home_percent: ratio(record.pop_stay_at_home, population),
        not_at_home_percent: ratio(record.pop_not_stay_at_home, population),
        positivity_rate: ratio(record.positive_increase, population),
    }
}

/// Adds the derived columns to every merged row.
#[tracing::instrument(skip_all, fields(rows = records.len()))]
pub fn normalize(records: &[MergedRecord]) -> Vec<NormalizedRecord> {
    let normalized: Vec<NormalizedRecord> = records.iter().map(normalize_record).collect();

    let undefined = normalized
        .iter()
        .filter(|r| !(r.population.is_finite() && r.population > 0.0))
        .count();
    if undefined > 0 {
        warn!(undefined, "Rows without a usable population, ratios set to NaN");
    }

    if let Some(first) = normalized.first() {
        debug!(?first, "Normalized head");
    }

    normalized
}

/// Recomputes the derived columns from the merged columns of already
/// normalized rows, e.g. after reading `final.csv` back.
pub fn renormalize(records: &[NormalizedRecord]) -> Vec<NormalizedRecord> {
    records.iter().map(|r| normalize_record(&r.base())).collect()
}
