//! Typed records produced by the cleaning, merge and normalization stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic granularity of a trips row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    National,
    State,
    County,
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "national" => Ok(Level::National),
            "state" => Ok(Level::State),
            "county" => Ok(Level::County),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::National => "National",
            Level::State => "State",
            Level::County => "County",
        };
        f.write_str(s)
    }
}

/// One row of the mobility dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripsRecord {
    pub level: Level,
    pub date: NaiveDate,
    /// National rows carry no state code.
    pub state_fips: Option<u32>,
    pub pop_stay_at_home: f64,
    pub pop_not_stay_at_home: f64,
    pub trips: f64,
}

/// One row of the daily state case counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovidRecord {
    /// `None` when the source date did not parse.
    pub date: Option<NaiveDate>,
    pub state: String,
    /// Not clamped: corrections in the source can make it negative.
    pub positive_increase: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FipsRecord {
    pub fips: u32,
    pub postal: String,
    pub name: String,
}

/// A state-level day with mobility and case counts joined together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub fips: u32,
    pub pop_stay_at_home: f64,
    pub pop_not_stay_at_home: f64,
    pub trips: f64,
    pub name: String,
    #[serde(rename = "positiveIncrease")]
    pub positive_increase: f64,
}

/// A [`MergedRecord`] with per-capita and rate columns added.
///
/// Field order is the column order of `final.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub date: NaiveDate,
    pub fips: u32,
    pub pop_stay_at_home: f64,
    pub pop_not_stay_at_home: f64,
    pub trips: f64,
    pub name: String,
    #[serde(rename = "positiveIncrease")]
    pub positive_increase: f64,
    pub population: f64,
    pub trips_per_capita: f64,
    pub at_home_percent: f64,
    pub not_at_home_percent: f64,
    pub positivity_rate: f64,
}

impl NormalizedRecord {
    /// The merged columns this record was derived from.
    pub fn base(&self) -> MergedRecord {
        MergedRecord {
            date: self.date,
            fips: self.fips,
            pop_stay_at_home: self.pop_stay_at_home,
            pop_not_stay_at_home: self.pop_not_stay_at_home,
            trips: self.trips,
            name: self.name.clone(),
            positive_increase: self.positive_increase,
        }
    }
}

/// A validation row with the model's case-count estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub fips: u32,
    pub name: String,
    #[serde(rename = "positiveIncrease")]
    pub positive_increase: f64,
    pub prediction: f64,
}
