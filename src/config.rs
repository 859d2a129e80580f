//! Run configuration.
//!
//! Every value has a default matching the published datasets, so a config file
//! is optional. A partial file only overrides the keys it names:
//!
//! ```toml
//! output_dir = "out"
//!
//! [plots]
//! fips = 17
//! name = "Illinois"
//!
//! [forest]
//! n_estimators = 200
//! ```
//!
//! Dates are quoted `YYYY-MM-DD` strings.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub sources: SourcesConfig,
    pub cleaning: CleaningConfig,
    pub annotation: AnnotationConfig,
    pub plots: StateSelection,
    pub prediction: PredictionConfig,
    pub forest: ForestConfig,
}

/// Where each dataset comes from and the file name its raw copy is saved under.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub trips_url: String,
    pub trips_name: String,
    pub covid_url: String,
    pub covid_name: String,
    pub fips_url: String,
    pub fips_name: String,
    pub final_name: String,
    pub predictions_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Trips rows on or before this date are discarded.
    pub trips_after: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub date: NaiveDate,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSelection {
    pub fips: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub fips: u32,
    pub name: String,
    /// Rows before this date train the model, the rest are validation.
    pub split_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sources: SourcesConfig::default(),
            cleaning: CleaningConfig::default(),
            annotation: AnnotationConfig::default(),
            plots: StateSelection::default(),
            prediction: PredictionConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            trips_url: "https://data.bts.gov/resource/w96p-f2qv.csv?$limit=2232606".to_string(),
            trips_name: "trips".to_string(),
            covid_url: "https://api.covidtracking.com/v1/states/daily.csv".to_string(),
            covid_name: "raw_covid".to_string(),
            fips_url: "https://raw.githubusercontent.com/fitnr/addfips/master/src/addfips/data/states.csv"
                .to_string(),
            fips_name: "fips".to_string(),
            final_name: "final".to_string(),
            predictions_name: "predictions".to_string(),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            trips_after: ymd(2020, 3, 1),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            date: ymd(2020, 11, 13),
            label: "Thanksgiving Travel".to_string(),
        }
    }
}

impl Default for StateSelection {
    fn default() -> Self {
        Self {
            fips: 38,
            name: "North Dakota".to_string(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            fips: 17,
            name: "illinois".to_string(),
            split_date: ymd(2020, 9, 1),
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 0,
        }
    }
}

impl Config {
    /// Loads the config from a TOML file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Path of a CSV artifact named `name` inside the output directory.
    pub fn csv_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_published_analysis() {
        let config = Config::default();
        assert_eq!(config.plots.fips, 38);
        assert_eq!(config.prediction.fips, 17);
        assert_eq!(config.sources.covid_name, "raw_covid");
        assert_eq!(config.cleaning.trips_after, ymd(2020, 3, 1));
        assert_eq!(config.prediction.split_date, ymd(2020, 9, 1));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            output_dir = "out"

            [plots]
            fips = 17
            name = "Illinois"

            [prediction]
            split_date = "2020-10-01"

            [forest]
            n_estimators = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.plots.name, "Illinois");
        assert_eq!(config.prediction.split_date, ymd(2020, 10, 1));
        assert_eq!(config.prediction.fips, 17);
        assert_eq!(config.forest.n_estimators, 7);
        assert_eq!(config.forest.min_samples_split, 2);
        assert_eq!(config.sources.trips_name, "trips");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("output_dir = [").unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Config(_)));
    }

    #[test]
    fn test_load_without_path_returns_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.csv_path("final"), PathBuf::from("./final.csv"));
    }
}
