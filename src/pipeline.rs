//! One run of the analysis: fetch, clean, merge, normalize, persist, report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::clean::{CleanReport, clean_covid, clean_fips, clean_trips};
use crate::config::Config;
use crate::error::PipelineError;
use crate::fetch::{HttpClient, fetch_dataset};
use crate::merge::{MergeReport, merge};
use crate::normalize::normalize;
use crate::output::{print_head, print_json, read_records, write_records};
use crate::records::NormalizedRecord;
use crate::report::{PredictionRun, RandomForestRegressor, basic_plots, predict_cases, prediction_plot};
use crate::table::RawTable;

/// Row accounting for every stage of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub trips: CleanReport,
    pub covid: CleanReport,
    pub fips: CleanReport,
    pub merge: MergeReport,
}

/// Cleans, merges and normalizes the three raw tables.
///
/// An empty merge result is an error: every later stage would be meaningless.
pub fn process_tables(
    trips: &RawTable,
    covid: &RawTable,
    fips: &RawTable,
    config: &Config,
) -> crate::error::Result<(Vec<NormalizedRecord>, PipelineReport)> {
    let (trips, trips_report) = clean_trips(trips, config.cleaning.trips_after)?;
    print_head("trips", &trips);

    let (covid, covid_report) = clean_covid(covid)?;
    print_head("covid", &covid);

    let (fips, fips_report) = clean_fips(fips)?;

    let (merged, merge_report) = merge(&trips, &fips, &covid);
    if merged.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "merge produced no rows".to_string(),
        ));
    }

    let normalized = normalize(&merged);
    print_head("final", &normalized);

    Ok((
        normalized,
        PipelineReport {
            trips: trips_report,
            covid: covid_report,
            fips: fips_report,
            merge: merge_report,
        },
    ))
}

/// Fetches the three sources concurrently and builds `final.csv`.
#[tracing::instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub async fn build_final_table<C: HttpClient>(
    client: &C,
    config: &Config,
) -> Result<Vec<NormalizedRecord>> {
    let out = &config.output_dir;
    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;

    let sources = &config.sources;
    let (trips, covid, fips) = tokio::try_join!(
        fetch_dataset(client, &sources.trips_url, &sources.trips_name, out),
        fetch_dataset(client, &sources.covid_url, &sources.covid_name, out),
        fetch_dataset(client, &sources.fips_url, &sources.fips_name, out),
    )?;

    let (normalized, report) = process_tables(&trips, &covid, &fips, config)?;
    print_json(&report)?;

    let final_path = config.csv_path(&sources.final_name);
    write_records(&final_path, &normalized)?;

    Ok(normalized)
}

/// Reads a previously written `final.csv`.
pub fn load_final_table(config: &Config) -> Result<Vec<NormalizedRecord>> {
    let path = config.csv_path(&config.sources.final_name);
    let records: Vec<NormalizedRecord> =
        read_records(&path).with_context(|| format!("reading {}", path.display()))?;
    info!(path = %path.display(), rows = records.len(), "Loaded final table");
    Ok(records)
}

/// Draws the state charts selected by `fips` and `name`.
pub fn run_plots(
    records: &[NormalizedRecord],
    fips: u32,
    name: &str,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    Ok(basic_plots(
        records,
        fips,
        name,
        &config.output_dir,
        &config.annotation,
    )?)
}

/// Trains the forest, writes `predictions.csv` and the prediction chart.
pub fn run_prediction(
    records: &[NormalizedRecord],
    fips: u32,
    name: &str,
    config: &Config,
) -> Result<(PredictionRun, PathBuf)> {
    let mut model = RandomForestRegressor::new(&config.forest);
    let run = predict_cases(&mut model, records, config.prediction.split_date)?;
    print_json(&run.metrics)?;

    write_records(
        &config.csv_path(&config.sources.predictions_name),
        &run.predictions,
    )?;

    let plot = prediction_plot(
        &run.predictions,
        fips,
        name,
        &config.output_dir,
        &config.annotation,
    )?;

    Ok((run, plot))
}

/// The whole analysis with the state selections from `config`.
pub async fn run<C: HttpClient>(client: &C, config: &Config) -> Result<()> {
    let records = build_final_table(client, config).await?;

    run_plots(&records, config.plots.fips, &config.plots.name, config)?;
    run_prediction(
        &records,
        config.prediction.fips,
        &config.prediction.name,
        config,
    )?;

    info!(output_dir = %config.output_dir.display(), "Run complete");
    Ok(())
}
