//! Case-count prediction from mobility features.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::forest::Regressor;
use super::metrics::{mae, mean, rmse, rmsle, stddev};
use crate::error::{PipelineError, Result};
use crate::records::{NormalizedRecord, Prediction};

/// Model inputs, in feature-vector order. The case count and anything derived
/// from it (the positivity rate) are excluded.
pub const FEATURE_NAMES: [&str; 8] = [
    "fips",
    "pop_stay_at_home",
    "pop_not_stay_at_home",
    "trips",
    "population",
    "trips_per_capita",
    "at_home_percent",
    "not_at_home_percent",
];

pub fn features(record: &NormalizedRecord) -> Vec<f64> {
    vec![
        record.fips as f64,
        record.pop_stay_at_home,
        record.pop_not_stay_at_home,
        record.trips,
        record.population,
        record.trips_per_capita,
        record.at_home_percent,
        record.not_at_home_percent,
    ]
}

fn usable(record: &NormalizedRecord) -> bool {
    record.positive_increase.is_finite() && features(record).iter().all(|v| v.is_finite())
}

/// Rows dated before `threshold` train; rows on or after it validate.
pub fn split_by_date(
    records: &[NormalizedRecord],
    threshold: NaiveDate,
) -> (Vec<&NormalizedRecord>, Vec<&NormalizedRecord>) {
    records.iter().partition(|r| r.date < threshold)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FitMetrics {
    pub rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub rmsle: f64,
    /// Spread of the actual validation counts, the scale RMSE is read against.
    pub actual_stddev: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionRun {
    pub predictions: Vec<Prediction>,
    pub metrics: FitMetrics,
    pub train_rows: usize,
    /// Rows left out because a feature or the target was not finite.
    pub skipped_rows: usize,
}

/// Trains `model` on rows before `split_date` and predicts the rest.
#[tracing::instrument(skip(model, records), fields(rows = records.len()))]
pub fn predict_cases<R: Regressor>(
    model: &mut R,
    records: &[NormalizedRecord],
    split_date: NaiveDate,
) -> Result<PredictionRun> {
    let (train, validation) = split_by_date(records, split_date);

    let train_total = train.len();
    let validation_total = validation.len();
    let train: Vec<&NormalizedRecord> = train.into_iter().filter(|r| usable(r)).collect();
    let validation: Vec<&NormalizedRecord> =
        validation.into_iter().filter(|r| usable(r)).collect();
    let skipped_rows = (train_total - train.len()) + (validation_total - validation.len());

    if skipped_rows > 0 {
        warn!(skipped_rows, "Rows with non-finite values left out of the model");
    }
    if validation.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no validation rows on or after {split_date}"
        )));
    }

    debug!(features = ?FEATURE_NAMES, train_rows = train.len(), "Fitting model");
    let x_train: Vec<Vec<f64>> = train.iter().map(|r| features(r)).collect();
    let y_train: Vec<f64> = train.iter().map(|r| r.positive_increase).collect();
    model.fit(&x_train, &y_train)?;

    let x_val: Vec<Vec<f64>> = validation.iter().map(|r| features(r)).collect();
    let predicted = model.predict(&x_val)?;
    let actual: Vec<f64> = validation.iter().map(|r| r.positive_increase).collect();

    let metrics = FitMetrics {
        rows: actual.len(),
        rmse: rmse(&actual, &predicted),
        mae: mae(&actual, &predicted),
        rmsle: rmsle(&actual, &predicted),
        actual_stddev: stddev(&actual, mean(&actual)),
    };
    info!(
        train_rows = train.len(),
        validation_rows = metrics.rows,
        rmse = metrics.rmse,
        mae = metrics.mae,
        rmsle = metrics.rmsle,
        actual_stddev = metrics.actual_stddev,
        "Model evaluated on validation set"
    );

    let predictions = validation
        .iter()
        .zip(predicted)
        .map(|(r, prediction)| Prediction {
            date: r.date,
            fips: r.fips,
            name: r.name.clone(),
            positive_increase: r.positive_increase,
            prediction,
        })
        .collect();

    Ok(PredictionRun {
        predictions,
        metrics,
        train_rows: train.len(),
        skipped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_record;
    use crate::records::MergedRecord;

    /// Predicts the training mean.
    #[derive(Default)]
    struct MeanModel(f64);

    impl Regressor for MeanModel {
        fn fit(&mut self, _x: &[Vec<f64>], y: &[f64]) -> Result<()> {
            if y.is_empty() {
                return Err(PipelineError::EmptyDataset("training set".to_string()));
            }
            self.0 = y.iter().sum::<f64>() / y.len() as f64;
            Ok(())
        }

        fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(vec![self.0; x.len()])
        }
    }

    fn record(month: u32, day: u32, cases: f64) -> NormalizedRecord {
        normalize_record(&MergedRecord {
            date: NaiveDate::from_ymd_opt(2020, month, day).unwrap(),
            fips: 17,
            pop_stay_at_home: 100.0,
            pop_not_stay_at_home: 300.0,
            trips: 50.0,
            name: "Illinois".to_string(),
            positive_increase: cases,
        })
    }

    fn split() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 9, 1).unwrap()
    }

    #[test]
    fn test_split_by_date_threshold_goes_to_validation() {
        let records = vec![record(8, 31, 1.0), record(9, 1, 2.0), record(9, 2, 3.0)];
        let (train, validation) = split_by_date(&records, split());

        assert_eq!(train.len(), 1);
        assert_eq!(validation.len(), 2);
        assert!(validation.iter().all(|r| r.date >= split()));
    }

    #[test]
    fn test_features_exclude_target() {
        let r = record(9, 1, 999.0);
        let f = features(&r);
        assert_eq!(f.len(), FEATURE_NAMES.len());
        assert!(!f.contains(&999.0));
    }

    #[test]
    fn test_predict_cases_with_mean_model() {
        let records = vec![
            record(8, 1, 10.0),
            record(8, 2, 30.0),
            record(9, 1, 20.0),
            record(9, 2, 40.0),
        ];
        let mut model = MeanModel::default();
        let run = predict_cases(&mut model, &records, split()).unwrap();

        assert_eq!(run.train_rows, 2);
        assert_eq!(run.predictions.len(), 2);
        assert!(run.predictions.iter().all(|p| p.prediction == 20.0));
        assert_eq!(run.metrics.rows, 2);
        assert_eq!(run.metrics.mae, 10.0);
        assert_eq!(run.metrics.actual_stddev, 10.0);
    }

    #[test]
    fn test_non_finite_rows_are_skipped() {
        let mut bad = record(8, 3, 5.0);
        bad.trips_per_capita = f64::NAN;
        let records = vec![record(8, 1, 10.0), bad, record(9, 1, f64::NAN), record(9, 2, 1.0)];

        let run = predict_cases(&mut MeanModel::default(), &records, split()).unwrap();

        assert_eq!(run.skipped_rows, 2);
        assert_eq!(run.predictions.len(), 1);
    }

    #[test]
    fn test_no_validation_rows_is_error() {
        let records = vec![record(8, 1, 10.0)];
        let err = predict_cases(&mut MeanModel::default(), &records, split()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset(_)));
    }
}
