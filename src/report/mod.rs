//! Charts and case-count prediction built on the normalized table.

pub mod forest;
pub mod metrics;
pub mod plots;
pub mod regression;

pub use forest::{RandomForestRegressor, Regressor};
pub use plots::{basic_plots, prediction_plot};
pub use regression::{FitMetrics, PredictionRun, predict_cases};
