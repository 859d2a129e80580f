//! Error types for the pipeline library.
//!
//! Cleaning, merging and reporting fail with a typed [`PipelineError`]; the
//! HTTP plumbing and the binary work in `anyhow` and convert at the edge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to access file: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// A column every row of a source must carry is absent from the header.
    #[error("Column '{column}' not found in {table}")]
    ColumnNotFound { table: String, column: String },

    #[error("Invalid number '{value}' in column '{column}' at row {row}")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Duplicate key {key} in {table}")]
    DuplicateKey { table: String, key: String },

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Plotting failed: {0}")]
    Plot(String),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
