use std::path::PathBuf;

use thiserror::Error;

pub type RoiResult<T> = Result<T, RoiError>;

#[derive(Error, Debug)]
pub enum RoiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Empty batch: {0}")]
    EmptyBatch(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("Source file not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
