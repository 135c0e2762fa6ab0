use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The header row lacks a required column. Carries the raw column list for diagnostics.
    #[error("header is missing required columns {missing:?}; found {columns:?}")]
    Schema {
        columns: Vec<String>,
        missing: Vec<&'static str>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The underlying input failed mid-stream.
    #[error("reading input failed: {0}")]
    Io(#[from] io::Error),

    #[error("trajectory for {vehicle} has {points} points, but at least 2 are needed")]
    TooFewPoints { vehicle: String, points: usize },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}
