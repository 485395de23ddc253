use crate::frame::FrameError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Required column '{0}' not found in raw table")]
    MissingColumn(String),

    #[error("Sampling point '{0}' has no magnitude code")]
    InvalidSamplingPoint(String),

    #[error("Invalid date {year}-{month}-{day} in row {row}")]
    InvalidDate {
        row: usize,
        year: String,
        month: String,
        day: String,
    },

    #[error("Grid variable '{variable}' has {found} values, expected {expected}")]
    GridShape {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}
