use crate::frame::FrameError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("No data for {0}")]
    NoData(String),

    #[error("Need at least {needed} observations, found {found}")]
    NotEnoughData { needed: usize, found: usize },

    #[error("Series contains missing values")]
    MissingValues,

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Least-squares system is singular")]
    Singular,

    #[error("Model predicted {found} values for {expected} dates")]
    PredictionLength { expected: usize, found: usize },

    #[error("Regressor '{0}' is not available for every forecast date")]
    MissingRegressor(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}
