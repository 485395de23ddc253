use crate::frame::FrameError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}
