use crate::frame::FrameError;
use crate::geo::error::GeoError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Invalid input frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Failed weighting nearby traffic: {0}")]
    Geo(#[from] GeoError),

    #[error("Failed joining frames: {0}")]
    Polars(#[from] PolarsError),
}
