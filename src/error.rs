use crate::access::error::AccessError;
use crate::extraction::error::ExtractionError;
use crate::frame::FrameError;
use crate::geo::error::GeoError;
use crate::matching::error::MatchingError;
use crate::modeling::error::ModelError;
use crate::preprocessing::error::PreprocessError;
use crate::stations::error::StationsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MadridError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Matching(#[from] MatchingError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Stations(#[from] StationsError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),
}
