use crate::access::artifact::Artifact;
use crate::extraction::error::ExtractionError;
use crate::frame::FrameError;
use crate::matching::error::MatchingError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Could not find {artifact} in the directory tree of '{root}'")]
    ArtifactNotFound { artifact: Artifact, root: PathBuf },

    #[error("Invalid search pattern for '{0}'")]
    SearchPattern(PathBuf, #[source] glob::PatternError),

    #[error("Failed to open '{0}'")]
    FileOpen(PathBuf, #[source] std::io::Error),

    #[error("Failed to read frame from '{0}'")]
    FrameRead(PathBuf, #[source] PolarsError),

    #[error("Unsupported file type '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("{0} is not a frame cache and cannot be written")]
    NotACache(Artifact),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to read air station table '{0}'")]
    AirLocationsRead(PathBuf, #[source] ExtractionError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Matching(#[from] MatchingError),
}
