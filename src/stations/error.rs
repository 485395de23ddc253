use crate::frame::FrameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationsError {
    #[error("Failed to read zone table '{0}'")]
    ZoneFileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse zone table JSON")]
    ZoneJson(#[from] serde_json::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),
}
