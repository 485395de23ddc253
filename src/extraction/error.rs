use crate::frame::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed reading archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed reading archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed parsing CSV table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed parsing spreadsheet: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Spreadsheet has no worksheet")]
    EmptyWorkbook,

    #[error("Failed parsing DBF table: {0}")]
    Dbf(#[from] dbase::Error),

    #[error("None of the {0} sources yielded a location table")]
    NothingExtracted(usize),

    #[error(transparent)]
    Frame(#[from] FrameError),
}
