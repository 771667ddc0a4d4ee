use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Network failure, upstream outage, or an upstream payload we cannot read.
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    /// Malformed or non-trading date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A bhavcopy row missing a required field. `line` is 1-based and counts the header.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::DataSourceUnavailable(e.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(e: zip::result::ZipError) -> Self {
        AppError::DataSourceUnavailable(format!("bhavcopy archive unreadable: {e}"))
    }
}
