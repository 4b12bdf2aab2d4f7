use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("Remote server error: {0}")]
    Remote(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No samples decoded: {0}")]
    NoSamples(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Network and protocol failures, retried by [`crate::retry::RetryPolicy`].
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Ftp(_) | AppError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
