use thiserror::Error as ThisError;

/// Errors that can occur in the logging pipeline
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Service lifecycle operation failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// The rotation engine has no open log file to write to.
    #[error("no log file is set")]
    LogFileNotSet,
    /// A dedup record with the same id already exists.
    #[error("record id collision")]
    RecordCollision,
    /// Remote backend rejected or failed a push.
    #[cfg(feature = "remote")]
    #[error("remote push error: {0}")]
    Remote(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
