use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Index bytes do not parse as the expected layout
    #[error("corrupt index file {file}: {reason}")]
    Corrupt { file: String, reason: String },
    #[error("index not available")]
    NotLoaded,
    #[error("busy: {0}")]
    Busy(&'static str),
    #[error("illegal transition: {0}")]
    IllegalState(String),
    #[error("task cancelled")]
    Cancelled,
    #[error("worker thread panicked")]
    WorkerPanicked,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl IndexError {
    pub fn corrupt(file: &str, reason: impl Into<String>) -> Self {
        IndexError::Corrupt {
            file: file.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::Serialize(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
