//! Upload error types.

use std::fmt;
use std::path::PathBuf;

/// Errors produced while uploading a file.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The local file could not be opened or read. Never retried.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request body could not be encoded. Never retried.
    #[error("encoding error: {0}")]
    Transfer(#[from] capyupload_transfer::TransferError),

    /// The request never produced a response. Retried.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint URL does not parse. Never retried.
    #[error("invalid upload URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("upload failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: LastFailure },

    #[error("cancelled")]
    Cancelled,

    #[error("upload manager is closed")]
    Closed,

    /// A worker dropped the task without reporting an outcome.
    #[error("worker exited without reporting a result")]
    WorkerLost,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of the final attempt of an exhausted retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastFailure {
    Transport(String),
    Status(u16),
}

impl fmt::Display for LastFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status(code) => write!(f, "HTTP {code}"),
        }
    }
}
