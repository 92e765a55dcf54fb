//! Data types shared by the manager, the uploader and callers.

use std::path::PathBuf;
use std::time::Duration;

use capyupload_transfer::Checksums;

use crate::error::UploadError;

/// One file to upload and the endpoint receiving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub file_path: PathBuf,
    pub url: String,
}

impl UploadTask {
    pub fn new(file_path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            url: url.into(),
        }
    }
}

/// Outcome of a single task: the digests sent (including the byte count)
/// on success.
pub type UploadOutcome = Result<Checksums, UploadError>;

/// Progress event emitted by the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// A worker picked up the task.
    Started { path: PathBuf, worker: usize },
    /// An attempt failed; the next one starts after `delay`.
    Retrying {
        path: PathBuf,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The server accepted the file.
    Completed { path: PathBuf, bytes: u64 },
    /// The task ended with an error.
    Failed { path: PathBuf, error: String },
}
