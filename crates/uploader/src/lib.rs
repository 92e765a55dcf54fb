//! Concurrent HTTP file uploads.
//!
//! This crate implements the upload core: a fixed pool of workers fed by
//! a rendezvous queue, the per-file multipart upload with CRC32/MD5
//! headers, and a linear-backoff retry loop. Callers submit ordered
//! batches of [`UploadTask`]s and get back index-aligned outcomes carrying
//! the [`Checksums`] of every accepted file.
//!
//! # Pipeline
//!
//! 1. **Dispatch**: each task waits for an idle worker or batch cancellation
//! 2. **Encode**: the worker streams the file into a multipart body,
//!    hashing the bytes on the way
//! 3. **Send**: the body is POSTed, retried with linear backoff on
//!    transport errors and non-2xx statuses
//! 4. **Report**: the outcome goes back through the task's result slot

pub mod config;
pub mod error;
pub mod manager;
pub mod retry;
pub mod transport;
pub mod types;
pub mod uploader;

// Re-export primary types for convenience.
pub use capyupload_transfer::Checksums;
pub use config::UploadConfig;
pub use error::{LastFailure, UploadError};
pub use manager::UploadManager;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, UploadRequest};
pub use types::{UploadEvent, UploadOutcome, UploadTask};
pub use uploader::FileUploader;
