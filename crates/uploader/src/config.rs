//! Upload manager configuration.

use std::time::Duration;

use crate::error::UploadError;

/// Configuration for an [`UploadManager`](crate::UploadManager).
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    /// Number of concurrent upload workers.
    pub workers: usize,
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Base backoff; attempt `n` (0-based) waits `retry_delay * (n + 1)`.
    pub retry_delay: Duration,
    /// Compute and send `Content-MD5` in addition to `CRC32`.
    pub use_md5: bool,
    /// Timeout for a single HTTP attempt. `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Timeout for establishing a TCP connection.
    pub connect_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            use_md5: true,
            request_timeout: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl UploadConfig {
    /// Checks invariants the manager relies on.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.workers == 0 {
            return Err(UploadError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(UploadError::InvalidConfig(
                "request_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
