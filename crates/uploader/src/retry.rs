//! Send loop with linear backoff.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LastFailure, UploadError};
use crate::transport::{Transport, UploadRequest};

/// Attempt budget and backoff for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; the wait after attempt `n` (0-based) is `retry_delay * (n + 1)`.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Total number of send attempts.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff after the failed attempt with the given 0-based index.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Sends `request` until a 2xx arrives or the attempt budget runs out.
    ///
    /// The token is checked before every attempt, raced against the in-flight
    /// send, and raced against each backoff wait. `on_retry` is called with
    /// the 1-based number of the next attempt before each backoff.
    ///
    /// Errors other than [`UploadError::Transport`] returned by the transport
    /// end the loop immediately.
    pub async fn send_with_retry<F>(
        &self,
        transport: &dyn Transport,
        request: &UploadRequest,
        cancel: &CancellationToken,
        mut on_retry: F,
    ) -> Result<(), UploadError>
    where
        F: FnMut(u32, Duration, &LastFailure),
    {
        let attempts = self.total_attempts();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                result = transport.send(request) => result,
            };

            let failure = match outcome {
                Ok(status) if (200..300).contains(&status) => {
                    debug!(url = %request.url, status, attempt, "upload accepted");
                    return Ok(());
                }
                Ok(status) => LastFailure::Status(status),
                Err(UploadError::Transport(msg)) => LastFailure::Transport(msg),
                Err(e) => return Err(e),
            };

            if attempt + 1 >= attempts {
                warn!(url = %request.url, attempts, last = %failure, "retries exhausted");
                return Err(UploadError::RetriesExhausted {
                    attempts,
                    last: failure,
                });
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %failure,
                "upload attempt failed, backing off"
            );
            on_retry(attempt + 1, delay, &failure);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(url = %request.url, "backoff cancelled");
                    return Err(UploadError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
