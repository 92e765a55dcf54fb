//! Single-file upload: multipart encoding, checksums, and the retry loop.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use capyupload_transfer::{
    ChecksumWriter, Checksums, FILE_FIELD, MultipartBody, TransferError, remote_file_name,
};
use reqwest::Url;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::transport::{Transport, UploadRequest};
use crate::types::UploadEvent;

/// Read buffer for streaming the source file into the body.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Room reserved for part headers and delimiters on top of the file size.
const MULTIPART_OVERHEAD: usize = 512;

/// Uploads one file per call. Immutable and shared by all workers.
pub struct FileUploader {
    policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    use_md5: bool,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl FileUploader {
    pub fn new(policy: RetryPolicy, transport: Arc<dyn Transport>, use_md5: bool) -> Self {
        Self {
            policy,
            transport,
            use_md5,
            events: None,
        }
    }

    /// Reports retries on `events` (non-blocking; dropped when full).
    pub fn with_events(mut self, events: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Encodes `file_path` as a multipart request for `url`.
    ///
    /// An unparseable URL or unreadable file fails here, before any send.
    ///
    /// The digests are computed over the bytes as they are written into the
    /// part, so they describe exactly what is transmitted.
    pub async fn prepare(&self, file_path: &Path, url: &str) -> Result<UploadRequest, UploadError> {
        let io_err = |source: std::io::Error| UploadError::Io {
            path: file_path.to_path_buf(),
            source,
        };

        let url = Url::parse(url).map_err(|e| UploadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let file_name = remote_file_name(file_path)?;
        let mut file = tokio::fs::File::open(file_path).await.map_err(io_err)?;
        let size_hint = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let mut body = MultipartBody::new();
        body.reserve(usize::try_from(size_hint).unwrap_or(0) + MULTIPART_OVERHEAD);
        let content_type = body.content_type();

        let mut part = body.file_part(FILE_FIELD, &file_name)?;
        let mut sink = ChecksumWriter::new(&mut part, self.use_md5);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = file.read(&mut buf).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).map_err(TransferError::from)?;
        }
        let (_, checksums) = sink.finish();

        debug!(
            path = %file_path.display(),
            file_name = %file_name,
            bytes = checksums.len,
            crc32 = checksums.crc32,
            "upload body encoded"
        );

        Ok(UploadRequest {
            url,
            content_type,
            checksums,
            body: Bytes::from(body.finish()),
        })
    }

    /// Uploads `file_path` to `url`, retrying per the policy.
    ///
    /// Local read and encoding failures return before any network attempt.
    /// On success the digests that were sent are returned.
    pub async fn upload(
        &self,
        cancel: &CancellationToken,
        file_path: &Path,
        url: &str,
    ) -> Result<Checksums, UploadError> {
        let request = self.prepare(file_path, url).await?;

        self.policy
            .send_with_retry(self.transport.as_ref(), &request, cancel, |attempt, delay, failure| {
                self.emit(UploadEvent::Retrying {
                    path: PathBuf::from(file_path),
                    attempt,
                    delay,
                    reason: failure.to_string(),
                });
            })
            .await?;

        Ok(request.checksums)
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}
