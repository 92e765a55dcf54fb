//! HTTP transport seam.
//!
//! [`Transport`] performs exactly one send attempt. Retry, backoff and
//! cancellation live in [`RetryPolicy`](crate::RetryPolicy), so tests can
//! swap in a counting mock without a network.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use capyupload_transfer::{CRC32_HEADER, Checksums, MD5_HEADER};
use reqwest::Url;

use crate::config::UploadConfig;
use crate::error::UploadError;

/// A fully encoded upload, ready to be sent any number of times.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Parsed once when the request is prepared.
    pub url: Url,
    /// `multipart/form-data; boundary=...`
    pub content_type: String,
    /// Digests of the file content carried in the body.
    pub checksums: Checksums,
    pub body: Bytes,
}

impl UploadRequest {
    /// Headers sent with every attempt, in order.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", self.content_type.clone()),
            (CRC32_HEADER, self.checksums.crc32_header()),
        ];
        if let Some(md5) = self.checksums.md5_header() {
            headers.push((MD5_HEADER, md5));
        }
        headers
    }
}

/// Sends one upload attempt.
///
/// Returns the response status for any response the server produced, or
/// [`UploadError::Transport`] when no response arrived.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a UploadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, UploadError>> + Send + 'a>>;
}

/// [`Transport`] backed by a shared, connection-pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client honoring the configured timeouts.
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a UploadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.http.post(request.url.clone());
            for (name, value) in request.headers() {
                builder = builder.header(name, value);
            }

            let resp = builder
                .body(request.body.clone())
                .send()
                .await
                .map_err(|e| UploadError::Transport(error_chain(&e)))?;

            // The response is dropped here, releasing its connection before
            // any backoff starts.
            Ok(resp.status().as_u16())
        })
    }
}

/// Formats an error with all of its sources, `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(md5: Option<[u8; 16]>) -> UploadRequest {
        UploadRequest {
            url: Url::parse("http://127.0.0.1:1/upload").unwrap(),
            content_type: "multipart/form-data; boundary=b".into(),
            checksums: Checksums {
                crc32: 42,
                md5,
                len: 3,
            },
            body: Bytes::from_static(b"abc"),
        }
    }

    #[test]
    fn headers_without_md5() {
        let headers = request(None).headers();
        assert_eq!(
            headers,
            vec![
                ("Content-Type", "multipart/form-data; boundary=b".to_string()),
                ("CRC32", "42".to_string()),
            ]
        );
    }

    #[test]
    fn headers_with_md5() {
        let headers = request(Some([0xab; 16])).headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[2].0, "Content-MD5");
        assert_eq!(headers[2].1, "ab".repeat(16));
    }

    #[test]
    fn error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = capyupload_transfer::TransferError::Io(inner);
        assert_eq!(error_chain(&outer), "I/O error: refused: refused");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(&UploadConfig::default()).unwrap();
        // Port 1 on loopback is not listening.
        let result = transport.send(&request(None)).await;
        assert!(matches!(result, Err(UploadError::Transport(_))));
    }
}
