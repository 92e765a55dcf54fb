//! In-memory `multipart/form-data` encoder.
//!
//! Layout follows RFC 7578: every part opens with `--boundary`, carries its
//! own headers, and the body closes with `--boundary--`. The body is fully
//! buffered so it can be resent verbatim on retry.

use std::io::{self, Write};

use rand::Rng;

use crate::TransferError;

/// Random bytes in a generated boundary (60 hex characters).
const BOUNDARY_BYTES: usize = 30;

/// RFC 2046 limit on boundary length.
const MAX_BOUNDARY_LEN: usize = 70;

/// Generates a random boundary as a lowercase hex string.
pub fn generate_boundary() -> String {
    let mut bytes = [0u8; BOUNDARY_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// A buffered multipart body under construction.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    /// Creates a body with a random boundary.
    pub fn new() -> Self {
        Self {
            boundary: generate_boundary(),
            buf: Vec::new(),
            parts: 0,
        }
    }

    /// Creates a body with a caller-chosen boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Result<Self, TransferError> {
        let boundary = boundary.into();
        validate_boundary(&boundary)?;
        Ok(Self {
            boundary,
            buf: Vec::new(),
            parts: 0,
        })
    }

    /// Reserves room for `additional` more bytes of part content.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        if self.boundary.chars().all(is_token_char) {
            format!("multipart/form-data; boundary={}", self.boundary)
        } else {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        }
    }

    /// Opens a file part and returns a writer for its content.
    ///
    /// The part stays open until the returned [`FilePart`] is dropped; the
    /// next call to `file_part` or [`finish`](Self::finish) delimits it.
    pub fn file_part(
        &mut self,
        field: &str,
        file_name: &str,
    ) -> Result<FilePart<'_>, TransferError> {
        if field.is_empty() || has_line_break(field) {
            return Err(TransferError::InvalidFieldName(field.escape_debug().to_string()));
        }
        if file_name.is_empty() || has_line_break(file_name) {
            return Err(TransferError::InvalidFileName(
                file_name.escape_debug().to_string(),
            ));
        }

        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.parts += 1;

        let header = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\
             \r\n",
            boundary = self.boundary,
            field = escape_quotes(field),
            file_name = escape_quotes(file_name),
        );
        self.buf.extend_from_slice(header.as_bytes());

        Ok(FilePart { buf: &mut self.buf })
    }

    /// Writes the closing delimiter and returns the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"\r\n--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }
}

/// Writer for the content of one open part.
pub struct FilePart<'a> {
    buf: &'a mut Vec<u8>,
}

impl Write for FilePart<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn validate_boundary(boundary: &str) -> Result<(), TransferError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(TransferError::InvalidBoundary(format!(
            "length must be 1..={MAX_BOUNDARY_LEN}, got {}",
            boundary.len()
        )));
    }
    if boundary.ends_with(' ') {
        return Err(TransferError::InvalidBoundary(
            "must not end with a space".into(),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c);
    if let Some(bad) = boundary.chars().find(|&c| !allowed(c)) {
        return Err(TransferError::InvalidBoundary(format!(
            "character {bad:?} not allowed"
        )));
    }
    Ok(())
}

/// RFC 2045 token characters (no quoting needed).
fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_boundary_is_hex() {
        let b = generate_boundary();
        assert_eq!(b.len(), BOUNDARY_BYTES * 2);
        assert!(b.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(b, generate_boundary());
    }

    #[test]
    fn single_file_part_layout() {
        let mut body = MultipartBody::with_boundary("xyz").unwrap();
        {
            let mut part = body.file_part("file", "report.txt").unwrap();
            part.write_all(b"hello").unwrap();
        }
        let encoded = String::from_utf8(body.finish()).unwrap();

        assert_eq!(
            encoded,
            "--xyz\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"report.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\
             \r\n\
             hello\r\n\
             --xyz--\r\n"
        );
    }

    #[test]
    fn second_part_is_delimited() {
        let mut body = MultipartBody::with_boundary("b").unwrap();
        body.file_part("a", "a.bin").unwrap().write_all(b"1").unwrap();
        body.file_part("b", "b.bin").unwrap().write_all(b"2").unwrap();
        let encoded = String::from_utf8(body.finish()).unwrap();

        assert!(encoded.contains("1\r\n--b\r\nContent-Disposition: form-data; name=\"b\""));
        assert!(encoded.ends_with("2\r\n--b--\r\n"));
    }

    #[test]
    fn content_type_carries_boundary() {
        let body = MultipartBody::with_boundary("abc123").unwrap();
        assert_eq!(body.content_type(), "multipart/form-data; boundary=abc123");

        let body = MultipartBody::with_boundary("a:b").unwrap();
        assert_eq!(body.content_type(), "multipart/form-data; boundary=\"a:b\"");
    }

    #[test]
    fn file_name_quotes_are_escaped() {
        let mut body = MultipartBody::with_boundary("b").unwrap();
        body.file_part("file", "we\"ird\\name").unwrap();
        let encoded = String::from_utf8(body.finish()).unwrap();
        assert!(encoded.contains("filename=\"we\\\"ird\\\\name\""));
    }

    #[test]
    fn rejects_header_injection() {
        let mut body = MultipartBody::new();
        assert!(matches!(
            body.file_part("file", "evil\r\nX-Injected: 1"),
            Err(TransferError::InvalidFileName(_))
        ));
        assert!(matches!(
            body.file_part("fi\nle", "ok.txt"),
            Err(TransferError::InvalidFieldName(_))
        ));
        assert!(matches!(
            body.file_part("file", ""),
            Err(TransferError::InvalidFileName(_))
        ));
    }

    #[test]
    fn rejects_bad_boundaries() {
        assert!(MultipartBody::with_boundary("").is_err());
        assert!(MultipartBody::with_boundary("x".repeat(71)).is_err());
        assert!(MultipartBody::with_boundary("trailing ").is_err());
        assert!(MultipartBody::with_boundary("semi;colon").is_err());
        assert!(MultipartBody::with_boundary("x".repeat(70)).is_ok());
    }

    #[test]
    fn empty_content_is_valid() {
        let mut body = MultipartBody::with_boundary("b").unwrap();
        drop(body.file_part("file", "empty.txt").unwrap());
        let encoded = String::from_utf8(body.finish()).unwrap();
        assert!(encoded.ends_with("\r\n\r\n\r\n--b--\r\n"));
    }
}
