//! Upload body encoding: multipart/form-data framing and streaming checksums.
//!
//! Everything here is synchronous and I/O-free apart from
//! [`checksum_reader`]; callers own the file handles and feed bytes in.

mod checksum;
mod multipart;
mod naming;

pub use checksum::{ChecksumComputer, ChecksumWriter, Checksums, checksum_reader};
pub use multipart::{FilePart, MultipartBody, generate_boundary};
pub use naming::remote_file_name;

/// Form field name carrying the file content.
pub const FILE_FIELD: &str = "file";

/// Header carrying the decimal CRC32 of the file content.
pub const CRC32_HEADER: &str = "CRC32";

/// Header carrying the lowercase hex MD5 of the file content.
pub const MD5_HEADER: &str = "Content-MD5";

/// Errors produced while encoding an upload body.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("invalid field name: {0}")]
    InvalidFieldName(String),
}
