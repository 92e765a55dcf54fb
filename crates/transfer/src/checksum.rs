use std::io::{self, Read, Write};

use crc32fast::Hasher;
use md5::{Digest, Md5};

/// Digests of one byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksums {
    /// CRC32 (IEEE polynomial).
    pub crc32: u32,
    /// MD5 digest, present only when requested.
    pub md5: Option<[u8; 16]>,
    /// Number of bytes hashed.
    pub len: u64,
}

impl Checksums {
    /// CRC32 as the decimal string sent in the `CRC32` header.
    pub fn crc32_header(&self) -> String {
        self.crc32.to_string()
    }

    /// MD5 as the lowercase hex string sent in the `Content-MD5` header.
    pub fn md5_header(&self) -> Option<String> {
        self.md5.map(hex::encode)
    }
}

// ---------------------------------------------------------------------------
// ChecksumComputer
// ---------------------------------------------------------------------------

/// Computes CRC32 and, optionally, MD5 in a single pass.
pub struct ChecksumComputer {
    crc32: Hasher,
    md5: Option<Md5>,
    len: u64,
}

impl ChecksumComputer {
    /// Creates a computer. MD5 is only computed when `with_md5` is set.
    pub fn new(with_md5: bool) -> Self {
        Self {
            crc32: Hasher::new(),
            md5: with_md5.then(Md5::new),
            len: 0,
        }
    }

    /// Feeds `data` into every active digest.
    pub fn update(&mut self, data: &[u8]) {
        self.crc32.update(data);
        if let Some(md5) = self.md5.as_mut() {
            md5.update(data);
        }
        self.len += data.len() as u64;
    }

    /// Consumes the computer and returns the digests.
    pub fn finish(self) -> Checksums {
        Checksums {
            crc32: self.crc32.finalize(),
            md5: self.md5.map(|m| m.finalize().into()),
            len: self.len,
        }
    }
}

// ---------------------------------------------------------------------------
// ChecksumWriter
// ---------------------------------------------------------------------------

/// Write adapter that hashes exactly the bytes accepted by the inner writer.
///
/// Short writes only hash the accepted prefix, so the digests always describe
/// what actually reached `inner`.
pub struct ChecksumWriter<W> {
    inner: W,
    computer: ChecksumComputer,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W, with_md5: bool) -> Self {
        Self {
            inner,
            computer: ChecksumComputer::new(with_md5),
        }
    }

    /// Returns the inner writer and the digests of everything written.
    pub fn finish(self) -> (W, Checksums) {
        (self.inner, self.computer.finish())
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.computer.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Hashes a whole reader.
pub fn checksum_reader<R: Read>(mut reader: R, with_md5: bool) -> io::Result<Checksums> {
    let mut computer = ChecksumComputer::new(with_md5);
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        computer.update(&buf[..n]);
    }
    Ok(computer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn crc32_known_vector() {
        let mut c = ChecksumComputer::new(false);
        c.update(b"123456789");
        let sums = c.finish();
        assert_eq!(sums.crc32, 0xCBF4_3926);
        assert_eq!(sums.crc32_header(), "3421780262");
        assert!(sums.md5.is_none());
        assert!(sums.md5_header().is_none());
        assert_eq!(sums.len, 9);
    }

    #[test]
    fn md5_known_vector() {
        let mut c = ChecksumComputer::new(true);
        c.update(b"hello world");
        let sums = c.finish();
        assert_eq!(
            sums.md5_header().as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
    }

    #[test]
    fn empty_input() {
        let sums = ChecksumComputer::new(true).finish();
        assert_eq!(sums.crc32, 0);
        assert_eq!(
            sums.md5_header().as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(sums.len, 0);
    }

    #[test]
    fn split_updates_match_single_update() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut whole = ChecksumComputer::new(true);
        whole.update(data);

        let mut split = ChecksumComputer::new(true);
        for chunk in data.chunks(5) {
            split.update(chunk);
        }
        assert_eq!(whole.finish(), split.finish());
    }

    #[test]
    fn writer_tees_into_inner() {
        let mut w = ChecksumWriter::new(Vec::new(), true);
        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        let (inner, sums) = w.finish();

        assert_eq!(inner, b"hello world");
        assert_eq!(sums, checksum_reader(&b"hello world"[..], true).unwrap());
    }

    /// Accepts at most 3 bytes per call.
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_hashes_only_accepted_bytes() {
        let mut w = ChecksumWriter::new(Trickle(Vec::new()), false);
        let n = w.write(b"abcdef").unwrap();
        assert_eq!(n, 3);
        let (inner, sums) = w.finish();
        assert_eq!(inner.0, b"abc");
        assert_eq!(sums, checksum_reader(&b"abc"[..], false).unwrap());
    }

    #[test]
    fn checksum_reader_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let from_file = checksum_reader(std::fs::File::open(&path).unwrap(), true).unwrap();
        let mut c = ChecksumComputer::new(true);
        c.update(&data);
        assert_eq!(from_file, c.finish());
        assert_eq!(from_file.len, 20_000);
    }
}
