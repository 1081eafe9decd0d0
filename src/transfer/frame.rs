//! File framing carried inside a fountain payload.
//!
//! A transfer payload is a UTF-8 header line terminated by `\n` followed by
//! the file body. The header is either a bare file name or
//! `name|index|total` for batches. A body that starts with [`COMPRESS_MAGIC`]
//! is zlib compressed.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;
use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::Path;

/// Marker prefixed to compressed bodies
pub const COMPRESS_MAGIC: &[u8] = b"ZLIB:";

/// Name of the stream announcing how many files a batch contains
pub const MANIFEST_NAME: &str = "__FILE_COUNT__";

/// Compressed bodies are kept only below this fraction of the original size
pub const COMPRESSION_THRESHOLD: f64 = 0.95;

/// Parsed header line of a transfer payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileHeader {
    /// File name, reduced to its final path component
    pub name: String,
    /// 1-based position inside a batch
    pub index: Option<usize>,
    /// Number of files in the batch
    pub total: Option<usize>,
}

impl FileHeader {
    /// Header for a single file
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Header for file `index` of `total`
    pub fn batch(name: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            total: Some(total),
        }
    }

    /// Header line, without the trailing newline
    pub fn line(&self) -> String {
        match (self.index, self.total) {
            (Some(index), Some(total)) => format!("{}|{}|{}", self.name, index, total),
            _ => self.name.clone(),
        }
    }

    /// Whether this header names the batch manifest
    pub fn is_manifest(&self) -> bool {
        self.name == MANIFEST_NAME
    }
}

/// Prefix `body` with the header line
pub fn build_payload(header: &FileHeader, body: &[u8]) -> Vec<u8> {
    let line = header.line();
    let mut payload = Vec::with_capacity(line.len() + 1 + body.len());
    payload.extend_from_slice(line.as_bytes());
    payload.push(b'\n');
    payload.extend_from_slice(body);
    payload
}

/// Build the manifest payload announcing `count` files
pub fn manifest_payload(count: usize) -> Vec<u8> {
    build_payload(&FileHeader::single(MANIFEST_NAME), count.to_string().as_bytes())
}

/// Split a decoded payload into its header and body.
///
/// Without a newline the whole payload is the body and the name is empty.
/// Batch fields that do not parse are ignored.
pub fn split_payload(data: &[u8]) -> (FileHeader, &[u8]) {
    let Some(newline) = data.iter().position(|&b| b == b'\n') else {
        return (FileHeader::default(), data);
    };

    let line = String::from_utf8_lossy(&data[..newline]);
    let line = line.trim();
    let body = &data[newline + 1..];

    let parts: Vec<&str> = line.split('|').collect();
    let mut header = if parts.len() >= 3 {
        FileHeader {
            name: parts[0].to_string(),
            index: parts[1].trim().parse().ok(),
            total: parts[2].trim().parse().ok(),
        }
    } else {
        FileHeader::single(line)
    };
    header.name = sanitize_name(&header.name);

    (header, body)
}

/// Keep only the final path component of a received name
fn sanitize_name(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compress `body` at level 9 when that saves at least 5%.
///
/// Returns the body unchanged otherwise.
pub fn maybe_compress(body: &[u8]) -> Cow<'_, [u8]> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    if let Err(e) = encoder.write_all(body) {
        warn!("compression failed, sending raw body: {e}");
        return Cow::Borrowed(body);
    }
    let compressed = match encoder.finish() {
        Ok(compressed) => compressed,
        Err(e) => {
            warn!("compression failed, sending raw body: {e}");
            return Cow::Borrowed(body);
        }
    };

    if (compressed.len() as f64) < body.len() as f64 * COMPRESSION_THRESHOLD {
        let mut framed = Vec::with_capacity(COMPRESS_MAGIC.len() + compressed.len());
        framed.extend_from_slice(COMPRESS_MAGIC);
        framed.extend_from_slice(&compressed);
        Cow::Owned(framed)
    } else {
        Cow::Borrowed(body)
    }
}

/// Whether `body` carries the compression marker
pub fn is_compressed(body: &[u8]) -> bool {
    body.starts_with(COMPRESS_MAGIC)
}

/// Undo [`maybe_compress`].
///
/// A marked body that fails to inflate is returned as is.
pub fn decompress(body: &[u8]) -> Cow<'_, [u8]> {
    let Some(compressed) = body.strip_prefix(COMPRESS_MAGIC) else {
        return Cow::Borrowed(body);
    };

    let mut inflated = Vec::new();
    match ZlibDecoder::new(compressed).read_to_end(&mut inflated) {
        Ok(_) => Cow::Owned(inflated),
        Err(e) => {
            warn!("decompression failed, keeping raw body: {e}");
            Cow::Borrowed(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_header() {
        let payload = build_payload(&FileHeader::single("notes.txt"), b"body");
        assert_eq!(payload, b"notes.txt\nbody");

        let (header, body) = split_payload(&payload);
        assert_eq!(header, FileHeader::single("notes.txt"));
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_batch_header() {
        let payload = build_payload(&FileHeader::batch("a.bin", 2, 5), &[0, 1, 2]);
        assert_eq!(&payload[..10], b"a.bin|2|5\n");

        let (header, body) = split_payload(&payload);
        assert_eq!(header, FileHeader::batch("a.bin", 2, 5));
        assert_eq!(body, &[0, 1, 2]);
    }

    #[test]
    fn test_bad_batch_fields_are_ignored() {
        let (header, body) = split_payload(b"a.bin|x|y\nzz");
        assert_eq!(header.name, "a.bin");
        assert_eq!(header.index, None);
        assert_eq!(header.total, None);
        assert_eq!(body, b"zz");
    }

    #[test]
    fn test_no_newline() {
        let (header, body) = split_payload(b"just bytes");
        assert_eq!(header.name, "");
        assert_eq!(body, b"just bytes");
    }

    #[test]
    fn test_body_may_contain_newlines() {
        let (header, body) = split_payload(b"f.txt\nline one\nline two\n");
        assert_eq!(header.name, "f.txt");
        assert_eq!(body, b"line one\nline two\n");
    }

    #[test]
    fn test_names_lose_directories() {
        assert_eq!(split_payload(b"../../etc/passwd\n").0.name, "passwd");
        assert_eq!(split_payload(b"C:\\temp\\x.txt\n").0.name, "x.txt");
        assert_eq!(split_payload(b"..\n").0.name, "");
        assert_eq!(split_payload(b"  spaced.txt \r\n").0.name, "spaced.txt");
    }

    #[test]
    fn test_manifest() {
        let payload = manifest_payload(3);
        let (header, body) = split_payload(&payload);
        assert!(header.is_manifest());
        assert_eq!(body, b"3");
    }

    #[test]
    fn test_compressible_body_is_compressed() {
        let body = vec![b'a'; 4_096];
        let framed = maybe_compress(&body);

        assert!(is_compressed(&framed));
        assert!(framed.len() < body.len());
        assert_eq!(decompress(&framed).as_ref(), &body[..]);
    }

    #[test]
    fn test_incompressible_body_is_kept() {
        // A short high-entropy body does not shrink
        let body: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let framed = maybe_compress(&body);

        assert!(!is_compressed(&framed));
        assert_eq!(framed.as_ref(), &body[..]);
        assert_eq!(decompress(&framed).as_ref(), &body[..]);
    }

    #[test]
    fn test_corrupt_compressed_body_is_kept() {
        let body = b"ZLIB:definitely not zlib";
        assert_eq!(decompress(body).as_ref(), &body[..]);
    }
}
