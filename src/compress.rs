//! Gzip helpers for full-binary artifacts.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Gzip `bytes` at the default compression level.
pub fn gzip_compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).context("gzip write failed")?;
    encoder.finish().context("gzip finish failed")
}

/// Decompress a gzip stream to completion.
pub fn gzip_decompress(reader: impl Read) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(reader)
        .read_to_end(&mut out)
        .context("gzip decompress failed")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress() {
        let payload = b"some executable bytes".repeat(64);
        let gz = gzip_compress(&payload).unwrap();
        assert_ne!(gz, payload);
        assert_eq!(gzip_decompress(&gz[..]).unwrap(), payload);
    }

    #[test]
    fn garbage_stream_errors() {
        assert!(gzip_decompress(&b"not gzip"[..]).is_err());
    }
}
