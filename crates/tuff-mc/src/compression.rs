//! zlib compression used by the frame codec and the chunk decoders.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{ProtocolError, Result};

/// Bytes-to-bytes compression primitive.
pub trait Compressor: Send + Sync {
    /// Compress `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying encoder fails.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `data`, which must inflate to exactly `expected_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameCorrupt`] if the stream is invalid or
    /// its inflated size differs from `expected_len`.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;

    /// Decompress `data` of unknown inflated size, up to `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameCorrupt`] if the stream is invalid or
    /// inflates past `max_len`.
    fn decompress_bounded(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>>;
}

/// zlib via `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    level: Compression,
}

impl Zlib {
    /// Create a compressor with the given level (0-9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for Zlib {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let out = self.decompress_bounded(data, expected_len)?;
        if out.len() < expected_len {
            return Err(ProtocolError::FrameCorrupt(format!(
                "declared {expected_len} bytes, inflated to {}",
                out.len()
            )));
        }

        Ok(out)
    }

    fn decompress_bounded(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(max_len.min(1 << 20));
        // Read one byte past the limit so oversized streams are caught
        // without inflating them completely.
        let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
        ZlibDecoder::new(data)
            .take(limit)
            .read_to_end(&mut out)
            .map_err(|e| ProtocolError::FrameCorrupt(format!("zlib: {e}")))?;

        if out.len() > max_len {
            return Err(ProtocolError::FrameCorrupt(format!(
                "inflated past {max_len} bytes"
            )));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_roundtrip() {
        let zlib = Zlib::default();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        let compressed = zlib.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(zlib.decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_declared_length_mismatch() {
        let zlib = Zlib::new(6);
        let compressed = zlib.compress(b"sixteen bytes!!!").unwrap();
        assert!(matches!(
            zlib.decompress(&compressed, 15),
            Err(ProtocolError::FrameCorrupt(_))
        ));
        assert!(matches!(
            zlib.decompress(&compressed, 17),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(
            Zlib::default().decompress(b"not zlib at all", 10),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }
}
