//! Per-record compression adapters.
//!
//! Each frame record is compressed on its own, so a container can be decoded
//! one frame at a time without buffering the whole stream.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use super::format::MAX_PREALLOC;
use crate::schema::ConfigError;

/// Compressor used for frame payloads. Not recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    /// zlib stream (deflate with adler32 trailer).
    #[default]
    Zlib,
    /// LZ4 block with prepended size.
    Lz4,
}

impl CompressionType {
    /// Whether support for this compressor is compiled in.
    pub fn is_available(self) -> bool {
        match self {
            CompressionType::Zlib => true,
            CompressionType::Lz4 => cfg!(feature = "lz4"),
        }
    }

    /// Build the adapter. `level` only applies to zlib.
    pub fn compressor(self, level: u32) -> Result<Box<dyn Compressor>, ConfigError> {
        match self {
            CompressionType::Zlib => Ok(Box::new(ZlibCompressor::new(level))),
            #[cfg(feature = "lz4")]
            CompressionType::Lz4 => Ok(Box::new(Lz4Compressor)),
            #[cfg(not(feature = "lz4"))]
            CompressionType::Lz4 => Err(ConfigError::CompressionUnavailable(self)),
        }
    }
}

/// A lossless byte-stream codec. `decompress` must exactly invert `compress`.
pub trait Compressor: Send + Sync {
    fn kind(&self) -> CompressionType;

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress `data`. Output may stop shortly past `expected_len`; the
    /// caller treats any length other than `expected_len` as an error.
    fn decompress(&self, data: &[u8], expected_len: usize) -> io::Result<Vec<u8>>;
}

/// zlib adapter, byte-compatible with `zlib.compress` output.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: Compression,
}

impl ZlibCompressor {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for ZlibCompressor {
    fn kind(&self) -> CompressionType {
        CompressionType::Zlib
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 64), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        // expected_len comes from the header and is untrusted.
        let mut out = Vec::with_capacity(expected_len.min(MAX_PREALLOC));
        ZlibDecoder::new(data)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut out)?;
        Ok(out)
    }
}

/// LZ4 adapter.
#[cfg(feature = "lz4")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4")]
impl Compressor for Lz4Compressor {
    fn kind(&self) -> CompressionType {
        CompressionType::Lz4
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        // The size prefix is untrusted; check it before allocating.
        let declared = data
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "LZ4 block too short"))?;
        if declared != expected_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("LZ4 block declares {} bytes, expected {}", declared, expected_len),
            ));
        }
        // An LZ4 block expands by at most 255x.
        if declared > (data.len() - 4).saturating_mul(255).saturating_add(64) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("LZ4 block of {} bytes cannot hold {} bytes", data.len(), declared),
            ));
        }
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..4096u32).map(|i| (i / 64) as u8).collect()
    }

    #[test]
    fn test_zlib_roundtrip() {
        let zlib = ZlibCompressor::default();
        let data = sample();
        let packed = zlib.compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(zlib.decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_zlib_stream_header() {
        // zlib streams start with CMF 0x78
        let packed = ZlibCompressor::new(6).compress(b"abc").unwrap();
        assert_eq!(packed[0], 0x78);
    }

    #[test]
    fn test_zlib_rejects_garbage() {
        let zlib = ZlibCompressor::default();
        assert!(zlib.decompress(b"definitely not zlib", 16).is_err());
    }

    #[test]
    fn test_zlib_caps_output() {
        let zlib = ZlibCompressor::default();
        let packed = zlib.compress(&[0u8; 10_000]).unwrap();
        let out = zlib.decompress(&packed, 100).unwrap();
        assert_eq!(out.len(), 101);
    }

    #[test]
    fn test_zlib_huge_expected_len() {
        let zlib = ZlibCompressor::default();
        let packed = zlib.compress(&[7u8; 12]).unwrap();
        let out = zlib.decompress(&packed, usize::MAX / 2).unwrap();
        assert_eq!(out, vec![7u8; 12]);
    }

    #[test]
    fn test_compressor_factory() {
        let c = CompressionType::Zlib.compressor(9).unwrap();
        assert_eq!(c.kind(), CompressionType::Zlib);
        assert_eq!(
            CompressionType::Lz4.compressor(0).is_ok(),
            CompressionType::Lz4.is_available()
        );
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_lz4_roundtrip() {
        let lz4 = Lz4Compressor;
        let data = sample();
        let packed = lz4.compress(&data).unwrap();
        assert_eq!(lz4.decompress(&packed, data.len()).unwrap(), data);
        assert!(lz4.decompress(&packed, data.len() - 1).is_err());
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_lz4_rejects_impossible_size() {
        let declared = 3usize << 30;
        let mut forged = (declared as u32).to_le_bytes().to_vec();
        forged.extend_from_slice(&[0x10, 0x07]);
        let err = Lz4Compressor.decompress(&forged, declared).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
