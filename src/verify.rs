//! Round-trip self-test: encode, decode, and compare.

use log::info;

use crate::container::{decode_container, encode_container};
use crate::error::Result;
use crate::raster::{FrameShape, RasterBuffer};
use crate::schema::CodecConfig;

/// Outcome of a round-trip check.
#[derive(Debug, Clone)]
pub struct RoundTripReport {
    /// Frames encoded.
    pub frame_count: usize,
    /// Uncompressed size of the input frames.
    pub raw_bytes: u64,
    /// Encoded container size.
    pub container_bytes: u64,
    /// Index of the first decoded frame that differs from its input.
    pub first_mismatch: Option<usize>,
}

impl RoundTripReport {
    /// True if every frame came back byte-for-byte.
    pub fn is_exact(&self) -> bool {
        self.first_mismatch.is_none()
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.container_bytes == 0 {
            return 0.0;
        }
        self.raw_bytes as f64 / self.container_bytes as f64
    }
}

impl std::fmt::Display for RoundTripReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.first_mismatch {
            None => write!(
                f,
                "{} frames exact, {} -> {} bytes ({:.2}x)",
                self.frame_count,
                self.raw_bytes,
                self.container_bytes,
                self.compression_ratio()
            ),
            Some(i) => write!(f, "{} frames, first mismatch at frame {}", self.frame_count, i),
        }
    }
}

/// Encode `frames` in memory, decode them back, and compare.
///
/// Encode and decode errors are returned as errors; a decode that succeeds
/// with different bytes is reported through `first_mismatch`.
pub fn verify_roundtrip(
    shape: FrameShape,
    fps: u32,
    frames: &[RasterBuffer],
    config: &CodecConfig,
) -> Result<RoundTripReport> {
    let bytes = encode_container(shape, fps, frames, config)?;
    let decoded = decode_container(&bytes, &config.reader_config()).map_err(|p| p.error)?;

    // A successful decode always yields the declared frame count.
    let first_mismatch = frames.iter().zip(&decoded.frames).position(|(a, b)| a != b);

    let report = RoundTripReport {
        frame_count: frames.len(),
        raw_bytes: frames.iter().map(|f| f.len() as u64).sum(),
        container_bytes: bytes.len() as u64,
        first_mismatch,
    };
    info!("Round trip: {}", report);
    Ok(report)
}
