//! Raster, delta, and record buffer types.

use serde::{Deserialize, Serialize};

/// Interleaved samples per pixel (R, G, B).
pub const BYTES_PER_PIXEL: usize = 3;

/// Frame dimensions shared by every buffer in one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameShape {
    /// Create a shape, or `None` if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Size of one raster buffer in bytes, or `None` if it does not fit in `usize`.
    #[inline]
    pub fn checked_byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Size of one raster buffer in bytes. Saturates at `usize::MAX`, which no
    /// buffer can match.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }
}

impl std::fmt::Display for FrameShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major interleaved RGB pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    bytes: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap `bytes` if they are exactly one frame of `shape`.
    pub fn with_shape(shape: FrameShape, bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() == shape.byte_len()).then_some(Self { bytes })
    }

    /// Wrap raw bytes without a shape check.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A frame with every sample set to `value`.
    pub fn filled(shape: FrameShape, value: u8) -> Self {
        Self {
            bytes: vec![value; shape.byte_len()],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// RGB value at (x, y), or `None` outside the frame.
    pub fn pixel(&self, shape: FrameShape, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= shape.width || y >= shape.height {
            return None;
        }
        let i = (y as usize * shape.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.bytes.get(i..i + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2]])
    }
}

impl AsRef<[u8]> for RasterBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Byte-wise `(current - previous) mod 256` between two raster buffers.
///
/// Kept distinct from [`RasterBuffer`] so a delta can never be displayed or
/// used as a predecessor by mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaBuffer {
    bytes: Vec<u8>,
}

impl DeltaBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// True if the two frames were identical.
    pub fn is_identity(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

/// One stored frame before compression: a keyframe or a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRecord {
    Key(RasterBuffer),
    Delta(DeltaBuffer),
}

impl FrameRecord {
    pub fn is_keyframe(&self) -> bool {
        matches!(self, FrameRecord::Key(_))
    }

    /// Uncompressed payload bytes.
    pub fn payload(&self) -> &[u8] {
        match self {
            FrameRecord::Key(raster) => raster.as_bytes(),
            FrameRecord::Delta(delta) => delta.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    pub fn into_payload(self) -> Vec<u8> {
        match self {
            FrameRecord::Key(raster) => raster.into_bytes(),
            FrameRecord::Delta(delta) => delta.into_bytes(),
        }
    }
}
