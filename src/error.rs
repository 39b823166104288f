//! Error types for MVP container encoding and decoding.

use std::io;

use crate::schema::ConfigError;

/// Result type alias for MVP operations.
pub type Result<T> = std::result::Result<T, MvpError>;

/// Ways a container can be structurally malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptionKind {
    #[error("unrecognized magic tag {0:?}")]
    BadMagic([u8; 4]),
    #[error("header truncated: need {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
    #[error("header declares an empty {width}x{height} raster")]
    EmptyRaster { width: u32, height: u32 },
    #[error("header declares a {width}x{height} raster too large to address")]
    RasterTooLarge { width: u32, height: u32 },
    #[error("frame {frame} is a delta with no preceding keyframe")]
    MissingKeyframe { frame: u64 },
    #[error("expected a {expected} header, found {found}")]
    ProfileMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Main error type for MVP operations.
#[derive(Debug, thiserror::Error)]
pub enum MvpError {
    /// Not a container, or a container whose header is malformed.
    #[error("Corrupt container: {0}")]
    Corruption(#[from] CorruptionKind),

    /// Stream ended before a frame record was complete.
    #[error("Frame record {frame} truncated: expected {expected} bytes, got {actual}")]
    Truncation {
        frame: u64,
        expected: u64,
        actual: u64,
    },

    /// Raster buffers of inconsistent length.
    #[error("Frame {frame} has {actual} bytes, expected {expected}")]
    ShapeMismatch {
        frame: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Frame {frame} is empty")]
    EmptyFrame { frame: u64 },

    /// Value not representable in its on-disk field.
    #[error("{field} = {value} exceeds the field maximum of {max}")]
    Format {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Zero-sized raster requested at encode time.
    #[error("Frame dimensions must be non-zero (got {width}x{height})")]
    EmptyShape { width: u32, height: u32 },

    #[error("Frame rate must be non-zero")]
    ZeroFps,

    /// Frame payload could not be decompressed.
    #[error("Failed to decompress frame {frame}: {source}")]
    Decompression {
        frame: u64,
        #[source]
        source: io::Error,
    },

    /// Payload decompressed, but to the wrong number of bytes.
    #[error("Frame {frame} payload decompressed to {actual} bytes, expected {expected}")]
    PayloadSize {
        frame: u64,
        expected: usize,
        actual: usize,
    },

    /// A frame record was only partly stored, so the session was abandoned.
    #[error("Writer stopped at frame {frame} after a failed write")]
    WriterFailed { frame: u64 },

    #[error("Invalid codec configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl MvpError {
    /// True for errors that mean the file itself is malformed.
    pub fn is_corruption(&self) -> bool {
        matches!(self, MvpError::Corruption(_) | MvpError::Truncation { .. })
    }

    /// True for encode-time range errors (nothing was written).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            MvpError::Format { .. } | MvpError::EmptyShape { .. } | MvpError::ZeroFps
        )
    }
}
