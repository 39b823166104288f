//! Configuration types for encoding and decoding MVP containers.

use serde::{Deserialize, Serialize};

use super::Pattern;
use crate::container::{CompressionType, HeaderProfile};
use crate::raster::FrameShape;

/// Default zlib level (matches zlib's own default).
fn default_compression_level() -> u32 {
    6
}

/// Codec settings shared by a writer and the readers of its output.
///
/// The keyframe interval is not stored in the header, so a reader must be
/// configured with the same value the writer used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Header layout and magic tag.
    #[serde(default)]
    pub profile: HeaderProfile,
    /// 0 = only frame 0 is a keyframe; n = every nth frame is a keyframe.
    #[serde(default)]
    pub keyframe_interval: u32,
    /// Per-record compressor.
    #[serde(default)]
    pub compression: CompressionType,
    /// Compression level (0-9, zlib only).
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            profile: HeaderProfile::Compact,
            keyframe_interval: 0,
            compression: CompressionType::Zlib,
            compression_level: default_compression_level(),
        }
    }
}

impl CodecConfig {
    /// Settings for the 32-bit layout with every frame stored independently.
    pub fn wide_independent() -> Self {
        Self {
            profile: HeaderProfile::Wide,
            keyframe_interval: 1,
            ..Default::default()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > 9 {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        if !self.compression.is_available() {
            return Err(ConfigError::CompressionUnavailable(self.compression));
        }
        Ok(())
    }

    /// Matching settings for reading this writer's output.
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            keyframe_interval: self.keyframe_interval,
            compression: self.compression,
            expected_profile: Some(self.profile),
        }
    }
}

/// Settings for a decode session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Must match the writer's keyframe interval.
    #[serde(default)]
    pub keyframe_interval: u32,
    #[serde(default)]
    pub compression: CompressionType,
    /// Reject containers tagged with any other profile.
    #[serde(default)]
    pub expected_profile: Option<HeaderProfile>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        CodecConfig::default().reader_config()
    }
}

impl ReaderConfig {
    /// Accept either profile, deciding by the magic tag.
    pub fn any_profile(mut self) -> Self {
        self.expected_profile = None;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.compression.is_available() {
            return Err(ConfigError::CompressionUnavailable(self.compression));
        }
        Ok(())
    }
}

/// Description of a generated demo container, loaded by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Playback rate in frames per second.
    pub fps: u32,
    /// Number of frames to generate.
    pub frames: u32,
    /// Animation time advanced per frame.
    pub time_step: f32,
    /// Frame generator.
    #[serde(default)]
    pub pattern: Pattern,
    /// Container settings.
    #[serde(default)]
    pub codec: CodecConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 200,
            fps: 12,
            frames: 48,
            time_step: 0.15,
            pattern: Pattern::default(),
            codec: CodecConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Frame shape, if the dimensions are non-zero.
    pub fn shape(&self) -> Option<FrameShape> {
        FrameShape::new(self.width, self.height)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !self.time_step.is_finite() {
            return Err(ConfigError::InvalidTimeStep);
        }
        self.codec.validate()
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Frame dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Frame rate must be non-zero")]
    InvalidFrameRate,
    #[error("Time step must be finite")]
    InvalidTimeStep,
    #[error("Compression level {0} is out of range (0-9)")]
    InvalidCompressionLevel(u32),
    #[error("{0:?} compression is not compiled in")]
    CompressionUnavailable(CompressionType),
}
