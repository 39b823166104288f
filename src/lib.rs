//! MVP - Minimal delta-chained raster frame container.
//!
//! This crate reads and writes `.mvp` files: a small binary container holding
//! a sequence of same-shaped RGB frames, stored as a keyframe followed by
//! modulo-256 byte deltas, each record compressed independently with zlib.
//!
//! # Architecture
//!
//! - `container`: on-disk layout, compression adapters, writer and reader sessions
//! - `raster`: frame buffer types, the keyframe/delta transform, PPM export
//! - `schema`: codec configuration and demo frame patterns
//! - `verify`: encode/decode round-trip self test
//! - `batch`: parallel encoding/decoding across independent containers
//!
//! # Example
//!
//! ```rust,no_run
//! use mvp_codec::{
//!     container::{ContainerReader, ContainerWriter},
//!     raster::FrameShape,
//!     schema::{CodecConfig, Pattern},
//! };
//!
//! let shape = FrameShape::new(320, 200).unwrap();
//! let config = CodecConfig::default();
//!
//! // Write 48 frames of the demo animation
//! let mut writer = ContainerWriter::create("demo.mvp", shape, 12, config.clone())?;
//! for frame in Pattern::default().render_sequence(shape, 48, 0.15) {
//!     writer.write_frame(&frame)?;
//! }
//! println!("{}", writer.finish()?);
//!
//! // Read them back
//! let mut reader = ContainerReader::open("demo.mvp", &config.reader_config())?;
//! for frame in reader.frames() {
//!     let frame = frame?;
//!     assert_eq!(frame.len(), shape.byte_len());
//! }
//! # Ok::<(), mvp_codec::MvpError>(())
//! ```

pub mod batch;
pub mod container;
pub mod error;
pub mod raster;
pub mod schema;
pub mod verify;

// Re-export commonly used types
pub use container::{ContainerHeader, ContainerReader, ContainerWriter, HeaderProfile};
pub use error::{CorruptionKind, MvpError, Result};
pub use raster::{DeltaBuffer, FrameRecord, FrameShape, RasterBuffer};
pub use schema::{CodecConfig, ReaderConfig};
