//! MVP container encoding and decoding.
//!
//! An MVP container stores an ordered sequence of same-shaped RGB frames.
//! The first frame is stored raw; later frames are stored as byte-wise
//! deltas from their predecessor (or raw, at a configured keyframe
//! interval). Every record is compressed on its own.
//!
//! # File Format
//!
//! Two header layouts exist, told apart by their magic tag:
//!
//! ```text
//! Compact header (14 bytes):
//!   Magic: "MVP1" (4 bytes)
//!   Width: u16
//!   Height: u16
//!   Frame rate: u16
//!   Frame count: u32
//!
//! Wide header (20 bytes):
//!   Magic: "MVP2" (4 bytes)
//!   Frame rate: u32
//!   Frame count: u32
//!   Width: u32
//!   Height: u32
//!
//! Frame records (frame count times):
//!   Payload length: u32
//!   Payload: zlib stream of width * height * 3 bytes
//!            (raw RGB for keyframes, delta for the rest)
//! ```
//!
//! All integers are little-endian. There is no index: frames are read in order.

mod compress;
mod format;
mod reader;
mod writer;

#[cfg(feature = "lz4")]
pub use compress::Lz4Compressor;
pub use compress::{CompressionType, Compressor, ZlibCompressor};
pub use format::{
    ContainerHeader, HeaderProfile, MAGIC_COMPACT, MAGIC_WIDE, MAX_FRAME_COUNT, MAX_PAYLOAD_SIZE,
    RECORD_PREFIX_SIZE, decode_header, encode_header, read_frame_record, write_frame_record,
    write_frame_record_to,
};
pub use reader::{ContainerReader, DecodedContainer, FrameIterator, PartialDecode, decode_container};
pub use writer::{ContainerWriter, EncodeStats, encode_container};
