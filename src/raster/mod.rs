//! Raster module - Frame buffers and the keyframe/delta transform.

mod buffer;
pub mod delta;
mod ppm;

pub use buffer::*;
pub use delta::{DeltaDecoder, DeltaEncoder, apply_delta, decode_sequence, encode_sequence};
pub use ppm::*;
