//! Keyframe/delta transform between raster sequences and stored records.
//!
//! All arithmetic is per byte, modulo 256, so the transform is invertible
//! for every pair of samples without a signed intermediate.
//!
//! The encoder always diffs against the *original* previous frame; the
//! decoder always adds to the *reconstructed* previous frame. With a lossless
//! transport the two are identical. Any damage to a delta record carries into
//! every later frame until the next keyframe.

use log::trace;

use super::{DeltaBuffer, FrameRecord, FrameShape, RasterBuffer};
use crate::error::{CorruptionKind, MvpError, Result};

/// Whether frame `index` is stored raw under `keyframe_interval`.
///
/// Frame 0 is always a keyframe. An interval of 0 means no other frame is.
#[inline]
pub fn is_keyframe(keyframe_interval: u32, index: u64) -> bool {
    index == 0 || (keyframe_interval > 0 && index % u64::from(keyframe_interval) == 0)
}

/// Delta from `prev` to `cur`.
pub fn delta(prev: &RasterBuffer, cur: &RasterBuffer) -> Result<DeltaBuffer> {
    check_len(1, prev.len(), cur.len())?;
    Ok(diff(prev.as_bytes(), cur.as_bytes()))
}

/// Reconstruct the frame following `prev` from its delta.
pub fn apply_delta(prev: &RasterBuffer, delta: &DeltaBuffer) -> Result<RasterBuffer> {
    check_len(1, prev.len(), delta.len())?;
    Ok(add(prev.as_bytes(), delta.as_bytes()))
}

/// Transform a whole sequence into keyframe-or-delta records.
///
/// Every buffer is checked before any record is produced.
pub fn encode_sequence(frames: &[RasterBuffer], keyframe_interval: u32) -> Result<Vec<FrameRecord>> {
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };
    if first.is_empty() {
        return Err(MvpError::EmptyFrame { frame: 0 });
    }
    for (i, frame) in frames.iter().enumerate().skip(1) {
        check_len(i as u64, first.len(), frame.len())?;
    }

    let mut encoder = DeltaEncoder::new(keyframe_interval);
    frames.iter().map(|f| encoder.encode(f.clone())).collect()
}

/// Inverse of [`encode_sequence`].
pub fn decode_sequence(records: Vec<FrameRecord>) -> Result<Vec<RasterBuffer>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    if first.is_empty() {
        return Err(MvpError::EmptyFrame { frame: 0 });
    }
    let expected = first.len();
    for (i, record) in records.iter().enumerate().skip(1) {
        check_len(i as u64, expected, record.len())?;
    }

    let mut decoder = DeltaDecoder::new(0);
    records.into_iter().map(|r| decoder.decode(r)).collect()
}

/// Encode session. Owns the reference to the previous original frame.
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    keyframe_interval: u32,
    expected_len: Option<usize>,
    previous: Option<RasterBuffer>,
    index: u64,
}

impl DeltaEncoder {
    /// Session whose frame length is fixed by the first frame seen.
    pub fn new(keyframe_interval: u32) -> Self {
        Self {
            keyframe_interval,
            expected_len: None,
            previous: None,
            index: 0,
        }
    }

    /// Session that only accepts frames of `shape`.
    pub fn with_shape(shape: FrameShape, keyframe_interval: u32) -> Self {
        Self {
            expected_len: Some(shape.byte_len()),
            ..Self::new(keyframe_interval)
        }
    }

    /// Transform the next frame.
    pub fn encode(&mut self, frame: RasterBuffer) -> Result<FrameRecord> {
        if self.expected_len.is_none() && frame.is_empty() {
            return Err(MvpError::EmptyFrame { frame: self.index });
        }
        let expected = *self.expected_len.get_or_insert(frame.len());
        check_len(self.index, expected, frame.len())?;

        let record = match &self.previous {
            Some(prev) if !is_keyframe(self.keyframe_interval, self.index) => {
                FrameRecord::Delta(diff(prev.as_bytes(), frame.as_bytes()))
            }
            _ => FrameRecord::Key(frame.clone()),
        };

        trace!(
            "encoded frame {} as {}",
            self.index,
            if record.is_keyframe() { "keyframe" } else { "delta" }
        );

        self.previous = Some(frame);
        self.index += 1;
        Ok(record)
    }

    /// Number of frames encoded so far.
    pub fn frames_encoded(&self) -> u64 {
        self.index
    }

    /// Whether the next frame will be stored raw.
    pub fn next_is_keyframe(&self) -> bool {
        is_keyframe(self.keyframe_interval, self.index)
    }
}

/// Decode session. Owns the previously reconstructed frame.
#[derive(Debug, Clone)]
pub struct DeltaDecoder {
    keyframe_interval: u32,
    expected_len: Option<usize>,
    previous: Option<RasterBuffer>,
    index: u64,
}

impl DeltaDecoder {
    pub fn new(keyframe_interval: u32) -> Self {
        Self {
            keyframe_interval,
            expected_len: None,
            previous: None,
            index: 0,
        }
    }

    pub fn with_shape(shape: FrameShape, keyframe_interval: u32) -> Self {
        Self {
            expected_len: Some(shape.byte_len()),
            ..Self::new(keyframe_interval)
        }
    }

    /// Reconstruct the next frame from a typed record.
    pub fn decode(&mut self, record: FrameRecord) -> Result<RasterBuffer> {
        if self.expected_len.is_none() && record.is_empty() {
            return Err(MvpError::EmptyFrame { frame: self.index });
        }
        let expected = *self.expected_len.get_or_insert(record.len());
        check_len(self.index, expected, record.len())?;

        let frame = match record {
            FrameRecord::Key(raster) => raster,
            FrameRecord::Delta(delta) => {
                let prev = self.previous.as_ref().ok_or(CorruptionKind::MissingKeyframe {
                    frame: self.index,
                })?;
                add(prev.as_bytes(), delta.as_bytes())
            }
        };

        self.previous = Some(frame.clone());
        self.index += 1;
        Ok(frame)
    }

    /// Reconstruct the next frame from an untyped decompressed payload,
    /// classified by the keyframe policy.
    pub fn decode_payload(&mut self, payload: Vec<u8>) -> Result<RasterBuffer> {
        let record = if self.next_is_keyframe() {
            FrameRecord::Key(RasterBuffer::from_bytes(payload))
        } else {
            FrameRecord::Delta(DeltaBuffer::from_bytes(payload))
        };
        self.decode(record)
    }

    pub fn frames_decoded(&self) -> u64 {
        self.index
    }

    pub fn next_is_keyframe(&self) -> bool {
        is_keyframe(self.keyframe_interval, self.index)
    }
}

fn check_len(frame: u64, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MvpError::ShapeMismatch {
            frame,
            expected,
            actual,
        });
    }
    Ok(())
}

fn diff(prev: &[u8], cur: &[u8]) -> DeltaBuffer {
    DeltaBuffer::from_bytes(
        prev.iter()
            .zip(cur)
            .map(|(&p, &c)| c.wrapping_sub(p))
            .collect(),
    )
}

fn add(prev: &[u8], delta: &[u8]) -> RasterBuffer {
    RasterBuffer::from_bytes(
        prev.iter()
            .zip(delta)
            .map(|(&p, &d)| p.wrapping_add(d))
            .collect(),
    )
}
