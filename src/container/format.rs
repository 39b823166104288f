//! Binary format definitions for MVP containers.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{CorruptionKind, MvpError, Result};
use crate::raster::FrameShape;

/// Magic tag of the 16-bit field layout.
pub const MAGIC_COMPACT: &[u8; 4] = b"MVP1";

/// Magic tag of the 32-bit field layout.
pub const MAGIC_WIDE: &[u8; 4] = b"MVP2";

/// Size of the length prefix in front of every frame record.
pub const RECORD_PREFIX_SIZE: usize = 4;

/// Largest frame count either layout can declare.
pub const MAX_FRAME_COUNT: u64 = u32::MAX as u64;

/// Largest payload a single frame record can carry.
pub const MAX_PAYLOAD_SIZE: u64 = u32::MAX as u64;

/// Upper bound on buffer space reserved from an untrusted length.
pub(crate) const MAX_PREALLOC: usize = 1 << 20;

/// Header field layout. Each layout has its own magic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderProfile {
    /// `MVP1`: width u16, height u16, fps u16, frame_count u32.
    #[default]
    Compact,
    /// `MVP2`: fps u32, frame_count u32, width u32, height u32.
    Wide,
}

impl HeaderProfile {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            HeaderProfile::Compact => MAGIC_COMPACT,
            HeaderProfile::Wide => MAGIC_WIDE,
        }
    }

    pub fn from_magic(magic: &[u8; 4]) -> Option<Self> {
        match magic {
            m if m == MAGIC_COMPACT => Some(HeaderProfile::Compact),
            m if m == MAGIC_WIDE => Some(HeaderProfile::Wide),
            _ => None,
        }
    }

    /// Total header size in bytes, magic included.
    pub fn header_size(self) -> usize {
        match self {
            HeaderProfile::Compact => 4 + 2 + 2 + 2 + 4,
            HeaderProfile::Wide => 4 + 4 + 4 + 4 + 4,
        }
    }

    /// Largest width, height, or fps the layout can store.
    pub fn field_max(self) -> u64 {
        match self {
            HeaderProfile::Compact => u16::MAX as u64,
            HeaderProfile::Wide => u32::MAX as u64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HeaderProfile::Compact => "compact (MVP1)",
            HeaderProfile::Wide => "wide (MVP2)",
        }
    }
}

/// File header for MVP containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Field layout.
    pub profile: HeaderProfile,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Playback rate.
    pub fps: u32,
    /// Number of frame records following the header.
    pub frame_count: u32,
}

impl ContainerHeader {
    pub fn new(profile: HeaderProfile, shape: FrameShape, fps: u32, frame_count: u32) -> Self {
        Self {
            profile,
            width: shape.width,
            height: shape.height,
            fps,
            frame_count,
        }
    }

    /// Size of this header in bytes.
    pub fn size(&self) -> usize {
        self.profile.header_size()
    }

    /// Frame shape, or `None` for an empty raster.
    pub fn shape(&self) -> Option<FrameShape> {
        FrameShape::new(self.width, self.height)
    }

    /// Size of one uncompressed frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.shape().map_or(0, |s| s.byte_len())
    }

    /// Check that every field is representable and meaningful.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MvpError::EmptyShape {
                width: self.width,
                height: self.height,
            });
        }
        if self.fps == 0 {
            return Err(MvpError::ZeroFps);
        }
        let max = self.profile.field_max();
        for (field, value) in [("width", self.width), ("height", self.height), ("fps", self.fps)] {
            check_field(field, u64::from(value), max)?;
        }
        Ok(())
    }

    /// Serialize to the profile's fixed layout.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(self.profile.magic());
        match self.profile {
            HeaderProfile::Compact => {
                // validate() guarantees these fit
                buf.extend_from_slice(&(self.width as u16).to_le_bytes());
                buf.extend_from_slice(&(self.height as u16).to_le_bytes());
                buf.extend_from_slice(&(self.fps as u16).to_le_bytes());
                buf.extend_from_slice(&self.frame_count.to_le_bytes());
            }
            HeaderProfile::Wide => {
                buf.extend_from_slice(&self.fps.to_le_bytes());
                buf.extend_from_slice(&self.frame_count.to_le_bytes());
                buf.extend_from_slice(&self.width.to_le_bytes());
                buf.extend_from_slice(&self.height.to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let bytes = self.encode()?;
        w.write_all(&bytes)?;
        Ok(())
    }

    /// Read header from input, accepting either profile.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        Self::read_expecting(r, None)
    }

    /// Read header from input.
    ///
    /// The magic tag is checked before anything past it is consumed. If
    /// `expected` is set, a tag naming the other profile is rejected.
    pub fn read_expecting<R: Read>(r: &mut R, expected: Option<HeaderProfile>) -> Result<Self> {
        let min_size = HeaderProfile::Compact.header_size();

        let mut magic = [0u8; 4];
        let n = read_up_to(r, &mut magic)?;
        if n < magic.len() {
            return Err(CorruptionKind::TruncatedHeader {
                expected: min_size,
                actual: n,
            }
            .into());
        }
        let profile = HeaderProfile::from_magic(&magic).ok_or(CorruptionKind::BadMagic(magic))?;
        if let Some(expected) = expected {
            if expected != profile {
                return Err(CorruptionKind::ProfileMismatch {
                    expected: expected.name(),
                    found: profile.name(),
                }
                .into());
            }
        }

        let mut body = [0u8; 16];
        let body = &mut body[..profile.header_size() - magic.len()];
        let n = read_up_to(r, body)?;
        if n < body.len() {
            return Err(CorruptionKind::TruncatedHeader {
                expected: profile.header_size(),
                actual: magic.len() + n,
            }
            .into());
        }

        let header = match profile {
            HeaderProfile::Compact => Self {
                profile,
                width: u32::from(le_u16(&body[0..2])),
                height: u32::from(le_u16(&body[2..4])),
                fps: u32::from(le_u16(&body[4..6])),
                frame_count: le_u32(&body[6..10]),
            },
            HeaderProfile::Wide => Self {
                profile,
                fps: le_u32(&body[0..4]),
                frame_count: le_u32(&body[4..8]),
                width: le_u32(&body[8..12]),
                height: le_u32(&body[12..16]),
            },
        };

        if header.width == 0 || header.height == 0 {
            return Err(CorruptionKind::EmptyRaster {
                width: header.width,
                height: header.height,
            }
            .into());
        }
        Ok(header)
    }
}

/// Build a header, checking every value against the profile's field widths.
pub fn encode_header(
    profile: HeaderProfile,
    width: u64,
    height: u64,
    fps: u64,
    frame_count: u64,
) -> Result<Vec<u8>> {
    let max = profile.field_max();
    check_field("width", width, max)?;
    check_field("height", height, max)?;
    check_field("fps", fps, max)?;
    check_field("frame_count", frame_count, MAX_FRAME_COUNT)?;

    ContainerHeader {
        profile,
        width: width as u32,
        height: height as u32,
        fps: fps as u32,
        frame_count: frame_count as u32,
    }
    .encode()
}

/// Parse a header from the start of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<ContainerHeader> {
    ContainerHeader::read_from(&mut &bytes[..])
}

/// Length-prefix a compressed payload.
pub fn write_frame_record(payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(RECORD_PREFIX_SIZE + payload.len());
    write_frame_record_to(&mut buf, payload)?;
    Ok(buf)
}

/// Write one frame record to output. Returns the bytes written.
pub fn write_frame_record_to<W: Write>(w: &mut W, payload: &[u8]) -> Result<u64> {
    check_field("payload length", payload.len() as u64, MAX_PAYLOAD_SIZE)?;
    w.write_all(&(payload.len() as u32).to_le_bytes())?;
    w.write_all(payload)?;
    Ok((RECORD_PREFIX_SIZE + payload.len()) as u64)
}

/// Read one frame record, returning its payload.
///
/// `frame` is only used to label a truncation error.
pub fn read_frame_record<R: Read>(r: &mut R, frame: u64) -> Result<Vec<u8>> {
    let mut prefix = [0u8; RECORD_PREFIX_SIZE];
    let n = read_up_to(r, &mut prefix)?;
    if n < prefix.len() {
        return Err(MvpError::Truncation {
            frame,
            expected: RECORD_PREFIX_SIZE as u64,
            actual: n as u64,
        });
    }
    let len = u64::from(u32::from_le_bytes(prefix));

    // Grow as data arrives rather than trusting the declared length.
    let mut payload = Vec::with_capacity(len.min(MAX_PREALLOC as u64) as usize);
    let got = r.take(len).read_to_end(&mut payload)? as u64;
    if got < len {
        return Err(MvpError::Truncation {
            frame,
            expected: len,
            actual: got,
        });
    }
    Ok(payload)
}

fn check_field(field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(MvpError::Format { field, value, max });
    }
    Ok(())
}

/// Fill `buf` as far as the stream allows. Returns the bytes read.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_compact_header_layout() {
        let bytes = encode_header(HeaderProfile::Compact, 320, 200, 12, 48).unwrap();
        assert_eq!(bytes.len(), 14);
        assert_eq!(&bytes[0..4], b"MVP1");
        assert_eq!(&bytes[4..6], &320u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &200u16.to_le_bytes());
        assert_eq!(&bytes[8..10], &12u16.to_le_bytes());
        assert_eq!(&bytes[10..14], &48u32.to_le_bytes());
    }

    #[test]
    fn test_wide_header_layout() {
        let bytes = encode_header(HeaderProfile::Wide, 640, 480, 30, 7).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..4], b"MVP2");
        assert_eq!(&bytes[4..8], &30u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &7u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &640u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &480u32.to_le_bytes());
    }

    #[test]
    fn test_header_roundtrip_both_profiles() {
        for profile in [HeaderProfile::Compact, HeaderProfile::Wide] {
            let header = ContainerHeader {
                profile,
                width: 64,
                height: 48,
                fps: 25,
                frame_count: 1000,
            };
            let mut buf = Vec::new();
            header.write_to(&mut buf).unwrap();
            assert_eq!(buf.len(), header.size());
            assert_eq!(decode_header(&buf).unwrap(), header);
        }
    }

    #[test]
    fn test_field_overflow() {
        let err = encode_header(HeaderProfile::Compact, 70_000, 10, 10, 1).unwrap_err();
        assert!(matches!(err, MvpError::Format { field: "width", .. }));

        let err = encode_header(HeaderProfile::Compact, 10, 10, 65_536, 1).unwrap_err();
        assert!(matches!(err, MvpError::Format { field: "fps", .. }));

        let err = encode_header(HeaderProfile::Wide, 10, 10, 10, u32::MAX as u64 + 1).unwrap_err();
        assert!(matches!(err, MvpError::Format { field: "frame_count", .. }));

        assert!(encode_header(HeaderProfile::Wide, 70_000, 10, 10, 1).is_ok());
    }

    #[test]
    fn test_zero_fields_rejected() {
        assert!(matches!(
            encode_header(HeaderProfile::Compact, 10, 10, 0, 1),
            Err(MvpError::ZeroFps)
        ));
        assert!(matches!(
            encode_header(HeaderProfile::Compact, 0, 10, 10, 1),
            Err(MvpError::EmptyShape { .. })
        ));
    }

    #[test]
    fn test_bad_magic_consumes_only_tag() {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let mut cursor = Cursor::new(&data);

        let err = ContainerHeader::read_from(&mut cursor).unwrap_err();
        assert!(err.is_corruption());
        assert!(matches!(
            err,
            MvpError::Corruption(CorruptionKind::BadMagic(m)) if &m == b"RIFF"
        ));
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode_header(HeaderProfile::Wide, 4, 4, 10, 2).unwrap();
        let err = decode_header(&bytes[..15]).unwrap_err();
        assert!(matches!(
            err,
            MvpError::Corruption(CorruptionKind::TruncatedHeader {
                expected: 20,
                actual: 15
            })
        ));

        let err = decode_header(b"MV").unwrap_err();
        assert!(matches!(
            err,
            MvpError::Corruption(CorruptionKind::TruncatedHeader { actual: 2, .. })
        ));
    }

    #[test]
    fn test_profile_mismatch() {
        let bytes = encode_header(HeaderProfile::Wide, 4, 4, 10, 2).unwrap();
        let err =
            ContainerHeader::read_expecting(&mut &bytes[..], Some(HeaderProfile::Compact)).unwrap_err();
        assert!(matches!(
            err,
            MvpError::Corruption(CorruptionKind::ProfileMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_raster_header_rejected() {
        let mut bytes = b"MVP1".to_vec();
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            decode_header(&bytes),
            Err(MvpError::Corruption(CorruptionKind::EmptyRaster { .. }))
        ));
    }

    #[test]
    fn test_zero_fps_accepted_on_read() {
        let mut bytes = b"MVP1".to_vec();
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(decode_header(&bytes).unwrap().fps, 0);
    }

    #[test]
    fn test_frame_record_roundtrip() {
        let record = write_frame_record(b"hello").unwrap();
        assert_eq!(&record[..4], &5u32.to_le_bytes());

        let mut cursor = Cursor::new(&record);
        assert_eq!(read_frame_record(&mut cursor, 0).unwrap(), b"hello");
    }

    #[test]
    fn test_frame_record_truncated() {
        let record = write_frame_record(&[7u8; 100]).unwrap();
        let err = read_frame_record(&mut &record[..60], 3).unwrap_err();
        assert!(matches!(
            err,
            MvpError::Truncation {
                frame: 3,
                expected: 100,
                actual: 56
            }
        ));

        let err = read_frame_record(&mut &record[..2], 0).unwrap_err();
        assert!(matches!(err, MvpError::Truncation { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn test_huge_declared_length_does_not_allocate() {
        let bytes = u32::MAX.to_le_bytes();
        let err = read_frame_record(&mut &bytes[..], 0).unwrap_err();
        assert!(matches!(
            err,
            MvpError::Truncation {
                expected: 4294967295,
                actual: 0,
                ..
            }
        ));
    }
}
