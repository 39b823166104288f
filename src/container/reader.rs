//! Container reader: decodes an MVP stream back into raster frames.

use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FusedIterator;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use super::compress::Compressor;
use super::format::{ContainerHeader, read_frame_record};
use crate::error::{CorruptionKind, MvpError, Result};
use crate::raster::{DeltaDecoder, FrameShape, RasterBuffer};
use crate::schema::ReaderConfig;

/// Sequential decode session.
///
/// Frames can only be produced in order. After the first error the session
/// stops and reads nothing further.
///
/// Usage:
/// ```ignore
/// let mut reader = ContainerReader::open("clip.mvp", &ReaderConfig::default())?;
/// println!("{} frames at {} fps", reader.frame_count(), reader.header().fps);
/// for frame in reader.frames() {
///     let frame = frame?;
///     // present frame...
/// }
/// ```
pub struct ContainerReader<R: Read> {
    reader: R,
    header: ContainerHeader,
    shape: FrameShape,
    /// Uncompressed bytes per frame.
    frame_len: usize,
    decoder: DeltaDecoder,
    compressor: Box<dyn Compressor>,
    frames_read: u32,
    failed: bool,
}

impl ContainerReader<BufReader<File>> {
    /// Open a container file for decoding.
    pub fn open<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), config)
    }
}

impl<R: Read> ContainerReader<R> {
    /// Read the header and prepare to decode frames.
    pub fn new(mut reader: R, config: &ReaderConfig) -> Result<Self> {
        config.validate()?;
        let compressor = config.compression.compressor(0)?;

        let header = ContainerHeader::read_expecting(&mut reader, config.expected_profile)?;
        let shape = header.shape().ok_or(CorruptionKind::EmptyRaster {
            width: header.width,
            height: header.height,
        })?;
        let frame_len = shape.checked_byte_len().ok_or(CorruptionKind::RasterTooLarge {
            width: header.width,
            height: header.height,
        })?;

        debug!(
            "Opened {} container: {} at {} fps, {} frames",
            header.profile.name(),
            shape,
            header.fps,
            header.frame_count
        );

        Ok(Self {
            reader,
            header,
            shape,
            frame_len,
            decoder: DeltaDecoder::with_shape(shape, config.keyframe_interval),
            compressor,
            frames_read: 0,
            failed: false,
        })
    }

    /// Get container header.
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Get frame dimensions.
    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Frame count declared by the header.
    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Frames successfully reconstructed so far.
    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    /// Display time of one frame, or `None` for a zero frame rate.
    pub fn frame_duration(&self) -> Option<Duration> {
        (self.header.fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(self.header.fps)))
    }

    /// Decode the next frame, or `None` once all frames are read or after an error.
    pub fn next_frame(&mut self) -> Option<Result<RasterBuffer>> {
        if self.failed || self.frames_read >= self.header.frame_count {
            return None;
        }

        let result = self.read_next();
        match &result {
            Ok(_) => self.frames_read += 1,
            Err(e) => {
                warn!("Decoding stopped at frame {}: {}", self.frames_read, e);
                self.failed = true;
            }
        }
        Some(result)
    }

    fn read_next(&mut self) -> Result<RasterBuffer> {
        let index = u64::from(self.frames_read);
        let payload = read_frame_record(&mut self.reader, index)?;

        let expected = self.frame_len;
        let raw = self
            .compressor
            .decompress(&payload, expected)
            .map_err(|source| MvpError::Decompression {
                frame: index,
                source,
            })?;
        if raw.len() != expected {
            return Err(MvpError::PayloadSize {
                frame: index,
                expected,
                actual: raw.len(),
            });
        }

        self.decoder.decode_payload(raw)
    }

    /// Create an iterator over the remaining frames.
    pub fn frames(&mut self) -> FrameIterator<'_, R> {
        FrameIterator { reader: self }
    }

    /// Decode every remaining frame.
    ///
    /// On failure the frames decoded before the error are returned with it.
    pub fn read_all(mut self) -> std::result::Result<DecodedContainer, PartialDecode> {
        // The declared count is untrusted.
        let remaining = self.frame_count() - self.frames_read;
        let mut frames = Vec::with_capacity(remaining.min(1024) as usize);
        while let Some(result) = self.next_frame() {
            match result {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    return Err(PartialDecode {
                        frames,
                        expected: self.header.frame_count,
                        error,
                    });
                }
            }
        }
        Ok(DecodedContainer {
            header: self.header,
            frames,
        })
    }
}

/// Iterator over decoded frames.
pub struct FrameIterator<'a, R: Read> {
    reader: &'a mut ContainerReader<R>,
}

impl<'a, R: Read> Iterator for FrameIterator<'a, R> {
    type Item = Result<RasterBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.reader.failed {
            return (0, Some(0));
        }
        let remaining = (self.reader.frame_count() - self.reader.frames_read) as usize;
        (0, Some(remaining))
    }
}

impl<'a, R: Read> FusedIterator for FrameIterator<'a, R> {}

/// A fully decoded container.
#[derive(Debug, Clone)]
pub struct DecodedContainer {
    pub header: ContainerHeader,
    pub frames: Vec<RasterBuffer>,
}

/// Decoding failed part way; `frames` holds everything reconstructed before the error.
#[derive(Debug, thiserror::Error)]
#[error("Decoding stopped after {} of {expected} frames: {error}", .frames.len())]
pub struct PartialDecode {
    pub frames: Vec<RasterBuffer>,
    /// Frame count declared by the header (0 if the header was unreadable).
    pub expected: u32,
    #[source]
    pub error: MvpError,
}

/// Decode an in-memory container.
pub fn decode_container(
    bytes: &[u8],
    config: &ReaderConfig,
) -> std::result::Result<DecodedContainer, PartialDecode> {
    match ContainerReader::new(bytes, config) {
        Ok(reader) => reader.read_all(),
        Err(error) => Err(PartialDecode {
            frames: Vec::new(),
            expected: 0,
            error,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::format::RECORD_PREFIX_SIZE;
    use crate::container::{ContainerWriter, HeaderProfile, encode_container};
    use crate::schema::{CodecConfig, Pattern};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn shape() -> FrameShape {
        FrameShape::new(16, 8).unwrap()
    }

    fn frames(count: u32) -> Vec<RasterBuffer> {
        Pattern::default().render_sequence(shape(), count, 0.3)
    }

    /// Byte offsets of each record's payload.
    fn payload_offsets(bytes: &[u8], header_size: usize, count: usize) -> Vec<(usize, usize)> {
        let mut offsets = Vec::new();
        let mut pos = header_size;
        for _ in 0..count {
            let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            offsets.push((pos + RECORD_PREFIX_SIZE, len));
            pos += RECORD_PREFIX_SIZE + len;
        }
        offsets
    }

    #[test]
    fn test_reader_roundtrip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.mvp");
        let original = frames(6);

        {
            let mut writer =
                ContainerWriter::create(&path, shape(), 12, CodecConfig::default()).unwrap();
            writer.write_frames(&original).unwrap();
            writer.finish().unwrap();
        }

        let mut reader = ContainerReader::open(&path, &ReaderConfig::default()).unwrap();
        assert_eq!(reader.frame_count(), 6);
        assert_eq!(reader.shape(), shape());
        assert_eq!(reader.frame_duration(), Some(Duration::from_secs_f64(1.0 / 12.0)));

        let decoded: Vec<_> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(decoded, original);
        assert_eq!(reader.frames_read(), 6);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_roundtrip_lengths() {
        for count in [0, 1, 5] {
            let original = frames(count);
            let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();
            let decoded = decode_container(&bytes, &ReaderConfig::default()).unwrap();
            assert_eq!(decoded.frames, original);
            assert_eq!(decoded.header.frame_count, count);
        }
    }

    #[test]
    fn test_keyframe_invariance() {
        let original = frames(4);
        let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();
        let mut reader = ContainerReader::new(&bytes[..], &ReaderConfig::default()).unwrap();
        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!(first, original[0]);
    }

    #[test]
    fn test_two_frame_scenario() {
        let shape = FrameShape::new(2, 2).unwrap();
        let a = RasterBuffer::filled(shape, 0);
        let b = RasterBuffer::filled(shape, 255);
        let bytes =
            encode_container(shape, 1, &[a.clone(), b.clone()], &CodecConfig::default()).unwrap();

        // The stored payload of frame 1 inflates to twelve 255s.
        let offsets = payload_offsets(&bytes, 14, 2);
        let (start, len) = offsets[1];
        let zlib = crate::container::ZlibCompressor::default();
        let delta = zlib.decompress(&bytes[start..start + len], 12).unwrap();
        assert_eq!(delta, vec![255u8; 12]);

        let decoded = decode_container(&bytes, &ReaderConfig::default()).unwrap();
        assert_eq!(decoded.frames, vec![a, b]);
    }

    #[test]
    fn test_bad_magic_reads_no_frames() {
        let mut bytes = encode_container(shape(), 10, &frames(2), &CodecConfig::default()).unwrap();
        bytes[..4].copy_from_slice(b"MVPX");

        let mut cursor = Cursor::new(&bytes);
        let err = ContainerReader::new(&mut cursor, &ReaderConfig::default())
            .err()
            .unwrap();
        assert!(err.is_corruption());
        assert_eq!(cursor.position(), 4);

        let partial = decode_container(&bytes, &ReaderConfig::default()).unwrap_err();
        assert!(partial.frames.is_empty());
        assert!(matches!(
            partial.error,
            MvpError::Corruption(CorruptionKind::BadMagic(_))
        ));
    }

    #[test]
    fn test_truncation_returns_complete_frames() {
        let original = frames(5);
        let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();
        let offsets = payload_offsets(&bytes, 14, 5);
        // Cut the file in the middle of record 3's payload.
        let (start, len) = offsets[3];
        let cut = &bytes[..start + len / 2];

        let partial = decode_container(cut, &ReaderConfig::default()).unwrap_err();
        assert_eq!(partial.frames, original[..3]);
        assert_eq!(partial.expected, 5);
        assert!(matches!(partial.error, MvpError::Truncation { frame: 3, .. }));
    }

    #[test]
    fn test_missing_records_is_truncation() {
        let original = frames(3);
        let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();
        let offsets = payload_offsets(&bytes, 14, 3);
        let (start, len) = offsets[1];
        let cut = &bytes[..start + len];

        let mut reader = ContainerReader::new(cut, &ReaderConfig::default()).unwrap();
        let results: Vec<_> = reader.frames().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(MvpError::Truncation {
                frame: 2,
                expected: 4,
                actual: 0
            })
        ));
        assert_eq!(reader.frames_read(), 2);
    }

    #[test]
    fn test_tampered_record_propagates() {
        let original = frames(6);
        let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();
        let offsets = payload_offsets(&bytes, 14, 6);

        for k in 1..6 {
            let mut tampered = bytes.clone();
            let (start, len) = offsets[k];
            tampered[start + len / 2] ^= 0x5A;

            let mut reader = ContainerReader::new(&tampered[..], &ReaderConfig::default()).unwrap();
            let results: Vec<_> = reader.frames().collect();
            for i in 0..k {
                assert_eq!(results[i].as_ref().unwrap(), &original[i]);
            }
            for (i, result) in results.iter().enumerate().skip(k) {
                if let Ok(frame) = result {
                    assert_ne!(frame, &original[i], "frame {} silently survived tamper at {}", i, k);
                }
            }
        }
    }

    #[test]
    fn test_garbage_payload_is_decompression_error() {
        let mut bytes = encode_container(shape(), 10, &frames(1), &CodecConfig::default()).unwrap();
        bytes.truncate(14);
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(b"garbage!");

        let partial = decode_container(&bytes, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(partial.error, MvpError::Decompression { frame: 0, .. }));
        assert!(!partial.error.is_corruption());
    }

    #[test]
    fn test_wrong_payload_size() {
        let small = FrameShape::new(1, 1).unwrap();
        let mut bytes = crate::container::encode_header(
            crate::container::HeaderProfile::Compact,
            2,
            2,
            10,
            1,
        )
        .unwrap();
        let payload = crate::container::ZlibCompressor::default()
            .compress(RasterBuffer::filled(small, 1).as_bytes())
            .unwrap();
        bytes.extend_from_slice(&crate::container::write_frame_record(&payload).unwrap());

        let partial = decode_container(&bytes, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(
            partial.error,
            MvpError::PayloadSize {
                frame: 0,
                expected: 12,
                actual: 3
            }
        ));
    }

    /// One-frame container whose header claims `width`x`height` but whose
    /// only record inflates to 12 bytes.
    fn forged_dimensions(profile: HeaderProfile, width: u64, height: u64) -> Vec<u8> {
        let mut bytes = crate::container::encode_header(profile, width, height, 10, 1).unwrap();
        let payload = crate::container::ZlibCompressor::default()
            .compress(&[7u8; 12])
            .unwrap();
        bytes.extend_from_slice(&crate::container::write_frame_record(&payload).unwrap());
        bytes
    }

    #[test]
    fn test_forged_wide_dimensions_fail_cleanly() {
        let config = CodecConfig::wide_independent().reader_config();
        let bytes = forged_dimensions(HeaderProfile::Wide, 1 << 30, 1 << 30);

        let partial = decode_container(&bytes, &config).unwrap_err();
        assert!(partial.frames.is_empty());
        assert!(matches!(
            partial.error,
            MvpError::PayloadSize {
                frame: 0,
                actual: 12,
                ..
            } | MvpError::Corruption(CorruptionKind::RasterTooLarge { .. })
        ));
    }

    #[test]
    fn test_unaddressable_dimensions_are_corruption() {
        let config = CodecConfig::wide_independent().reader_config();
        let bytes = forged_dimensions(HeaderProfile::Wide, u64::from(u32::MAX), u64::from(u32::MAX));

        let err = ContainerReader::new(&bytes[..], &config).err().unwrap();
        assert!(err.is_corruption());
        assert!(matches!(
            err,
            MvpError::Corruption(CorruptionKind::RasterTooLarge {
                width: u32::MAX,
                height: u32::MAX
            })
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_forged_compact_dimensions_fail_cleanly() {
        let bytes = forged_dimensions(HeaderProfile::Compact, 65_535, 65_535);

        let mut reader = ContainerReader::new(&bytes[..], &ReaderConfig::default()).unwrap();
        assert_eq!(reader.shape(), FrameShape::new(65_535, 65_535).unwrap());
        let err = reader.next_frame().unwrap().unwrap_err();
        assert!(matches!(
            err,
            MvpError::PayloadSize {
                frame: 0,
                actual: 12,
                ..
            }
        ));
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_profile_must_match_config() {
        let bytes =
            encode_container(shape(), 10, &frames(2), &CodecConfig::wide_independent()).unwrap();

        let partial = decode_container(&bytes, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(
            partial.error,
            MvpError::Corruption(CorruptionKind::ProfileMismatch { .. })
        ));

        let config = CodecConfig::wide_independent().reader_config();
        assert_eq!(decode_container(&bytes, &config).unwrap().frames, frames(2));
    }

    #[test]
    fn test_independent_sessions() {
        let original = frames(4);
        let bytes = encode_container(shape(), 10, &original, &CodecConfig::default()).unwrap();

        let mut a = ContainerReader::new(&bytes[..], &ReaderConfig::default()).unwrap();
        let mut b = ContainerReader::new(&bytes[..], &ReaderConfig::default()).unwrap();
        a.next_frame().unwrap().unwrap();
        a.next_frame().unwrap().unwrap();
        assert_eq!(b.next_frame().unwrap().unwrap(), original[0]);
        assert_eq!(a.next_frame().unwrap().unwrap(), original[2]);
        assert_eq!(b.next_frame().unwrap().unwrap(), original[1]);
    }

    #[test]
    fn test_decodes_legacy_delta_layout() {
        // Byte layout written by the original delta-chained writer:
        // MVP1 | u16 w | u16 h | u16 fps | u32 count | (u32 len, zlib)...
        let shape = FrameShape::new(1, 2).unwrap();
        let f0 = vec![10u8, 20, 30, 40, 50, 60];
        let f1 = vec![11u8, 19, 30, 45, 50, 0];
        let d1: Vec<u8> = f0.iter().zip(&f1).map(|(p, c)| c.wrapping_sub(*p)).collect();

        let zlib = crate::container::ZlibCompressor::default();
        let mut bytes = b"MVP1".to_vec();
        for v in [1u16, 2, 15] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for raw in [&f0, &d1] {
            let comp = zlib.compress(raw).unwrap();
            bytes.extend_from_slice(&(comp.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&comp);
        }

        let decoded = decode_container(&bytes, &ReaderConfig::default()).unwrap();
        assert_eq!(decoded.header.fps, 15);
        assert_eq!(
            decoded.frames,
            vec![
                RasterBuffer::with_shape(shape, f0).unwrap(),
                RasterBuffer::with_shape(shape, f1).unwrap()
            ]
        );
    }
}
