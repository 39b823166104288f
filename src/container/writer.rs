//! Container writer: encodes raster frames into an MVP stream.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info, warn};

use super::compress::{CompressionType, Compressor};
use super::format::{ContainerHeader, HeaderProfile, MAX_FRAME_COUNT, write_frame_record_to};
use crate::error::{MvpError, Result};
use crate::raster::{DeltaEncoder, FrameRecord, FrameShape, RasterBuffer};
use crate::schema::CodecConfig;

/// Encode session writing frames to a seekable stream.
///
/// The header is written up front with a frame count of zero and patched
/// in [`finish`](Self::finish).
///
/// If compressing or storing a frame fails, the stream and the delta chain
/// no longer agree. Every later call then returns [`MvpError::WriterFailed`].
///
/// Usage:
/// ```ignore
/// let mut writer = ContainerWriter::create("out.mvp", shape, 12, CodecConfig::default())?;
/// for frame in &frames {
///     writer.write_frame(frame)?;
/// }
/// let stats = writer.finish()?;
/// ```
pub struct ContainerWriter<W: Write + Seek> {
    writer: W,
    header: ContainerHeader,
    /// Stream position of the header.
    start: u64,
    encoder: DeltaEncoder,
    compressor: Box<dyn Compressor>,
    keyframes: u32,
    unchanged: u32,
    raw_bytes: u64,
    stored_bytes: u64,
    /// Frame whose record failed to store.
    failed_at: Option<u32>,
}

impl ContainerWriter<BufWriter<File>> {
    /// Create a container file at `path`.
    ///
    /// Arguments are validated before the file is created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        shape: FrameShape,
        fps: u32,
        config: CodecConfig,
    ) -> Result<Self> {
        check_session(shape, fps, &config)?;
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), shape, fps, config)
    }
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Start a container at the writer's current position.
    pub fn new(mut writer: W, shape: FrameShape, fps: u32, config: CodecConfig) -> Result<Self> {
        let header = check_session(shape, fps, &config)?;
        let compressor = config.compression.compressor(config.compression_level)?;

        let start = writer.stream_position()?;
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            header,
            start,
            encoder: DeltaEncoder::with_shape(shape, config.keyframe_interval),
            compressor,
            keyframes: 0,
            unchanged: 0,
            raw_bytes: 0,
            stored_bytes: header.size() as u64,
            failed_at: None,
        })
    }

    /// Append the next frame.
    pub fn write_frame(&mut self, frame: &RasterBuffer) -> Result<()> {
        self.check_usable()?;
        let index = self.header.frame_count;
        if u64::from(index) >= MAX_FRAME_COUNT {
            return Err(MvpError::Format {
                field: "frame_count",
                value: u64::from(index) + 1,
                max: MAX_FRAME_COUNT,
            });
        }

        // A rejected frame leaves the encoder untouched.
        let record = self.encoder.encode(frame.clone())?;
        let written = match self.store(index, &record) {
            Ok(written) => written,
            Err(e) => {
                warn!("Writer stopped at frame {}: {}", index, e);
                self.failed_at = Some(index);
                return Err(e);
            }
        };

        match &record {
            FrameRecord::Key(_) => self.keyframes += 1,
            FrameRecord::Delta(delta) if delta.is_identity() => self.unchanged += 1,
            FrameRecord::Delta(_) => {}
        }
        self.raw_bytes += record.len() as u64;
        self.stored_bytes += written;
        self.header.frame_count += 1;
        Ok(())
    }

    fn store(&mut self, index: u32, record: &FrameRecord) -> Result<u64> {
        let payload = self.compressor.compress(record.payload())?;
        let written = write_frame_record_to(&mut self.writer, &payload)?;
        debug!(
            "frame {}: {} {} -> {} bytes",
            index,
            if record.is_keyframe() { "key" } else { "delta" },
            record.len(),
            payload.len()
        );
        Ok(written)
    }

    fn check_usable(&self) -> Result<()> {
        match self.failed_at {
            Some(frame) => Err(MvpError::WriterFailed {
                frame: u64::from(frame),
            }),
            None => Ok(()),
        }
    }

    /// Append every frame from an iterator.
    pub fn write_frames<'a, I>(&mut self, frames: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a RasterBuffer>,
    {
        for frame in frames {
            self.write_frame(frame)?;
        }
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u32 {
        self.header.frame_count
    }

    /// Header as it will be finalized.
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Patch the header with the final frame count and flush.
    pub fn finish(self) -> Result<EncodeStats> {
        self.finish_into_inner().map(|(_, stats)| stats)
    }

    /// Like [`finish`](Self::finish), also returning the underlying writer.
    ///
    /// Fails without touching the header if an earlier frame failed to store.
    pub fn finish_into_inner(mut self) -> Result<(W, EncodeStats)> {
        self.check_usable()?;
        self.writer.seek(SeekFrom::Start(self.start))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        let stats = EncodeStats {
            frame_count: self.header.frame_count,
            keyframes: self.keyframes,
            unchanged: self.unchanged,
            raw_bytes: self.raw_bytes,
            total_bytes: self.stored_bytes,
            profile: self.header.profile,
            compression: self.compressor.kind(),
        };
        info!("Finished {} container: {}", self.header.profile.name(), stats);

        Ok((self.writer, stats))
    }
}

/// Encode a whole sequence in memory.
///
/// Everything (shape, rate, frame count, every frame's length) is checked
/// before the first byte is produced.
pub fn encode_container(
    shape: FrameShape,
    fps: u32,
    frames: &[RasterBuffer],
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    check_session(shape, fps, config)?;
    if frames.len() as u64 > MAX_FRAME_COUNT {
        return Err(MvpError::Format {
            field: "frame_count",
            value: frames.len() as u64,
            max: MAX_FRAME_COUNT,
        });
    }
    let expected = shape.byte_len();
    if let Some((i, frame)) = frames.iter().enumerate().find(|(_, f)| f.len() != expected) {
        return Err(MvpError::ShapeMismatch {
            frame: i as u64,
            expected,
            actual: frame.len(),
        });
    }

    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()), shape, fps, config.clone())?;
    writer.write_frames(frames)?;
    let (cursor, _) = writer.finish_into_inner()?;
    Ok(cursor.into_inner())
}

fn check_session(shape: FrameShape, fps: u32, config: &CodecConfig) -> Result<ContainerHeader> {
    config.validate()?;
    let header = ContainerHeader::new(config.profile, shape, fps, 0);
    header.validate()?;
    Ok(header)
}

/// Statistics from an encode session.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Total frames written.
    pub frame_count: u32,
    /// Frames stored raw.
    pub keyframes: u32,
    /// Delta frames identical to their predecessor.
    pub unchanged: u32,
    /// Uncompressed payload bytes.
    pub raw_bytes: u64,
    /// Container size, header included.
    pub total_bytes: u64,
    pub profile: HeaderProfile,
    pub compression: CompressionType,
}

impl EncodeStats {
    /// Raw payload bytes per stored byte.
    pub fn compression_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.raw_bytes as f64 / self.total_bytes as f64
    }
}

impl std::fmt::Display for EncodeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames ({} key), {} bytes total, {:.2}x ({:?} compression)",
            self.frame_count,
            self.keyframes,
            self.total_bytes,
            self.compression_ratio(),
            self.compression
        )
    }
}
