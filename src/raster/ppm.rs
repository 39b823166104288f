//! Binary PPM (P6) export of decoded frames.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::{FrameShape, RasterBuffer};

/// Write `frame` as a P6 image.
pub fn write_ppm<W: Write>(w: &mut W, shape: FrameShape, frame: &RasterBuffer) -> io::Result<()> {
    if frame.len() != shape.byte_len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Frame has {} bytes, {} frame needs {}",
                frame.len(),
                shape,
                shape.byte_len()
            ),
        ));
    }
    write!(w, "P6\n{} {}\n255\n", shape.width, shape.height)?;
    w.write_all(frame.as_bytes())
}

/// Encode `frame` as an in-memory P6 image.
pub fn to_ppm_bytes(shape: FrameShape, frame: &RasterBuffer) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(frame.len() + 32);
    write_ppm(&mut out, shape, frame)?;
    Ok(out)
}

/// Write `frame` to a `.ppm` file.
pub fn save_ppm<P: AsRef<Path>>(path: P, shape: FrameShape, frame: &RasterBuffer) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ppm(&mut writer, shape, frame)?;
    writer.flush()
}
