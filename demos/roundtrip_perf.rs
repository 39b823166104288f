//! Quick encode/decode throughput and size comparison

use mvp_codec::{
    container::{HeaderProfile, decode_container, encode_container},
    raster::FrameShape,
    schema::{CodecConfig, Pattern},
};
use std::time::Instant;

fn main() {
    println!("=== Round Trip Performance ===\n");

    // Test different frame sizes
    for (w, h) in [(160, 100), (320, 200), (640, 400)] {
        let shape = FrameShape::new(w, h).unwrap();
        println!("Frame size: {}", shape);

        let frames = Pattern::default().render_sequence(shape, 48, 0.15);
        let config = CodecConfig::default();

        let start = Instant::now();
        let bytes = encode_container(shape, 12, &frames, &config).unwrap();
        let encode_time = start.elapsed();

        let start = Instant::now();
        let decoded = decode_container(&bytes, &config.reader_config()).unwrap();
        let decode_time = start.elapsed();

        assert_eq!(decoded.frames, frames);

        let raw = frames.len() * shape.byte_len();
        println!("  Raw:        {} bytes", raw);
        println!("  Container:  {} bytes ({:.2}x)", bytes.len(), raw as f64 / bytes.len() as f64);
        println!(
            "  Encode:     {:.1} frames/sec",
            frames.len() as f64 / encode_time.as_secs_f64()
        );
        println!(
            "  Decode:     {:.1} frames/sec",
            frames.len() as f64 / decode_time.as_secs_f64()
        );
        println!();
    }

    println!("=== Delta vs Independent Frames (320x200) ===\n");

    let shape = FrameShape::new(320, 200).unwrap();
    let frames = Pattern::default().render_sequence(shape, 48, 0.15);

    for interval in [0, 12, 1] {
        let config = CodecConfig {
            profile: HeaderProfile::Compact,
            keyframe_interval: interval,
            ..Default::default()
        };
        let bytes = encode_container(shape, 12, &frames, &config).unwrap();
        println!("Keyframe interval {:>2}: {} bytes", interval, bytes.len());
    }
}
