//! MVP CLI - Write, inspect, verify, and export MVP containers.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use mvp_codec::{
    ContainerReader, ContainerWriter, HeaderProfile, ReaderConfig,
    raster::save_ppm,
    schema::DemoConfig,
    verify::verify_roundtrip,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let result = match args.get(1).map(String::as_str) {
        Some("write") if args.len() >= 3 => cmd_write(Path::new(&args[2]), args.get(3)),
        Some("info") if args.len() >= 3 => cmd_info(Path::new(&args[2])),
        Some("verify") => cmd_verify(args.get(2)),
        Some("export") if args.len() >= 4 => cmd_export(Path::new(&args[2]), Path::new(&args[3])),
        _ => {
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  write <out.mvp> [config.json]  Write a demo container");
    eprintln!("  info <file.mvp>                Print header and per-frame status");
    eprintln!("  verify [config.json]           Encode/decode round trip in memory");
    eprintln!("  export <file.mvp> <dir>        Write every frame as a PPM image");
    eprintln!("  --example                      Print an example configuration");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for per-frame logging.");
}

fn load_config(path: Option<&String>) -> Result<DemoConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Error reading config file {}: {}", path, e))?;
            serde_json::from_str(&text).map_err(|e| format!("Error parsing config: {}", e))?
        }
        None => DemoConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_write(out: &Path, config_path: Option<&String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let shape = config.shape().ok_or("frame dimensions must be non-zero")?;

    println!("MVP Writer");
    println!("==========");
    println!("Frames: {} at {}x{}, {} fps", config.frames, shape.width, shape.height, config.fps);
    println!("Profile: {}", config.codec.profile.name());
    println!(
        "Keyframes: {}",
        match config.codec.keyframe_interval {
            0 => "first frame only".to_string(),
            n => format!("every {} frames", n),
        }
    );
    println!();

    let start = Instant::now();
    let mut writer = ContainerWriter::create(out, shape, config.fps, config.codec.clone())?;
    for i in 0..config.frames {
        let frame = config.pattern.render(shape, i as f32 * config.time_step);
        writer.write_frame(&frame)?;
    }
    let stats = writer.finish()?;

    println!("Wrote {}: {}", out.display(), stats);
    println!("Time: {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}

/// Reader settings for inspecting an arbitrary file: trust its tag and
/// assume the common keyframe policy for that layout.
fn inspect_config(path: &Path) -> Result<ReaderConfig, Box<dyn std::error::Error>> {
    let header = mvp_codec::container::decode_header(&read_prefix(path, 20)?)?;
    let keyframe_interval = match header.profile {
        HeaderProfile::Compact => 0,
        HeaderProfile::Wide => 1,
    };
    Ok(ReaderConfig {
        keyframe_interval,
        ..ReaderConfig::default().any_profile()
    })
}

fn read_prefix(path: &Path, len: u64) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut buf = Vec::new();
    fs::File::open(path)?.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn cmd_info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = inspect_config(path)?;
    let mut reader = ContainerReader::open(path, &config)?;
    let header = *reader.header();

    println!("File: {}", path.display());
    println!("Profile: {}", header.profile.name());
    println!("Size: {}x{}", header.width, header.height);
    println!("Frame rate: {} fps", header.fps);
    println!("Frames: {}", header.frame_count);
    if let Some(d) = reader.frame_duration() {
        println!("Duration: {:.2}s", d.as_secs_f64() * f64::from(header.frame_count));
    }

    let mut ok = 0u32;
    for frame in reader.frames() {
        match frame {
            Ok(_) => ok += 1,
            Err(e) => {
                println!("Frame {}: {}", ok, e);
                break;
            }
        }
    }
    println!("Decoded: {}/{} frames", ok, header.frame_count);
    Ok(())
}

fn cmd_verify(config_path: Option<&String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let shape = config.shape().ok_or("frame dimensions must be non-zero")?;
    let frames = config
        .pattern
        .render_sequence(shape, config.frames, config.time_step);

    let report = verify_roundtrip(shape, config.fps, &frames, &config.codec)?;
    println!("{}", report);
    if !report.is_exact() {
        return Err("round trip mismatch".into());
    }
    Ok(())
}

fn cmd_export(path: &Path, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = inspect_config(path)?;
    let mut reader = ContainerReader::open(path, &config)?;
    let shape = reader.shape();
    fs::create_dir_all(dir)?;

    let mut written = 0u32;
    for (i, frame) in reader.frames().enumerate() {
        let frame = frame?;
        let out: PathBuf = dir.join(format!("frame_{:05}.ppm", i));
        save_ppm(&out, shape, &frame)?;
        written += 1;
    }
    println!("Exported {} frames to {}", written, dir.display());
    Ok(())
}

fn print_example_config() {
    let config = DemoConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
