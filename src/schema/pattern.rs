//! Demo frame patterns for producing test and sample containers.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::{FrameShape, RasterBuffer};

/// Predefined animated patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Pulsing radial glow over a dusk-colored vertical gradient.
    Glow {
        /// Center position as fraction of frame size (0.0-1.0).
        center: (f32, f32),
        /// Glow radius as fraction of the smaller frame dimension.
        radius: f32,
    },
    /// Vertical gradient between two colors, scrolling with time.
    Gradient {
        top: [u8; 3],
        bottom: [u8; 3],
        /// Rows scrolled per unit of time.
        speed: f32,
    },
    /// Uniform random noise.
    Noise {
        /// Noise range [0, amplitude] per sample.
        amplitude: u8,
        /// Random seed (mixed with time so frames differ).
        seed: u64,
    },
    /// Single flat color.
    Solid { rgb: [u8; 3] },
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Glow {
            center: (0.5, 0.66),
            radius: 0.35,
        }
    }
}

impl Pattern {
    /// Render one frame at animation time `t`.
    pub fn render(&self, shape: FrameShape, t: f32) -> RasterBuffer {
        let width = shape.width as usize;
        let height = shape.height as usize;
        let mut out = vec![0u8; shape.byte_len()];

        match self {
            Pattern::Glow { center, radius } => {
                render_glow(&mut out, width, height, *center, *radius, t);
            }
            Pattern::Gradient { top, bottom, speed } => {
                let offset = (t * speed) as i64;
                for (y, row) in out.chunks_exact_mut(width * 3).enumerate() {
                    let shifted = (y as i64 + offset).rem_euclid(height as i64) as f32;
                    let frac = shifted / (height.max(2) - 1) as f32;
                    let rgb = lerp_rgb(*top, *bottom, frac);
                    for px in row.chunks_exact_mut(3) {
                        px.copy_from_slice(&rgb);
                    }
                }
            }
            Pattern::Noise { amplitude, seed } => {
                let mut rng = StdRng::seed_from_u64(seed ^ u64::from(t.to_bits()));
                for v in out.iter_mut() {
                    *v = rng.gen_range(0..=*amplitude);
                }
            }
            Pattern::Solid { rgb } => {
                for px in out.chunks_exact_mut(3) {
                    px.copy_from_slice(rgb);
                }
            }
        }

        RasterBuffer::from_bytes(out)
    }

    /// Render `count` frames, advancing time by `time_step` per frame.
    pub fn render_sequence(&self, shape: FrameShape, count: u32, time_step: f32) -> Vec<RasterBuffer> {
        (0..count)
            .map(|i| self.render(shape, i as f32 * time_step))
            .collect()
    }
}

fn render_glow(out: &mut [u8], width: usize, height: usize, center: (f32, f32), radius: f32, t: f32) {
    let cx = (center.0 * width as f32).floor();
    let cy = (center.1 * height as f32).floor();
    let max_r = (width.min(height) as f32 * radius).max(f32::EPSILON);
    let denom = (height.max(2) - 1) as f32;

    for (y, row) in out.chunks_exact_mut(width * 3).enumerate() {
        let ty = y as f32 / denom;
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            let glow = (1.0 - dist / max_r).max(0.0);
            let anim = 0.3 * (0.5 + 0.5 * (t * 2.0 + dist * 0.02).sin());
            let dim = 1.0 - 0.6 * glow;

            let r = (20.0 + 220.0 * ty.powf(1.2)) * dim + 255.0 * glow * anim;
            let g = (12.0 + 120.0 * ty.powf(1.1)) * dim + 160.0 * glow * anim;
            let b = (8.0 + 40.0 * ty.powf(1.3)) * dim + 40.0 * glow * anim;

            px[0] = r.clamp(0.0, 255.0) as u8;
            px[1] = g.clamp(0.0, 255.0) as u8;
            px[2] = b.clamp(0.0, 255.0) as u8;
        }
    }
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], frac: f32) -> [u8; 3] {
    let mut out = [0u8; 3];
    for i in 0..3 {
        let v = a[i] as f32 + (b[i] as f32 - a[i] as f32) * frac;
        out[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}
