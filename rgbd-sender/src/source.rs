//! Synthetic RGB-D frame source.
//!
//! Stands in for a capture device: a scrolling color gradient and a tilted
//! depth plane with a moving bump. The top-left corner of the depth map is
//! left invalid (NaN) the way real sensors report missing returns.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};
use rgbd_core::{CodecError, DepthBuffer};

/// One captured frame, before any compression.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Seconds since the source started.
    pub timestamp: f64,
    pub rgb_width: u32,
    pub rgb_height: u32,
    /// Packed RGB8 pixels, row-major.
    pub rgb: Vec<u8>,
    pub depth: DepthBuffer,
}

pub struct SyntheticSource {
    rgb_size: (u32, u32),
    depth_size: (u32, u32),
    tick: u64,
    fps: u32,
}

impl SyntheticSource {
    pub fn new(rgb_size: (u32, u32), depth_size: (u32, u32), fps: u32) -> Self {
        Self {
            rgb_size,
            depth_size,
            tick: 0,
            fps: fps.max(1),
        }
    }

    /// Produce the next frame.
    pub fn next_frame(&mut self) -> Result<CapturedFrame, CodecError> {
        let timestamp = self.tick as f64 / self.fps as f64;
        let phase = (self.tick % 256) as u32;
        self.tick += 1;

        let (w, h) = self.rgb_size;
        let mut rgb = Vec::with_capacity(w as usize * h as usize * 3);
        for y in 0..h {
            for x in 0..w {
                rgb.push(((x * 255 / w.max(1) + phase) % 256) as u8);
                rgb.push(((y * 255 / h.max(1)) % 256) as u8);
                rgb.push((phase * 3 % 256) as u8);
            }
        }

        let depth = synthetic_depth(self.depth_size, timestamp)?;
        Ok(CapturedFrame {
            timestamp,
            rgb_width: w,
            rgb_height: h,
            rgb,
            depth,
        })
    }
}

fn synthetic_depth((w, h): (u32, u32), t: f64) -> Result<DepthBuffer, CodecError> {
    let bump_x = (t.sin() * 0.5 + 0.5) * w as f64;
    let bump_y = h as f64 / 2.0;
    let radius = (w.min(h) as f64 / 4.0).max(1.0);
    let invalid_w = w / 8;
    let invalid_h = h / 8;

    let mut samples = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            if x < invalid_w && y < invalid_h {
                samples.push(f32::NAN);
                continue;
            }
            // Plane receding from 0.5 m to 4.5 m top to bottom.
            let mut meters = 0.5 + 4.0 * y as f64 / h.max(1) as f64;
            let dx = x as f64 - bump_x;
            let dy = y as f64 - bump_y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < radius {
                meters -= 0.3 * (1.0 - dist / radius);
            }
            samples.push(meters as f32);
        }
    }
    DepthBuffer::new(w, h, samples)
}

/// JPEG-compress a packed RGB8 frame.
pub fn encode_rgb(frame: &CapturedFrame, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
        &frame.rgb,
        frame.rgb_width,
        frame.rgb_height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(out.into_inner())
}
