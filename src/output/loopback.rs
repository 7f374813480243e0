use super::OutputSink;
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Annotated preview written to a v4l2loopback device as raw YUYV
pub struct LoopbackPreview {
    file: File,
    width: u32,
    height: u32,
}

impl LoopbackPreview {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening preview device {} ({}x{})",
            path.display(),
            width,
            height
        );

        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open preview device {}", path.display()))?;

        Ok(Self {
            file,
            width,
            height,
        })
    }
}

/// Pack RGB into YUYV 4:2:2, averaging chroma over each horizontal pixel pair
fn rgb_to_yuyv(image: &RgbImage) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let mut yuyv = Vec::with_capacity((width.div_ceil(2) * 4 * height) as usize);

    for row in image.rows() {
        let row: Vec<&Rgb<u8>> = row.collect();
        for pair in row.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);
            let (y0, u0, v0) = rgb_to_yuv(left);
            let (y1, u1, v1) = rgb_to_yuv(right);
            yuyv.extend_from_slice(&[y0, (u0 + u1) / 2.0, y1, (v0 + v1) / 2.0].map(to_byte));
        }
    }

    yuyv
}

fn rgb_to_yuv(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(f32::from);
    (
        0.299 * r + 0.587 * g + 0.114 * b,
        -0.147 * r - 0.289 * g + 0.436 * b + 128.0,
        0.615 * r - 0.515 * g - 0.100 * b + 128.0,
    )
}

fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

impl OutputSink for LoopbackPreview {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let yuyv = if frame.dimensions() != (self.width, self.height) {
            rgb_to_yuyv(&imageops::resize(frame, self.width, self.height, FilterType::Triangle))
        } else {
            rgb_to_yuyv(frame)
        };

        self.file
            .write_all(&yuyv)
            .context("Failed to write preview frame")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
