// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! PNG image output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::ImageEncoder;

use crate::align::PixelFormat;
use crate::core::{Result, VidimuError};
use crate::io::traits::ImageSink;

fn color_type(format: PixelFormat) -> image::ColorType {
    match format {
        PixelFormat::Gray8 => image::ColorType::L8,
        PixelFormat::Rgb8 => image::ColorType::Rgb8,
    }
}

fn check_len(sink: &str, pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<()> {
    let expected = width as usize * height as usize * format.channels();
    if pixels.len() != expected {
        return Err(VidimuError::sink(
            sink,
            format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                pixels.len()
            ),
        ));
    }
    Ok(())
}

/// Encode a frame as PNG in memory.
pub fn encode_png(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Vec<u8>> {
    check_len("png", pixels, width, height, format)?;
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(pixels, width, height, color_type(format).into())
        .map_err(|e| VidimuError::sink("png", format!("Failed to encode PNG: {e}")))?;
    Ok(buf)
}

/// Writes each frame to `<dir>/<index>.png`.
///
/// Files are independent, so frames may be written concurrently and in any
/// order.
pub struct PngDirectorySink {
    dir: PathBuf,
    written: AtomicU64,
}

impl PngDirectorySink {
    /// Create the output directory if needed.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            VidimuError::sink(
                "PngDirectorySink",
                format!("Failed to create {}: {e}", dir.display()),
            )
        })?;
        Ok(Self {
            dir,
            written: AtomicU64::new(0),
        })
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{index}.png"))
    }

    pub fn images_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

impl ImageSink for PngDirectorySink {
    fn write_image(
        &self,
        index: usize,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<()> {
        check_len("PngDirectorySink", pixels, width, height, format)?;
        let path = self.path_for(index);
        image::save_buffer(&path, pixels, width, height, color_type(format)).map_err(|e| {
            tracing::error!(
                sink = "PngDirectorySink",
                index,
                error = %e,
                "Write failed"
            );
            VidimuError::sink(
                "PngDirectorySink",
                format!("Failed to write {}: {e}", path.display()),
            )
        })?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
