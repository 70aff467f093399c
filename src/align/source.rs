// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential frame sources.
//!
//! Video decoding is an external capability: a [`FrameSource`] hands out
//! decoded frames strictly in stream order, one pull at a time, without
//! seeking.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Resolution, Result, VidimuError};

/// Pixel layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit luminance
    Gray8,
    /// 8-bit interleaved RGB
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A decoded video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp, when the decoder knows it
    pub pts_ns: Option<u64>,
}

impl Frame {
    /// Create a frame, checking the buffer size against the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = width as usize * height as usize * format.channels();
        if pixels.len() != expected {
            return Err(VidimuError::validation(
                "frame buffer matches dimensions",
                format!(
                    "{width}x{height} {format:?} needs {expected} bytes, got {}",
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            format,
            pts_ns: None,
        })
    }

    /// Attach a presentation timestamp.
    pub fn with_pts(mut self, pts_ns: u64) -> Self {
        self.pts_ns = Some(pts_ns);
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Convert to 8-bit luminance (ITU-R BT.601 weights).
    pub fn to_gray(&self) -> Vec<u8> {
        to_gray(&self.pixels, self.format)
    }
}

/// Convert a pixel buffer to 8-bit luminance.
pub fn to_gray(pixels: &[u8], format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Gray8 => pixels.to_vec(),
        PixelFormat::Rgb8 => pixels
            .chunks_exact(3)
            .map(|px| {
                let y = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect(),
    }
}

/// Pull-based source of decoded frames.
pub trait FrameSource {
    /// Decode and return the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Advance past the next frame without returning it.
    ///
    /// Returns `false` at end of stream. The default decodes and drops the
    /// frame, which keeps positional correspondence with the metadata.
    /// Sources that can skip cheaply without losing position may override it.
    fn skip_frame(&mut self) -> Result<bool> {
        Ok(self.next_frame()?.is_some())
    }

    /// Native resolution of the stream, when known before decoding.
    fn resolution(&self) -> Option<Resolution>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn skip_frame(&mut self) -> Result<bool> {
        (**self).skip_frame()
    }

    fn resolution(&self) -> Option<Resolution> {
        (**self).resolution()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn skip_frame(&mut self) -> Result<bool> {
        (**self).skip_frame()
    }

    fn resolution(&self) -> Option<Resolution> {
        (**self).resolution()
    }
}

/// In-memory frame source.
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: VecDeque<Frame>,
    pulled: usize,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            pulled: 0,
        }
    }

    /// Number of frames handed out so far (decoded or skipped).
    pub fn pulled(&self) -> usize {
        self.pulled
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.pulled += 1;
        }
        Ok(frame)
    }

    fn resolution(&self) -> Option<Resolution> {
        self.frames.front().map(Frame::resolution)
    }
}

/// Numbered image files (`0.png`, `1.png`, ...) read in index order.
pub struct ImageDirSource {
    dir: PathBuf,
    extension: String,
    next_index: u64,
    format: PixelFormat,
}

impl ImageDirSource {
    /// Open a directory of numbered images.
    pub fn open<P: AsRef<Path>>(dir: P, format: PixelFormat) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(VidimuError::io(
                "ImageDirSource::open",
                format!("{} is not a directory", dir.display()),
            ));
        }
        Ok(Self {
            dir,
            extension: "png".to_string(),
            next_index: 0,
            format,
        })
    }

    /// Use a different file extension (default `png`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{index}.{}", self.extension))
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = self.path_for(self.next_index);
        if !path.exists() {
            return Ok(None);
        }
        let image = image::open(&path).map_err(|e| {
            VidimuError::io(
                "ImageDirSource::next_frame",
                format!("Failed to decode {}: {e}", path.display()),
            )
        })?;
        self.next_index += 1;

        let (width, height) = (image.width(), image.height());
        let pixels = match self.format {
            PixelFormat::Gray8 => image.into_luma8().into_raw(),
            PixelFormat::Rgb8 => image.into_rgb8().into_raw(),
        };
        Frame::new(pixels, width, height, self.format).map(Some)
    }

    fn skip_frame(&mut self) -> Result<bool> {
        // Files are independently addressable, so skipping needs no decode.
        if self.path_for(self.next_index).exists() {
            self.next_index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn resolution(&self) -> Option<Resolution> {
        let (width, height) = image::image_dimensions(self.path_for(self.next_index)).ok()?;
        Some(Resolution::new(width, height))
    }
}
