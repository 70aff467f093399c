// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Images command - video frames to numbered PNG files.

use std::path::PathBuf;

use clap::Args;

use crate::common::{self, FrameArgs, GlobalOpts, ProgressSource, Result};
use vidimu::align::{FfmpegFrameSource, PixelFormat};

/// Write every n-th video frame as `<index>.png`.
#[derive(Args, Clone, Debug)]
pub struct ImagesCmd {
    /// Video file
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    /// Result folder [default: <video folder>/images]
    #[arg(long)]
    result_dir: Option<PathBuf>,

    #[command(flatten)]
    frames: FrameArgs,
}

impl ImagesCmd {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let pipeline = common::pipeline(global, &self.frames, |_| {})?;
        let video_dir = self
            .video
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        let result_dir = common::result_dir(self.result_dir, &video_dir, "images");

        let source = FfmpegFrameSource::open(&self.video, PixelFormat::Rgb8)?;
        let source = ProgressSource::new(source, 0, "images");
        let report = pipeline.export_images(source, &result_dir)?;

        common::print_report(&result_dir, &report);
        Ok(())
    }
}
