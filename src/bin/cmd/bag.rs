// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bag command - recording to ROS bag.

use std::path::PathBuf;

use clap::Args;

use crate::common::{self, FrameArgs, GlobalOpts, ProgressSource, Result};
use vidimu::io::formats::bag::{BagCompression, ImageEncoding};
use vidimu::pipeline::{Recording, RECORDING_BAG};

/// Convert a recording to a ROS bag with camera and IMU topics.
#[derive(Args, Clone, Debug)]
pub struct BagCmd {
    /// Folder with video_recording.mp4 and video_meta.pb3
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Result folder [default: DATA_DIR/rosbag]
    #[arg(long)]
    result_dir: Option<PathBuf>,

    #[command(flatten)]
    frames: FrameArgs,

    /// Store raw mono8 images instead of PNG
    #[arg(long)]
    raw_image: bool,

    /// Compress bag chunks with bz2
    #[arg(long)]
    bz2: bool,

    /// Kalibr camchain to copy next to the bag
    #[arg(long, value_name = "FILE")]
    calibration: Option<PathBuf>,
}

impl BagCmd {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let pipeline = common::pipeline(global, &self.frames, |config| {
            if self.raw_image {
                config.image_encoding = ImageEncoding::Raw;
            }
            if self.bz2 {
                config.bag_compression = BagCompression::Bz2;
            }
        })?;
        let recording = Recording::open(&self.data_dir, &pipeline)?;
        let result_dir = common::result_dir(self.result_dir, &self.data_dir, "rosbag");
        let bag_path = result_dir.join(RECORDING_BAG);

        let source = ProgressSource::new(
            recording.frame_source()?,
            recording.metadata().video_frames.len(),
            "bag",
        );
        let mut report = pipeline.export_bag(recording.metadata(), source, &bag_path)?;
        if let Some(calibration) = &self.calibration {
            report
                .files
                .extend(pipeline.copy_calibration(calibration, &result_dir)?);
        }

        common::print_report(&bag_path, &report);
        Ok(())
    }
}
