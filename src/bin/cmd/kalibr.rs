// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Kalibr command - bag plus camchain, IMU and target configuration.

use std::path::PathBuf;

use clap::Args;

use crate::common::{self, FrameArgs, GlobalOpts, ProgressSource, Result};
use vidimu::geometry::descriptor::MatlabCalibration;
use vidimu::pipeline::Recording;

/// Prepare a recording for Kalibr camera/IMU calibration.
#[derive(Args, Clone, Debug)]
pub struct KalibrCmd {
    /// Folder with video_recording.mp4 and video_meta.pb3
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Result folder [default: DATA_DIR/kalibr]
    #[arg(long)]
    result_dir: Option<PathBuf>,

    #[command(flatten)]
    frames: FrameArgs,

    /// Tag size of the April grid in meters
    #[arg(long, value_name = "METERS")]
    tag_size: Option<f64>,

    /// Text file with a Matlab camera calibration
    #[arg(long, value_name = "FILE", conflicts_with = "kalibr_calibration")]
    matlab_calibration: Option<PathBuf>,

    /// YAML file with a Kalibr camera calibration
    #[arg(long, value_name = "FILE")]
    kalibr_calibration: Option<PathBuf>,
}

impl KalibrCmd {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let pipeline = common::pipeline(global, &self.frames, |config| {
            if let Some(tag_size) = self.tag_size {
                config.target.tag_size = tag_size;
            }
        })?;
        let matlab = self
            .matlab_calibration
            .as_deref()
            .map(MatlabCalibration::load)
            .transpose()?;

        let recording = Recording::open(&self.data_dir, &pipeline)?;
        let result_dir = common::result_dir(self.result_dir, &self.data_dir, "kalibr");
        let source = ProgressSource::new(
            recording.frame_source()?,
            recording.metadata().video_frames.len(),
            "kalibr",
        );
        let report = pipeline.export_kalibr(
            recording.metadata(),
            source,
            &result_dir,
            matlab.as_ref(),
            self.kalibr_calibration.as_deref(),
        )?;

        common::print_report(&result_dir, &report);
        Ok(())
    }
}
