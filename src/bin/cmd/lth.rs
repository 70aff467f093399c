// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! LTH command - LTH-vision data files.

use std::path::PathBuf;

use clap::Args;

use crate::common::{self, FrameArgs, GlobalOpts, Result};
use vidimu::pipeline::Recording;

/// Write video.data, imu.data and sync.data for LTH-vision.
#[derive(Args, Clone, Debug)]
pub struct LthCmd {
    /// Folder with video_meta.pb3
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Result folder [default: DATA_DIR/lth]
    #[arg(long)]
    result_dir: Option<PathBuf>,

    /// Kalibr calibration to convert into calibration/calibration.yaml
    #[arg(long, value_name = "FILE")]
    kalibr: Option<PathBuf>,
}

impl LthCmd {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let pipeline = common::pipeline(global, &FrameArgs::default(), |_| {})?;
        let recording = Recording::open(&self.data_dir, &pipeline)?;
        let result_dir = common::result_dir(self.result_dir, &self.data_dir, "lth");
        let report =
            pipeline.export_lth(recording.metadata(), &result_dir, self.kalibr.as_deref())?;
        common::print_report(&result_dir, &report);
        Ok(())
    }
}
