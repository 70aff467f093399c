// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stats command - recording statistics.

use std::path::PathBuf;

use clap::Args;

use crate::common::{self, FrameArgs, GlobalOpts, Result};
use vidimu::pipeline::Recording;
use vidimu::stats::STATISTICS_FILE;

/// Summarize frame and IMU metadata into statistics.json.
#[derive(Args, Clone, Debug)]
pub struct StatsCmd {
    /// Folder with video_meta.pb3
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Result folder [default: DATA_DIR/statistics]
    #[arg(long)]
    result_dir: Option<PathBuf>,
}

impl StatsCmd {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let pipeline = common::pipeline(global, &FrameArgs::default(), |_| {})?;
        let recording = Recording::open(&self.data_dir, &pipeline)?;
        let result_dir = common::result_dir(self.result_dir, &self.data_dir, "statistics");
        let statistics = pipeline.export_statistics(recording.metadata(), &result_dir)?;

        println!("Wrote {}", result_dir.join(STATISTICS_FILE).display());
        println!("  Frames:      {}", statistics.frame_count);
        println!("  IMU samples: {}", statistics.imu_sample_count);
        println!(
            "  Duration:    {}",
            common::format_duration((statistics.video_duration_s * 1e9) as u64)
        );
        if let Some(rate) = statistics.imu_rate_hz {
            println!("  IMU rate:    {rate:.1} Hz");
        }
        for (name, series) in &statistics.video {
            println!(
                "  {name:<22} mean {:>14.3}  std {:>12.3}  [{}, {}]",
                series.mean, series.std, series.min, series.max
            );
        }
        Ok(())
    }
}
