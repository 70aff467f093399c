// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # vidimu CLI
//!
//! Turn camera+IMU capture sessions into calibration inputs.
//!
//! ## Usage
//!
//! ```sh
//! # ROS bag with /cam0/image_raw and /imu0
//! vidimu bag session/ --subsample 2
//!
//! # Bag plus camchain.yaml, imu.yaml and target.yaml for Kalibr
//! vidimu kalibr session/ --resize 960x540
//!
//! # Every 10th frame as PNG
//! vidimu images session/video_recording.mp4 --subsample 10
//!
//! # LTH-vision data files
//! vidimu lth session/ --kalibr camchain.yaml
//!
//! # Metadata statistics
//! vidimu stats session/
//!
//! # Look at inputs and outputs
//! vidimu inspect meta session/ --format yaml
//! vidimu inspect bag session/rosbag/recording.bag -n 10
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cmd::{BagCmd, ImagesCmd, InspectCmd, KalibrCmd, LthCmd, StatsCmd};
use common::{GlobalOpts, Result};

/// vidimu - camera+IMU recording demultiplexer
///
/// Decodes video_meta.pb3, pairs it with the frames of
/// video_recording.mp4 and writes ROS bags, images and calibration files.
#[derive(Parser, Clone)]
#[command(name = "vidimu")]
#[command(about = "Camera+IMU recording demultiplexer and calibration exporter", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Convert a recording to a ROS bag
    Bag(BagCmd),

    /// Bag plus Kalibr camchain/IMU/target configuration
    Kalibr(KalibrCmd),

    /// Write video frames as PNG images
    Images(ImagesCmd),

    /// Write LTH-vision data files
    Lth(LthCmd),

    /// Summarize recording metadata
    Stats(StatsCmd),

    /// Inspect metadata or a written bag
    #[command(subcommand)]
    Inspect(InspectCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    common::init_logging(cli.verbose);

    let global = GlobalOpts { config: cli.config };

    match cli.command {
        Commands::Bag(cmd) => cmd.run(&global),
        Commands::Kalibr(cmd) => cmd.run(&global),
        Commands::Images(cmd) => cmd.run(&global),
        Commands::Lth(cmd) => cmd.run(&global),
        Commands::Stats(cmd) => cmd.run(&global),
        Commands::Inspect(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
