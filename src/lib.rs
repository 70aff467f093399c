// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # vidimu
//!
//! Demultiplexer for camera+IMU capture sessions.
//!
//! A session is a video stream plus a protobuf metadata container. This
//! library turns it into time-synchronized, calibration-ready artifacts:
//! - [`metadata`] decodes the container into a [`RecordingMetadata`]
//! - [`align`] pairs decoded frames with metadata entries by position
//! - [`timeline`] merges frames and IMU samples into one ordered stream
//! - [`geometry`] builds `T_cam_imu` and rescales intrinsics
//! - [`io`] writes ROS bags, PNG images and calibration-tool YAML
//! - [`stats`] summarizes per-frame and per-sample quantities
//! - [`pipeline`] runs all of the above from one configuration
//!
//! ## Example: recording to ROS bag
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use vidimu::pipeline::{Pipeline, PipelineConfig, Recording};
//!
//! let config = PipelineConfig {
//!     subsample: 2,
//!     ..Default::default()
//! };
//! let pipeline = Pipeline::new(config)?;
//! let recording = Recording::open("session", &pipeline)?;
//! let report = pipeline.export_bag(
//!     recording.metadata(),
//!     recording.frame_source()?,
//!     recording.result_dir("rosbag").join("recording.bag"),
//! )?;
//! if let Some(warning) = &report.warning {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use core::{Resolution, Result, VidimuError};

pub mod metadata;

pub use metadata::RecordingMetadata;

pub mod align;

pub use align::{align, AlignedFrame, FrameAligner, PartialAlignmentWarning};

pub mod timeline;

pub use timeline::{multiplex, TimelineEvent};

pub mod geometry;

pub use geometry::CalibrationDescriptor;

pub mod io;

pub mod stats;

pub mod pipeline;

pub use pipeline::{ExportReport, Pipeline, PipelineConfig, Recording};
