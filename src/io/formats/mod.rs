// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Output file formats.
//!
//! - [`bag`]: ROS1 bag container for the merged timeline
//! - [`images`]: PNG image sequences
//! - [`kalibr`]: Kalibr camchain/IMU/target configuration
//! - [`lth`]: LTH-vision data files
//! - [`yaml`]: Kalibr and OpenCV YAML layouts

pub mod bag;
pub mod images;
pub mod kalibr;
pub mod lth;
pub mod yaml;
