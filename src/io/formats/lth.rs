// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! LTH-vision data files.
//!
//! Three OpenCV-flavor YAML files: `video.data` (frame index and time),
//! `imu.data` (raw IMU samples) and `sync.data` (a zero delay). Times are
//! nanoseconds written as floats.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::yaml::{self, YamlFlavor};
use crate::core::{Result, VidimuError};
use crate::metadata::RecordingMetadata;

pub const VIDEO_FILE: &str = "video.data";
pub const IMU_FILE: &str = "imu.data";
pub const SYNC_FILE: &str = "sync.data";
pub const CALIBRATION_DIR: &str = "calibration";
pub const CALIBRATION_FILE: &str = "calibration.yaml";

#[derive(Serialize)]
struct VideoEntry {
    frame: f64,
    time: f64,
}

#[derive(Serialize)]
struct ImuEntry {
    time: f64,
    accel: [f64; 3],
    gyro: [f64; 3],
    synced: f64,
    time_synced: f64,
}

#[derive(Serialize)]
struct SyncEntry {
    delay: f64,
}

#[derive(Serialize)]
struct VideoData {
    video: Vec<VideoEntry>,
}

#[derive(Serialize)]
struct ImuData {
    imu: Vec<ImuEntry>,
}

#[derive(Serialize)]
struct SyncData {
    sync: Vec<SyncEntry>,
}

/// Paths written by [`write_lth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LthFiles {
    pub video: PathBuf,
    pub imu: PathBuf,
    pub sync: PathBuf,
}

/// Write the three data files into `dir`.
pub fn write_lth(dir: &Path, metadata: &RecordingMetadata) -> Result<LthFiles> {
    let files = LthFiles {
        video: dir.join(VIDEO_FILE),
        imu: dir.join(IMU_FILE),
        sync: dir.join(SYNC_FILE),
    };

    let video = VideoData {
        video: metadata
            .video_frames
            .iter()
            .enumerate()
            .map(|(i, frame)| VideoEntry {
                frame: i as f64,
                time: frame.time_ns as f64,
            })
            .collect(),
    };
    yaml::write_file(&files.video, &video, YamlFlavor::OpenCv)?;

    let imu = ImuData {
        imu: metadata
            .imu_samples
            .iter()
            .map(|sample| ImuEntry {
                time: sample.time_ns as f64,
                accel: sample.accel,
                gyro: sample.gyro,
                synced: 0.0,
                time_synced: 0.0,
            })
            .collect(),
    };
    yaml::write_file(&files.imu, &imu, YamlFlavor::OpenCv)?;

    let sync = SyncData {
        sync: vec![SyncEntry { delay: 0.0 }],
    };
    yaml::write_file(&files.sync, &sync, YamlFlavor::OpenCv)?;

    tracing::info!(
        dir = %dir.display(),
        frames = video.video.len(),
        imu_samples = imu.imu.len(),
        "Wrote LTH data files"
    );
    Ok(files)
}

/// Re-emit a Kalibr calibration as `<dir>/calibration/calibration.yaml`
/// in the OpenCV flavor.
pub fn copy_calibration(kalibr_file: &Path, dir: &Path) -> Result<PathBuf> {
    let document: serde_yaml::Value = yaml::read_file(kalibr_file)?;
    let calib_dir = dir.join(CALIBRATION_DIR);
    std::fs::create_dir_all(&calib_dir).map_err(|e| {
        VidimuError::sink(
            "lth",
            format!("Failed to create {}: {e}", calib_dir.display()),
        )
    })?;
    let target = calib_dir.join(CALIBRATION_FILE);
    yaml::write_file(&target, &document, YamlFlavor::OpenCv)?;
    Ok(target)
}
