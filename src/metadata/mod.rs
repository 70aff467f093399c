// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Typed, immutable recording metadata.
//!
//! [`RecordingMetadata`] is produced once per run by the
//! [`MetadataDecoder`] and never mutated afterwards. The wire schema lives
//! in [`proto`].

pub mod decoder;
pub mod proto;

pub use decoder::{decode, DecodeOptions, MetadataDecoder};

use std::path::Path;

use serde::Serialize;

use crate::core::{Resolution, Result, VidimuError};

/// Pinhole intrinsics: focal lengths and principal point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Create intrinsics from `[fx, fy, cx, cy]`.
    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            fx: values[0],
            fy: values[1],
            cx: values[2],
            cy: values[3],
        }
    }

    /// `[fx, fy, cx, cy]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.fx, self.fy, self.cx, self.cy]
    }
}

/// Pose of the lens relative to the device sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LensPose {
    /// Quaternion in scalar-last order `(x, y, z, w)`
    pub rotation: [f64; 4],
    pub translation: [f64; 3],
}

/// Static camera characteristics of the recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraMeta {
    /// `None` when the device did not report calibration
    pub intrinsics: Option<Intrinsics>,
    /// Raw distortion vector as reported by the device (`k1, k2, k3, p1, p2`)
    pub distortion: Vec<f64>,
    pub lens_pose: Option<LensPose>,
    pub resolution: Resolution,
    pub focus_calibration: i32,
    pub timestamp_source: i32,
}

/// IMU sensor description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuMeta {
    /// Sample frequency in Hz
    pub sample_frequency: f64,
    pub gyro_info: String,
    pub gyro_resolution: f64,
    pub accel_info: String,
    pub accel_resolution: f64,
    pub mag_info: String,
    pub mag_resolution: f64,
    pub placement: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OisSample {
    pub time_ns: u64,
    pub x_shift: f64,
    pub y_shift: f64,
}

/// Capture result of a single video frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoFrameMeta {
    pub time_ns: u64,
    pub frame_number: i64,
    pub exposure_time_ns: i64,
    pub frame_duration_ns: i64,
    pub frame_readout_ns: i64,
    pub iso: i32,
    pub focal_length_mm: f64,
    pub est_focal_length_pix: f64,
    pub focus_distance_diopters: f64,
    pub focus_locked: bool,
    pub ois_samples: Vec<OisSample>,
}

/// One IMU sample with gyro and interpolated accelerometer readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuSample {
    pub time_ns: u64,
    /// Linear acceleration (m/s^2)
    pub accel: [f64; 3],
    /// Angular velocity (rad/s)
    pub gyro: [f64; 3],
    pub accel_accuracy: i32,
    pub gyro_accuracy: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accel_bias: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyro_drift: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag: Option<[f64; 3]>,
}

/// Fully decoded recording metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingMetadata {
    /// Wall-clock start of the recording, nanoseconds since the Unix epoch
    pub recording_start_ns: Option<i64>,
    pub camera: CameraMeta,
    pub imu_meta: ImuMeta,
    pub video_frames: Vec<VideoFrameMeta>,
    pub imu_samples: Vec<ImuSample>,
}

impl RecordingMetadata {
    /// Read and decode a metadata file with default options.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with(path, &DecodeOptions::default())
    }

    /// Read and decode a metadata file.
    pub fn from_file_with<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VidimuError::io(
                "RecordingMetadata::from_file",
                format!("Failed to read {}: {e}", path.display()),
            )
        })?;
        MetadataDecoder::new(options.clone()).decode(&bytes)
    }

    /// Verify that both streams are non-decreasing in `time_ns`.
    pub fn check_ordering(&self) -> Result<()> {
        check_non_decreasing("video_frames", self.video_frames.iter().map(|f| f.time_ns))?;
        check_non_decreasing("imu_samples", self.imu_samples.iter().map(|s| s.time_ns))
    }

    /// Estimated focal length reported with the first frame.
    pub fn first_est_focal_length(&self) -> Option<f64> {
        self.video_frames.first().map(|f| f.est_focal_length_pix)
    }

    /// Serialize the whole record for inspection.
    pub fn dump(&self, format: DumpFormat) -> Result<String> {
        match format {
            DumpFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| VidimuError::sink("metadata dump", e.to_string())),
            DumpFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| VidimuError::sink("metadata dump", e.to_string())),
        }
    }
}

/// Text format of [`RecordingMetadata::dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DumpFormat {
    #[default]
    Yaml,
    Json,
}

fn check_non_decreasing(stream: &str, times: impl Iterator<Item = u64>) -> Result<()> {
    let mut previous: Option<u64> = None;
    for (index, time_ns) in times.enumerate() {
        if let Some(prev) = previous {
            if time_ns < prev {
                return Err(VidimuError::validation(
                    format!("{stream} time_ns is non-decreasing"),
                    format!("entry {index} at {time_ns} ns precedes previous {prev} ns"),
                ));
            }
        }
        previous = Some(time_ns);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time_ns: u64) -> VideoFrameMeta {
        VideoFrameMeta {
            time_ns,
            frame_number: 0,
            exposure_time_ns: 0,
            frame_duration_ns: 0,
            frame_readout_ns: 0,
            iso: 0,
            focal_length_mm: 0.0,
            est_focal_length_pix: 0.0,
            focus_distance_diopters: 0.0,
            focus_locked: false,
            ois_samples: Vec::new(),
        }
    }

    fn metadata(frames: Vec<VideoFrameMeta>) -> RecordingMetadata {
        RecordingMetadata {
            recording_start_ns: None,
            camera: CameraMeta {
                intrinsics: None,
                distortion: Vec::new(),
                lens_pose: None,
                resolution: Resolution::new(4, 4),
                focus_calibration: 0,
                timestamp_source: 0,
            },
            imu_meta: ImuMeta {
                sample_frequency: 100.0,
                gyro_info: String::new(),
                gyro_resolution: 0.0,
                accel_info: String::new(),
                accel_resolution: 0.0,
                mag_info: String::new(),
                mag_resolution: 0.0,
                placement: Vec::new(),
            },
            video_frames: frames,
            imu_samples: Vec::new(),
        }
    }

    #[test]
    fn test_dump_formats() {
        let meta = metadata(vec![frame(1), frame(2)]);
        let yaml = meta.dump(DumpFormat::Yaml).unwrap();
        assert!(yaml.contains("video_frames:"));
        assert!(yaml.contains("sample_frequency: 100.0"));
        let json: serde_json::Value =
            serde_json::from_str(&meta.dump(DumpFormat::Json).unwrap()).unwrap();
        assert_eq!(json["video_frames"][1]["time_ns"], 2);
        assert_eq!(json["camera"]["resolution"]["width"], 4);
    }

    #[test]
    fn test_check_ordering_accepts_ties() {
        let meta = metadata(vec![frame(1), frame(1), frame(5)]);
        assert!(meta.check_ordering().is_ok());
    }

    #[test]
    fn test_check_ordering_rejects_regression() {
        let meta = metadata(vec![frame(1), frame(7), frame(5)]);
        let err = meta.check_ordering().unwrap_err();
        assert!(matches!(err, VidimuError::Validation { .. }));
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn test_intrinsics_array_round_trip() {
        let k = Intrinsics::from_array([500.0, 501.0, 320.0, 240.0]);
        assert_eq!(k.fy, 501.0);
        assert_eq!(k.to_array(), [500.0, 501.0, 320.0, 240.0]);
    }
}
