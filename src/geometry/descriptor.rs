// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Calibration descriptors handed to calibration-config sinks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{extrinsics, identity, rescale_intrinsics, QuaternionPolicy, Transform};
use crate::core::{Resolution, Result, VidimuError};
use crate::metadata::RecordingMetadata;

/// Camera calibration in the pinhole/radtan model.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDescriptor {
    /// `[fx, fy, cx, cy]`
    pub intrinsics: [f64; 4],
    /// `[k1, k2, p1, p2]`
    pub distortion: [f64; 4],
    /// `T_cam_imu`, row-major
    pub extrinsics: Transform,
    pub resolution: Resolution,
    pub rostopic: String,
    pub timeshift_cam_imu: f64,
}

/// Inputs to [`CalibrationDescriptor::from_metadata`] besides the record.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorOptions {
    pub quaternion: QuaternionPolicy,
    pub quaternion_tolerance: f64,
    pub rostopic: String,
}

impl Default for DescriptorOptions {
    fn default() -> Self {
        Self {
            quaternion: QuaternionPolicy::Reject,
            quaternion_tolerance: super::DEFAULT_QUATERNION_TOLERANCE,
            rostopic: "/cam0/image_raw".to_string(),
        }
    }
}

impl CalibrationDescriptor {
    /// Build the descriptor for the capture resolution.
    ///
    /// `matlab` replaces the device intrinsics and distortion when given.
    /// A recording without a lens pose gets the identity transform.
    pub fn from_metadata(
        metadata: &RecordingMetadata,
        options: &DescriptorOptions,
        matlab: Option<&MatlabCalibration>,
    ) -> Result<Self> {
        let camera = &metadata.camera;

        let extrinsics = match &camera.lens_pose {
            Some(pose) => extrinsics(
                pose.rotation,
                pose.translation,
                options.quaternion,
                options.quaternion_tolerance,
            )?,
            None => {
                tracing::warn!(
                    context = "calibration",
                    "Recording has no lens pose, using identity T_cam_imu"
                );
                identity()
            }
        };

        let (intrinsics, distortion) = match matlab {
            Some(m) => (m.intrinsics, m.distortion()),
            None => {
                let intrinsics = camera.intrinsics.ok_or_else(|| {
                    VidimuError::validation(
                        "camera intrinsics are present",
                        "recording has no intrinsic calibration and no override was given",
                    )
                })?;
                (intrinsics.to_array(), radtan_from_device(&camera.distortion)?)
            }
        };

        if let Some(estimated) = metadata.first_est_focal_length() {
            tracing::info!(
                estimated_focal_length = estimated,
                fx = intrinsics[0],
                fy = intrinsics[1],
                "Focal length: estimated vs supplied"
            );
        }

        Ok(Self {
            intrinsics,
            distortion,
            extrinsics,
            resolution: camera.resolution,
            rostopic: options.rostopic.clone(),
            timeshift_cam_imu: 0.0,
        })
    }

    /// Copy of this descriptor for frames resized to `target`.
    pub fn with_resolution(&self, target: Resolution) -> Result<Self> {
        Ok(Self {
            intrinsics: rescale_intrinsics(self.intrinsics, self.resolution, target)?,
            resolution: target,
            ..self.clone()
        })
    }

    /// Upper-left 3x3 block of the extrinsics.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let m = &self.extrinsics;
        [
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ]
    }
}

/// Map a device distortion vector to radtan `[k1, k2, p1, p2]`.
///
/// Devices report `[k1, k2, k3, p1, p2]`; `k3` has no place in the radtan
/// model and is dropped. Four values are taken as already radtan and an
/// empty vector means no distortion.
pub fn radtan_from_device(distortion: &[f64]) -> Result<[f64; 4]> {
    match *distortion {
        [] => Ok([0.0; 4]),
        [k1, k2, p1, p2] => Ok([k1, k2, p1, p2]),
        [k1, k2, k3, p1, p2] => {
            if k3 != 0.0 {
                tracing::debug!(k3, "Dropping k3 from radtan distortion");
            }
            Ok([k1, k2, p1, p2])
        }
        _ => Err(VidimuError::validation(
            "distortion has 0, 4 or 5 coefficients",
            format!("got {} coefficients", distortion.len()),
        )),
    }
}

/// Camera calibration exported from the Matlab calibration toolbox.
///
/// Text format: three comma-separated rows holding the intrinsics
/// `fx, fy, cx, cy`, the radial coefficients (`k1, k2[, k3]`) and the
/// tangential coefficients `p1, p2`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatlabCalibration {
    pub intrinsics: [f64; 4],
    pub radial: [f64; 2],
    pub tangential: [f64; 2],
}

impl MatlabCalibration {
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(n, line)| parse_row(n, line));

        let mut next_row = |name: &str| {
            rows.next().unwrap_or_else(|| {
                Err(VidimuError::config(
                    "matlab_calibration",
                    format!("missing {name} row"),
                ))
            })
        };

        let intrinsics = next_row("intrinsics")?;
        let radial = next_row("radial distortion")?;
        let tangential = next_row("tangential distortion")?;

        let intrinsics: [f64; 4] = intrinsics.as_slice().try_into().map_err(|_| {
            VidimuError::config(
                "matlab_calibration",
                format!("expected 4 intrinsics, got {}", intrinsics.len()),
            )
        })?;
        let radial = match *radial.as_slice() {
            [k1, k2] | [k1, k2, _] => [k1, k2],
            _ => {
                return Err(VidimuError::config(
                    "matlab_calibration",
                    format!("expected 2 or 3 radial coefficients, got {}", radial.len()),
                ))
            }
        };
        let tangential: [f64; 2] = tangential.as_slice().try_into().map_err(|_| {
            VidimuError::config(
                "matlab_calibration",
                format!("expected 2 tangential coefficients, got {}", tangential.len()),
            )
        })?;

        Ok(Self {
            intrinsics,
            radial,
            tangential,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VidimuError::io(
                "MatlabCalibration::load",
                format!("Failed to read {}: {e}", path.display()),
            )
        })?;
        Self::parse(&text)
    }

    /// `[k1, k2, p1, p2]`
    pub fn distortion(&self) -> [f64; 4] {
        [
            self.radial[0],
            self.radial[1],
            self.tangential[0],
            self.tangential[1],
        ]
    }
}

fn parse_row(line_no: usize, line: &str) -> Result<Vec<f64>> {
    line.split(',')
        .map(|v| {
            v.trim().parse::<f64>().map_err(|e| {
                VidimuError::config(
                    "matlab_calibration",
                    format!("row {}: '{}' is not a number: {e}", line_no + 1, v.trim()),
                )
            })
        })
        .collect()
}

/// IMU noise model, Kalibr `imu.yaml` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuCalibration {
    pub accelerometer_noise_density: f64,
    pub accelerometer_random_walk: f64,
    pub gyroscope_noise_density: f64,
    pub gyroscope_random_walk: f64,
    pub rostopic: String,
    /// Hz
    pub update_rate: f64,
}

/// IMU noise densities and bias random walks.
///
/// Defaults are the Pixel 3 IMU datasheet values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuNoise {
    pub accelerometer_noise_density: f64,
    pub accelerometer_random_walk: f64,
    pub gyroscope_noise_density: f64,
    pub gyroscope_random_walk: f64,
}

impl Default for ImuNoise {
    fn default() -> Self {
        let accel = 9.8 * 180e-6;
        let gyro = 0.007 * std::f64::consts::PI / 180.0;
        Self {
            accelerometer_noise_density: accel,
            accelerometer_random_walk: accel,
            gyroscope_noise_density: gyro,
            gyroscope_random_walk: gyro,
        }
    }
}

impl ImuCalibration {
    pub fn from_metadata(metadata: &RecordingMetadata, noise: &ImuNoise, rostopic: &str) -> Self {
        Self {
            accelerometer_noise_density: noise.accelerometer_noise_density,
            accelerometer_random_walk: noise.accelerometer_random_walk,
            gyroscope_noise_density: noise.gyroscope_noise_density,
            gyroscope_random_walk: noise.gyroscope_random_walk,
            rostopic: rostopic.to_string(),
            update_rate: metadata.imu_meta.sample_frequency,
        }
    }
}

/// Calibration target, Kalibr `target.yaml` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGrid {
    pub target_type: String,
    #[serde(rename = "tagCols")]
    pub tag_cols: u32,
    #[serde(rename = "tagRows")]
    pub tag_rows: u32,
    /// Edge length of one tag in meters
    #[serde(rename = "tagSize")]
    pub tag_size: f64,
    /// Gap between tags as a fraction of the tag size
    #[serde(rename = "tagSpacing")]
    pub tag_spacing: f64,
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self {
            target_type: "aprilgrid".to_string(),
            tag_cols: 6,
            tag_rows: 6,
            tag_size: 24e-3,
            tag_spacing: 0.3,
        }
    }
}
