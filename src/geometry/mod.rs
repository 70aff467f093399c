// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Calibration geometry.
//!
//! Two pure functions feed the calibration descriptor:
//! - [`extrinsics`] turns the lens pose into the 4x4 `T_cam_imu` transform.
//! - [`rescale_intrinsics`] adapts pinhole intrinsics to a resized output.
//!
//! [`descriptor`] assembles them with distortion into a
//! [`CalibrationDescriptor`].

pub mod descriptor;

pub use descriptor::{CalibrationDescriptor, ImuCalibration, TargetGrid};

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::{Resolution, Result, VidimuError};

/// Row-major 4x4 rigid transform.
pub type Transform = [[f64; 4]; 4];

/// Default accepted deviation of the quaternion norm from 1.
pub const DEFAULT_QUATERNION_TOLERANCE: f64 = 1e-3;

/// What to do with a lens-pose quaternion whose norm is not 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuaternionPolicy {
    /// Fail with a validation error when `|1 - |q|| > tolerance`.
    #[default]
    Reject,
    /// Normalize any non-zero quaternion.
    Normalize,
}

/// The 4x4 identity transform.
pub fn identity() -> Transform {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Build `T_cam_imu` from the lens pose.
///
/// `rotation` is a quaternion in scalar-last order `(x, y, z, w)`. The
/// upper-left block is its rotation matrix `R` and the translation column
/// is `-R * t`, i.e. the matrix maps IMU-frame points into the camera frame.
///
/// Quaternions within `tolerance` of unit norm are normalized before use
/// under either policy.
pub fn extrinsics(
    rotation: [f64; 4],
    translation: [f64; 3],
    policy: QuaternionPolicy,
    tolerance: f64,
) -> Result<Transform> {
    let [x, y, z, w] = rotation;
    let q = Quaternion::new(w, x, y, z);
    let norm = q.norm();

    if !norm.is_finite() || norm <= f64::EPSILON {
        return Err(VidimuError::validation(
            "lens pose quaternion is unit norm",
            format!("quaternion {rotation:?} has norm {norm}"),
        ));
    }
    if policy == QuaternionPolicy::Reject && (norm - 1.0).abs() > tolerance {
        return Err(VidimuError::validation(
            "lens pose quaternion is unit norm",
            format!("quaternion {rotation:?} has norm {norm}, tolerance {tolerance}"),
        ));
    }
    if (norm - 1.0).abs() > tolerance {
        tracing::warn!(
            context = "extrinsics",
            norm,
            "Normalizing non-unit lens pose quaternion"
        );
    }

    let unit = UnitQuaternion::from_quaternion(q);
    let r = unit.to_rotation_matrix();
    let t = -(r * Vector3::new(translation[0], translation[1], translation[2]));

    let mut m = identity();
    for (i, row) in m.iter_mut().take(3).enumerate() {
        for (j, cell) in row.iter_mut().take(3).enumerate() {
            *cell = r[(i, j)];
        }
        row[3] = t[i];
    }
    Ok(m)
}

/// Rescale `[fx, fy, cx, cy]` from `original` to `target` resolution.
///
/// Each axis is handled on its own: `fx` and `cx` scale by
/// `target.width / original.width`, `fy` and `cy` by
/// `target.height / original.height`. An axis whose size is unchanged is
/// left untouched.
pub fn rescale_intrinsics(
    intrinsics: [f64; 4],
    original: Resolution,
    target: Resolution,
) -> Result<[f64; 4]> {
    if original.is_empty() || target.is_empty() {
        return Err(VidimuError::validation(
            "resolutions are non-zero",
            format!("cannot rescale from {original} to {target}"),
        ));
    }

    let [mut fx, mut fy, mut cx, mut cy] = intrinsics;
    if target.width != original.width {
        let sx = f64::from(target.width) / f64::from(original.width);
        fx *= sx;
        cx *= sx;
    }
    if target.height != original.height {
        let sy = f64::from(target.height) / f64::from(original.height);
        fy *= sy;
        cy *= sy;
    }
    Ok([fx, fy, cx, cy])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_quaternion() {
        let m = extrinsics(
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 2.0, 3.0],
            QuaternionPolicy::Reject,
            DEFAULT_QUATERNION_TOLERANCE,
        )
        .unwrap();
        assert_eq!(m[0], [1.0, 0.0, 0.0, -1.0]);
        assert_eq!(m[1], [0.0, 1.0, 0.0, -2.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0, -3.0]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let m = extrinsics(
            [0.0, 0.0, h, h],
            [1.0, 0.0, 0.0],
            QuaternionPolicy::Reject,
            DEFAULT_QUATERNION_TOLERANCE,
        )
        .unwrap();
        // R maps x to y, so -R*t = (0, -1, 0)
        assert!(m[0][3].abs() < 1e-12);
        assert!((m[1][3] + 1.0).abs() < 1e-12);
        assert!((m[0][1] + 1.0).abs() < 1e-12);
        assert!((m[1][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_unit_quaternion_policy() {
        let q = [0.0, 0.0, 0.0, 2.0];
        let rejected = extrinsics(q, [0.0; 3], QuaternionPolicy::Reject, 1e-3);
        assert!(matches!(rejected, Err(VidimuError::Validation { .. })));

        let m = extrinsics(q, [0.0; 3], QuaternionPolicy::Normalize, 1e-3).unwrap();
        assert_eq!(m, identity());

        let zero = extrinsics([0.0; 4], [0.0; 3], QuaternionPolicy::Normalize, 1e-3);
        assert!(zero.is_err());
    }

    #[test]
    fn test_rescale_is_per_axis() {
        let k = [1000.0, 1000.0, 960.0, 540.0];
        let out = rescale_intrinsics(k, Resolution::new(1920, 1080), Resolution::new(960, 1080))
            .unwrap();
        assert_eq!(out, [500.0, 1000.0, 480.0, 540.0]);
    }

    #[test]
    fn test_rescale_rejects_empty() {
        let k = [1.0; 4];
        assert!(rescale_intrinsics(k, Resolution::new(0, 10), Resolution::new(5, 5)).is_err());
    }
}
