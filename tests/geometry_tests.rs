// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Calibration geometry tests.

mod common;

use vidimu::core::Resolution;
use vidimu::geometry::descriptor::{DescriptorOptions, MatlabCalibration};
use vidimu::geometry::{extrinsics, identity, rescale_intrinsics, QuaternionPolicy};
use vidimu::{CalibrationDescriptor, VidimuError};

const TOL: f64 = 1e-9;

fn det3(r: &[[f64; 3]; 3]) -> f64 {
    r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
        - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
        + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
}

fn block(m: &[[f64; 4]; 4]) -> [[f64; 3]; 3] {
    let mut r = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] = m[i][j];
        }
    }
    r
}

#[test]
fn test_extrinsics_rotation_is_orthonormal() {
    let q = [0.1, -0.3, 0.2, 0.927_361_849_549_570_3];
    let t = [0.05, -0.01, 0.02];
    let m = extrinsics(q, t, QuaternionPolicy::Reject, 1e-3).unwrap();
    let r = block(&m);

    for i in 0..3 {
        for j in 0..3 {
            let dot: f64 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((dot - expected).abs() < TOL, "R R^T [{i}][{j}] = {dot}");
        }
    }
    assert!((det3(&r) - 1.0).abs() < TOL);
    assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
}

/// Unit quaternion `[x, y, z, w]` for a rotation of `angle` about `axis`.
fn axis_angle(axis: [f64; 3], angle: f64) -> [f64; 4] {
    let n = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    let s = (angle / 2.0).sin() / n;
    [axis[0] * s, axis[1] * s, axis[2] * s, (angle / 2.0).cos()]
}

/// Rotation matrix of a unit quaternion, written out term by term.
fn quaternion_matrix([x, y, z, w]: [f64; 4]) -> [[f64; 3]; 3] {
    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
        ],
        [
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
        ],
        [
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}

#[test]
fn test_extrinsics_match_closed_form() {
    let cases = [
        (axis_angle([1.0, 2.0, 3.0], 0.7), [0.3, -0.7, 1.1]),
        (axis_angle([-0.4, 0.1, 0.9], 2.5), [0.05, -0.01, 0.02]),
        (axis_angle([0.0, 1.0, -1.0], -1.2), [-2.0, 0.5, 0.0]),
        (axis_angle([0.3, -0.8, 0.2], 3.0), [1.0, 1.0, 1.0]),
        (axis_angle([1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2), [0.0, 0.0, 4.0]),
    ];

    for (q, t) in cases {
        let m = extrinsics(q, t, QuaternionPolicy::Reject, 1e-3).unwrap();
        let r = quaternion_matrix(q);
        for i in 0..3 {
            for j in 0..3 {
                assert!((m[i][j] - r[i][j]).abs() < TOL, "q={q:?} R[{i}][{j}]");
            }
            let expected: f64 = -(0..3).map(|k| r[i][k] * t[k]).sum::<f64>();
            assert!((m[i][3] - expected).abs() < TOL, "q={q:?} t[{i}]");
        }
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }
}

#[test]
fn test_quarter_turn_about_x() {
    // Rotating y onto z: R * (0, 1, 0) = (0, 0, 1).
    let q = axis_angle([1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2);
    let m = extrinsics(q, [0.0, 1.0, 0.0], QuaternionPolicy::Reject, 1e-3).unwrap();
    assert!(m[0][3].abs() < TOL);
    assert!(m[1][3].abs() < TOL);
    assert!((m[2][3] + 1.0).abs() < TOL);
}

#[test]
fn test_identity_quaternion_gives_negated_translation() {
    let m = extrinsics([0.0, 0.0, 0.0, 1.0], [1.0, 2.0, 3.0], QuaternionPolicy::Reject, 1e-3)
        .unwrap();
    let mut expected = identity();
    expected[0][3] = -1.0;
    expected[1][3] = -2.0;
    expected[2][3] = -3.0;
    for i in 0..4 {
        for j in 0..4 {
            assert!((m[i][j] - expected[i][j]).abs() < TOL);
        }
    }
}

#[test]
fn test_non_unit_quaternion_policy() {
    let q = [0.0, 0.0, 0.0, 2.0];
    let err = extrinsics(q, [0.0; 3], QuaternionPolicy::Reject, 1e-3).unwrap_err();
    assert!(matches!(err, VidimuError::Validation { .. }));

    let m = extrinsics(q, [0.0; 3], QuaternionPolicy::Normalize, 1e-3).unwrap();
    assert!((det3(&block(&m)) - 1.0).abs() < TOL);
}

#[test]
fn test_zero_quaternion_fails_under_any_policy() {
    for policy in [QuaternionPolicy::Reject, QuaternionPolicy::Normalize] {
        assert!(extrinsics([0.0; 4], [0.0; 3], policy, 1e-3).is_err());
    }
}

#[test]
fn test_rescale_identity() {
    let k = [1500.0, 1501.0, 959.5, 539.5];
    let r = Resolution::new(1920, 1080);
    assert_eq!(rescale_intrinsics(k, r, r).unwrap(), k);
}

#[test]
fn test_rescale_half() {
    let k = [1500.0, 1501.0, 959.5, 539.5];
    let scaled =
        rescale_intrinsics(k, Resolution::new(1920, 1080), Resolution::new(960, 540)).unwrap();
    assert_eq!(scaled, [750.0, 750.5, 479.75, 269.75]);
}

#[test]
fn test_rescale_axes_independently() {
    let k = [1000.0, 1000.0, 500.0, 400.0];
    let scaled =
        rescale_intrinsics(k, Resolution::new(1000, 800), Resolution::new(500, 800)).unwrap();
    assert_eq!(scaled, [500.0, 1000.0, 250.0, 400.0]);
}

#[test]
fn test_rescale_zero_resolution_fails() {
    let k = [1.0; 4];
    assert!(rescale_intrinsics(k, Resolution::new(0, 10), Resolution::new(5, 5)).is_err());
}

#[test]
fn test_descriptor_from_fixture() {
    let meta = common::metadata(2, 2);
    let d = CalibrationDescriptor::from_metadata(&meta, &DescriptorOptions::default(), None)
        .unwrap();

    assert_eq!(d.intrinsics, [6.0, 6.5, 4.0, 3.0]);
    // k3 is dropped from [k1, k2, k3, p1, p2].
    let expected = [0.1, -0.05, 0.001, -0.001];
    for (got, want) in d.distortion.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6);
    }
    assert_eq!(d.resolution, Resolution::new(common::WIDTH, common::HEIGHT));
    assert_eq!(d.rostopic, "/cam0/image_raw");

    // 90 degrees about z
    let r = d.rotation();
    assert!((r[0][1] + 1.0).abs() < 1e-6);
    assert!((r[1][0] - 1.0).abs() < 1e-6);
    assert!((det3(&r) - 1.0).abs() < 1e-6);
}

#[test]
fn test_descriptor_with_matlab_override() {
    let mut data = common::capture(1, 1);
    data.camera_meta.as_mut().unwrap().intrinsic_params.clear();
    let meta = vidimu::metadata::decode(&prost::Message::encode_to_vec(&data)).unwrap();

    let err = CalibrationDescriptor::from_metadata(&meta, &DescriptorOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, VidimuError::Validation { .. }));

    let matlab = MatlabCalibration::parse("7.0, 7.5, 4.1, 2.9\n0.2, -0.1, 0.01\n0.003, 0.004\n")
        .unwrap();
    let options = DescriptorOptions::default();
    let d = CalibrationDescriptor::from_metadata(&meta, &options, Some(&matlab)).unwrap();
    assert_eq!(d.intrinsics, [7.0, 7.5, 4.1, 2.9]);
    assert_eq!(d.distortion, [0.2, -0.1, 0.003, 0.004]);
}

#[test]
fn test_missing_lens_pose_is_identity() {
    let mut data = common::capture(1, 1);
    let camera = data.camera_meta.as_mut().unwrap();
    camera.lens_pose_rotation.clear();
    camera.lens_pose_translation.clear();
    let meta = vidimu::metadata::decode(&prost::Message::encode_to_vec(&data)).unwrap();

    let d = CalibrationDescriptor::from_metadata(&meta, &DescriptorOptions::default(), None)
        .unwrap();
    assert_eq!(d.extrinsics, identity());
}

#[test]
fn test_descriptor_with_resolution() {
    let meta = common::metadata(1, 1);
    let d = CalibrationDescriptor::from_metadata(&meta, &DescriptorOptions::default(), None)
        .unwrap();
    let half = d.with_resolution(Resolution::new(4, 3)).unwrap();

    assert_eq!(half.resolution, Resolution::new(4, 3));
    assert_eq!(half.intrinsics, [3.0, 3.25, 2.0, 1.5]);
    assert_eq!(half.distortion, d.distortion);
    assert_eq!(half.extrinsics, d.extrinsics);
}

#[test]
fn test_matlab_parse_errors() {
    assert!(MatlabCalibration::parse("1, 2, 3\n0.1, 0.2\n0.0, 0.0").is_err());
    assert!(MatlabCalibration::parse("1, 2, 3, 4\n0.1, 0.2").is_err());
    assert!(MatlabCalibration::parse("1, 2, x, 4\n0.1, 0.2\n0.0, 0.0").is_err());
}
