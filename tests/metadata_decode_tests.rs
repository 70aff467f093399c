// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata container decoding tests.

mod common;

use prost::Message;

use vidimu::core::Resolution;
use vidimu::metadata::{decode, proto, DecodeOptions, DumpFormat, MetadataDecoder, RecordingMetadata};
use vidimu::VidimuError;

#[test]
fn test_streamed_container_equals_single_message() {
    let data = common::capture(5, 40);
    let merged = decode(&common::encode_streamed(&data)).unwrap();
    let single = decode(&data.encode_to_vec()).unwrap();
    assert_eq!(merged, single);
    assert_eq!(merged.video_frames.len(), 5);
    assert_eq!(merged.imu_samples.len(), 40);
}

#[test]
fn test_decoded_fields() {
    let meta = common::metadata(3, 10);

    assert_eq!(meta.recording_start_ns, Some(1_700_000_000_000_000_000));
    assert_eq!(meta.camera.resolution, Resolution::new(common::WIDTH, common::HEIGHT));

    let k = meta.camera.intrinsics.unwrap();
    assert_eq!(k.to_array(), [6.0, 6.5, 4.0, 3.0]);
    assert_eq!(meta.camera.distortion.len(), 5);
    assert!(meta.camera.lens_pose.is_some());
    assert_eq!(meta.imu_meta.sample_frequency, 200.0);
    assert_eq!(meta.imu_meta.gyro_info, "test gyro");

    let frame = &meta.video_frames[2];
    assert_eq!(frame.time_ns, (common::T0_NS + 2 * common::FRAME_PERIOD_NS) as u64);
    assert_eq!(frame.frame_number, 2);
    assert_eq!(frame.ois_samples.len(), 1);

    let sample = &meta.imu_samples[9];
    assert_eq!(sample.time_ns, (common::T0_NS + 9 * common::IMU_PERIOD_NS) as u64);
    assert!((sample.accel[2] - 9.81).abs() < 1e-5);
    assert_eq!(sample.gyro_accuracy, 3);
    assert_eq!(sample.mag, None);
}

#[test]
fn test_streams_are_ordered() {
    let meta = common::metadata(10, 100);
    meta.check_ordering().unwrap();
}

#[test]
fn test_out_of_order_imu_is_reported() {
    let mut data = common::capture(2, 3);
    data.imu.swap(0, 2);
    let meta = decode(&data.encode_to_vec()).unwrap();
    let err = meta.check_ordering().unwrap_err();
    assert!(matches!(err, VidimuError::Validation { .. }));
}

#[test]
fn test_missing_imu_meta_fails() {
    let mut data = common::capture(2, 2);
    data.imu_meta = None;
    let err = decode(&data.encode_to_vec()).unwrap_err();
    assert!(matches!(err, VidimuError::Decode { .. }));
}

#[test]
fn test_out_of_range_start_time_fails() {
    for seconds in [i64::MAX / 2, i64::MIN / 2] {
        let mut data = common::capture(1, 1);
        data.time = Some(prost_types::Timestamp { seconds, nanos: 0 });
        let err = decode(&data.encode_to_vec()).unwrap_err();
        assert!(matches!(err, VidimuError::Decode { .. }), "{seconds}: {err}");
    }

    let mut data = common::capture(1, 1);
    data.time = Some(prost_types::Timestamp {
        seconds: -2,
        nanos: 500,
    });
    let meta = decode(&data.encode_to_vec()).unwrap();
    assert_eq!(meta.recording_start_ns, Some(-1_999_999_500));
}

#[test]
fn test_garbage_input_fails() {
    let err = decode(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap_err();
    assert!(matches!(err, VidimuError::Decode { .. }));
}

#[test]
fn test_wrong_intrinsic_count_fails() {
    let mut data = common::capture(1, 1);
    data.camera_meta.as_mut().unwrap().intrinsic_params = vec![1.0, 2.0, 3.0];
    let err = decode(&data.encode_to_vec()).unwrap_err();
    assert!(matches!(err, VidimuError::Decode { .. }));
}

#[test]
fn test_reserved_intrinsic_option() {
    let mut data = common::capture(1, 1);
    data.camera_meta.as_mut().unwrap().intrinsic_params[4] = 2.0;
    let bytes = data.encode_to_vec();

    assert!(matches!(
        decode(&bytes).unwrap_err(),
        VidimuError::Validation { .. }
    ));
    let lenient = MetadataDecoder::new(DecodeOptions {
        require_zero_reserved_intrinsic: false,
    });
    assert!(lenient.decode(&bytes).is_ok());
}

#[test]
fn test_missing_intrinsics_and_pose_are_optional() {
    let mut data = common::capture(1, 1);
    let camera = data.camera_meta.as_mut().unwrap();
    camera.intrinsic_params.clear();
    camera.lens_pose_rotation.clear();
    camera.lens_pose_translation.clear();

    let meta = decode(&data.encode_to_vec()).unwrap();
    assert_eq!(meta.camera.intrinsics, None);
    assert_eq!(meta.camera.lens_pose, None);
}

#[test]
fn test_lens_pose_length_mismatch_fails() {
    let mut data = common::capture(1, 1);
    data.camera_meta.as_mut().unwrap().lens_pose_translation = vec![0.0, 0.0];
    assert!(decode(&data.encode_to_vec()).is_err());
}

#[test]
fn test_negative_imu_time_fails() {
    let mut data = common::capture(1, 2);
    data.imu[1].time_ns = -1;
    let err = decode(&data.encode_to_vec()).unwrap_err();
    assert!(err.to_string().contains("imu[1]"));
}

#[test]
fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    common::write_recording(dir.path(), &common::capture(4, 8));
    let meta = RecordingMetadata::from_file(dir.path().join("video_meta.pb3")).unwrap();
    assert_eq!(meta.video_frames.len(), 4);

    let missing = RecordingMetadata::from_file(dir.path().join("nope.pb3")).unwrap_err();
    assert!(matches!(missing, VidimuError::Io { .. }));
}

#[test]
fn test_dump_json_lists_all_frames() {
    let meta = common::metadata(3, 0);
    let json: serde_json::Value =
        serde_json::from_str(&meta.dump(DumpFormat::Json).unwrap()).unwrap();
    assert_eq!(json["video_frames"].as_array().unwrap().len(), 3);
    assert_eq!(json["imu_meta"]["sample_frequency"], 200.0);
}

#[test]
fn test_empty_streams() {
    let data = proto::VideoCaptureData {
        camera_meta: Some(common::camera_info()),
        imu_meta: Some(common::imu_info()),
        ..Default::default()
    };
    let meta = decode(&data.encode_to_vec()).unwrap();
    assert!(meta.video_frames.is_empty());
    assert!(meta.imu_samples.is_empty());
    assert_eq!(meta.recording_start_ns, None);
    meta.check_ordering().unwrap();
}
