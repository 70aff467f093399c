// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::f32::consts::FRAC_1_SQRT_2;
use std::path::Path;

use prost::Message;

use vidimu::align::{Frame, PixelFormat};
use vidimu::metadata::proto;
use vidimu::metadata::{decode, RecordingMetadata};
use vidimu::pipeline::METADATA_FILE;

/// First frame timestamp of every fixture.
pub const T0_NS: i64 = 1_000_000_000;
/// Frame period (30 fps).
pub const FRAME_PERIOD_NS: i64 = 33_333_333;
/// IMU period (200 Hz).
pub const IMU_PERIOD_NS: i64 = 5_000_000;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

pub fn camera_info() -> proto::CameraInfo {
    proto::CameraInfo {
        intrinsic_params: vec![6.0, 6.5, 4.0, 3.0, 0.0],
        distortion_params: vec![0.1, -0.05, 0.002, 0.001, -0.001],
        // 90 degrees about z
        lens_pose_rotation: vec![0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2],
        lens_pose_translation: vec![0.01, -0.02, 0.005],
        resolution: Some(proto::Size {
            width: WIDTH as i32,
            height: HEIGHT as i32,
        }),
        ..Default::default()
    }
}

pub fn imu_info() -> proto::ImuInfo {
    proto::ImuInfo {
        gyro_info: "test gyro".to_string(),
        accel_info: "test accel".to_string(),
        sample_frequency: 200.0,
        ..Default::default()
    }
}

pub fn frame_meta(index: usize) -> proto::VideoFrameMetaData {
    proto::VideoFrameMetaData {
        time_ns: T0_NS + index as i64 * FRAME_PERIOD_NS,
        frame_number: index as i64,
        exposure_time_ns: 10_000_000,
        frame_duration_ns: FRAME_PERIOD_NS,
        est_focal_length_pix: 6.2,
        ois_samples: vec![proto::OisSample {
            time_ns: T0_NS + index as i64 * FRAME_PERIOD_NS,
            x_shift: 0.5,
            y_shift: -0.5,
        }],
        ..Default::default()
    }
}

pub fn imu_sample(index: usize) -> proto::ImuData {
    let t = index as f32;
    proto::ImuData {
        time_ns: T0_NS + index as i64 * IMU_PERIOD_NS,
        gyro: vec![0.01 * t, 0.0, -0.01],
        accel: vec![0.0, 0.1, 9.81],
        gyro_accuracy: 3,
        accel_accuracy: 3,
        ..Default::default()
    }
}

/// Capture container with `frames` video entries and `imu` samples.
pub fn capture(frames: usize, imu: usize) -> proto::VideoCaptureData {
    proto::VideoCaptureData {
        time: Some(prost_types::Timestamp {
            seconds: 1_700_000_000,
            nanos: 0,
        }),
        camera_meta: Some(camera_info()),
        imu_meta: Some(imu_info()),
        imu: (0..imu).map(imu_sample).collect(),
        video_meta: (0..frames).map(frame_meta).collect(),
    }
}

/// Encode a container the way the recorder does: one message per event,
/// concatenated.
pub fn encode_streamed(data: &proto::VideoCaptureData) -> Vec<u8> {
    let mut bytes = proto::VideoCaptureData {
        time: data.time.clone(),
        camera_meta: data.camera_meta.clone(),
        imu_meta: data.imu_meta.clone(),
        ..Default::default()
    }
    .encode_to_vec();
    for sample in &data.imu {
        bytes.extend(
            proto::VideoCaptureData {
                imu: vec![sample.clone()],
                ..Default::default()
            }
            .encode_to_vec(),
        );
    }
    for frame in &data.video_meta {
        bytes.extend(
            proto::VideoCaptureData {
                video_meta: vec![frame.clone()],
                ..Default::default()
            }
            .encode_to_vec(),
        );
    }
    bytes
}

pub fn metadata(frames: usize, imu: usize) -> RecordingMetadata {
    decode(&capture(frames, imu).encode_to_vec()).expect("fixture decodes")
}

/// Write `video_meta.pb3` into `dir`.
pub fn write_recording(dir: &Path, data: &proto::VideoCaptureData) {
    std::fs::write(dir.join(METADATA_FILE), encode_streamed(data)).expect("write fixture");
}

/// Gray frame whose pixels all equal `value`.
pub fn gray_frame(value: u8, width: u32, height: u32) -> Frame {
    Frame::new(
        vec![value; (width * height) as usize],
        width,
        height,
        PixelFormat::Gray8,
    )
    .expect("valid frame")
}

/// `count` gray frames at fixture resolution; frame `i` has value `i`.
pub fn gray_frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| gray_frame(i as u8, WIDTH, HEIGHT))
        .collect()
}

pub fn rgb_frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let pixels = (0..WIDTH * HEIGHT)
                .flat_map(|_| [i as u8, 100, 200])
                .collect();
            Frame::new(pixels, WIDTH, HEIGHT, PixelFormat::Rgb8).expect("valid frame")
        })
        .collect()
}
