// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Protobuf wire schema of the recording metadata container.
//!
//! The recorder appends one partial [`VideoCaptureData`] per event, so a
//! recording file is a concatenation of encoded messages. Decoding the whole
//! byte slice as one message merges them: repeated fields append and
//! singular sub-messages merge field by field.
//!
//! These structs are also used by tests to build fixture blobs.

/// Capture resolution.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Size {
    #[prost(int32, tag = "1")]
    pub width: i32,
    #[prost(int32, tag = "2")]
    pub height: i32,
}

/// Static camera characteristics.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CameraInfo {
    /// fx, fy, cx, cy, s (s is reserved and expected to be zero)
    #[prost(float, repeated, tag = "1")]
    pub intrinsic_params: Vec<f32>,
    /// k1, k2, k3, p1, p2
    #[prost(float, repeated, tag = "2")]
    pub distortion_params: Vec<f32>,
    /// Unit quaternion, scalar last (x, y, z, w)
    #[prost(float, repeated, tag = "3")]
    pub lens_pose_rotation: Vec<f32>,
    #[prost(float, repeated, tag = "4")]
    pub lens_pose_translation: Vec<f32>,
    #[prost(message, optional, tag = "5")]
    pub resolution: Option<Size>,
    #[prost(int32, tag = "6")]
    pub focus_calibration: i32,
    #[prost(int32, tag = "7")]
    pub timestamp_source: i32,
}

/// IMU sensor description.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImuInfo {
    #[prost(string, tag = "1")]
    pub gyro_info: String,
    #[prost(float, tag = "2")]
    pub gyro_resolution: f32,
    #[prost(string, tag = "3")]
    pub accel_info: String,
    #[prost(float, tag = "4")]
    pub accel_resolution: f32,
    #[prost(float, tag = "5")]
    pub sample_frequency: f32,
    /// Sensor translation in the device frame
    #[prost(float, repeated, tag = "6")]
    pub placement: Vec<f32>,
    #[prost(string, tag = "7")]
    pub mag_info: String,
    #[prost(float, tag = "8")]
    pub mag_resolution: f32,
}

/// One synchronized IMU sample.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImuData {
    #[prost(int64, tag = "1")]
    pub time_ns: i64,
    #[prost(float, repeated, tag = "2")]
    pub gyro: Vec<f32>,
    #[prost(float, repeated, tag = "3")]
    pub gyro_drift: Vec<f32>,
    #[prost(float, repeated, tag = "4")]
    pub accel: Vec<f32>,
    #[prost(float, repeated, tag = "5")]
    pub accel_bias: Vec<f32>,
    #[prost(int32, tag = "6")]
    pub gyro_accuracy: i32,
    #[prost(int32, tag = "7")]
    pub accel_accuracy: i32,
    #[prost(float, repeated, tag = "8")]
    pub mag: Vec<f32>,
    #[prost(float, repeated, tag = "9")]
    pub mag_bias: Vec<f32>,
    #[prost(int32, tag = "10")]
    pub mag_accuracy: i32,
}

/// Optical image stabilization sample.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OisSample {
    #[prost(int64, tag = "1")]
    pub time_ns: i64,
    #[prost(float, tag = "2")]
    pub x_shift: f32,
    #[prost(float, tag = "3")]
    pub y_shift: f32,
}

/// Per-frame capture result.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VideoFrameMetaData {
    #[prost(int64, tag = "1")]
    pub time_ns: i64,
    #[prost(int64, tag = "2")]
    pub frame_number: i64,
    #[prost(int64, tag = "3")]
    pub exposure_time_ns: i64,
    #[prost(int64, tag = "4")]
    pub frame_duration_ns: i64,
    #[prost(int64, tag = "5")]
    pub frame_readout_ns: i64,
    #[prost(int32, tag = "6")]
    pub iso: i32,
    #[prost(float, tag = "7")]
    pub focal_length_mm: f32,
    #[prost(float, tag = "8")]
    pub est_focal_length_pix: f32,
    #[prost(float, tag = "9")]
    pub focus_distance_diopters: f32,
    #[prost(message, repeated, tag = "10")]
    pub ois_samples: Vec<OisSample>,
    #[prost(bool, tag = "11")]
    pub focus_locked: bool,
}

/// Top-level recording container.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VideoCaptureData {
    #[prost(message, optional, tag = "1")]
    pub time: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub camera_meta: Option<CameraInfo>,
    #[prost(message, optional, tag = "3")]
    pub imu_meta: Option<ImuInfo>,
    #[prost(message, repeated, tag = "4")]
    pub imu: Vec<ImuData>,
    #[prost(message, repeated, tag = "5")]
    pub video_meta: Vec<VideoFrameMetaData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_concatenated_messages_merge() {
        let mut bytes = Vec::new();
        VideoCaptureData {
            imu: vec![ImuData {
                time_ns: 1,
                ..Default::default()
            }],
            ..Default::default()
        }
        .encode(&mut bytes)
        .unwrap();
        VideoCaptureData {
            imu: vec![ImuData {
                time_ns: 2,
                ..Default::default()
            }],
            imu_meta: Some(ImuInfo {
                sample_frequency: 200.0,
                ..Default::default()
            }),
            ..Default::default()
        }
        .encode(&mut bytes)
        .unwrap();

        let merged = VideoCaptureData::decode(&bytes[..]).unwrap();
        assert_eq!(merged.imu.len(), 2);
        assert_eq!(merged.imu[1].time_ns, 2);
        assert_eq!(merged.imu_meta.unwrap().sample_frequency, 200.0);
    }
}
