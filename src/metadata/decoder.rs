// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata container decoder.
//!
//! Decoding is all-or-nothing: the wire message is decoded with `prost`
//! first, then converted into [`RecordingMetadata`] field by field. Any
//! structural problem aborts with [`VidimuError::Decode`] before a record is
//! returned, so callers never observe a partially populated structure.

use prost::Message;

use super::proto;
use super::{
    CameraMeta, ImuMeta, ImuSample, Intrinsics, LensPose, OisSample, RecordingMetadata,
    VideoFrameMeta,
};
use crate::core::{Resolution, Result, VidimuError, NSECS_IN_SEC};

/// Options controlling metadata validation.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Reject recordings whose reserved 5th intrinsic parameter is non-zero
    pub require_zero_reserved_intrinsic: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            require_zero_reserved_intrinsic: true,
        }
    }
}

/// Decoder for the recording metadata container.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use vidimu::metadata::MetadataDecoder;
///
/// let bytes = std::fs::read("video_meta.pb3")?;
/// let metadata = MetadataDecoder::default().decode(&bytes)?;
/// println!("{} frames", metadata.video_frames.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataDecoder {
    options: DecodeOptions,
}

/// Decode a metadata container with default options.
pub fn decode(bytes: &[u8]) -> Result<RecordingMetadata> {
    MetadataDecoder::default().decode(bytes)
}

impl MetadataDecoder {
    /// Create a decoder with the given options.
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    /// Decode a metadata container.
    pub fn decode(&self, bytes: &[u8]) -> Result<RecordingMetadata> {
        let raw = proto::VideoCaptureData::decode(bytes)?;

        let camera_raw = raw
            .camera_meta
            .ok_or_else(|| VidimuError::decode("VideoCaptureData", "missing camera_meta"))?;
        let imu_raw = raw
            .imu_meta
            .ok_or_else(|| VidimuError::decode("VideoCaptureData", "missing imu_meta"))?;

        let camera = self.convert_camera(camera_raw)?;
        let imu_meta = convert_imu_meta(imu_raw);

        let video_frames = raw
            .video_meta
            .into_iter()
            .enumerate()
            .map(|(i, f)| convert_frame(i, f))
            .collect::<Result<Vec<_>>>()?;

        let imu_samples = raw
            .imu
            .into_iter()
            .enumerate()
            .map(|(i, s)| convert_imu_sample(i, s))
            .collect::<Result<Vec<_>>>()?;

        let recording_start_ns = raw.time.map(timestamp_ns).transpose()?;

        tracing::debug!(
            frames = video_frames.len(),
            imu_samples = imu_samples.len(),
            resolution = %camera.resolution,
            "Decoded recording metadata"
        );

        Ok(RecordingMetadata {
            recording_start_ns,
            camera,
            imu_meta,
            video_frames,
            imu_samples,
        })
    }

    fn convert_camera(&self, raw: proto::CameraInfo) -> Result<CameraMeta> {
        let size = raw
            .resolution
            .ok_or_else(|| VidimuError::decode("CameraInfo", "missing resolution"))?;
        if size.width <= 0 || size.height <= 0 {
            return Err(VidimuError::decode(
                "CameraInfo",
                format!("invalid resolution {}x{}", size.width, size.height),
            ));
        }
        let resolution = Resolution::new(size.width as u32, size.height as u32);

        let intrinsics = match raw.intrinsic_params.len() {
            0 => None,
            4 | 5 => {
                let p = &raw.intrinsic_params;
                if let Some(&reserved) = p.get(4) {
                    if self.options.require_zero_reserved_intrinsic && reserved != 0.0 {
                        return Err(VidimuError::validation(
                            "reserved 5th intrinsic parameter is zero",
                            format!("found {reserved}"),
                        ));
                    }
                }
                Some(Intrinsics::from_array([
                    f64::from(p[0]),
                    f64::from(p[1]),
                    f64::from(p[2]),
                    f64::from(p[3]),
                ]))
            }
            n => {
                return Err(VidimuError::decode(
                    "CameraInfo.intrinsic_params",
                    format!("expected 0, 4 or 5 values, got {n}"),
                ))
            }
        };

        let lens_pose = match (
            raw.lens_pose_rotation.len(),
            raw.lens_pose_translation.len(),
        ) {
            (0, 0) => None,
            (4, 3) => Some(LensPose {
                rotation: to_array(&raw.lens_pose_rotation),
                translation: to_array(&raw.lens_pose_translation),
            }),
            (r, t) => {
                return Err(VidimuError::decode(
                    "CameraInfo.lens_pose",
                    format!("expected 4 rotation and 3 translation values, got {r} and {t}"),
                ))
            }
        };

        Ok(CameraMeta {
            intrinsics,
            distortion: raw.distortion_params.iter().map(|&v| f64::from(v)).collect(),
            lens_pose,
            resolution,
            focus_calibration: raw.focus_calibration,
            timestamp_source: raw.timestamp_source,
        })
    }
}

fn convert_imu_meta(raw: proto::ImuInfo) -> ImuMeta {
    ImuMeta {
        sample_frequency: f64::from(raw.sample_frequency),
        gyro_info: raw.gyro_info,
        gyro_resolution: f64::from(raw.gyro_resolution),
        accel_info: raw.accel_info,
        accel_resolution: f64::from(raw.accel_resolution),
        mag_info: raw.mag_info,
        mag_resolution: f64::from(raw.mag_resolution),
        placement: raw.placement.iter().map(|&v| f64::from(v)).collect(),
    }
}

fn convert_frame(index: usize, raw: proto::VideoFrameMetaData) -> Result<VideoFrameMeta> {
    let context = || format!("video_meta[{index}]");
    let ois_samples = raw
        .ois_samples
        .iter()
        .map(|s| {
            Ok(OisSample {
                time_ns: to_time_ns(s.time_ns, &context)?,
                x_shift: f64::from(s.x_shift),
                y_shift: f64::from(s.y_shift),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VideoFrameMeta {
        time_ns: to_time_ns(raw.time_ns, &context)?,
        frame_number: raw.frame_number,
        exposure_time_ns: raw.exposure_time_ns,
        frame_duration_ns: raw.frame_duration_ns,
        frame_readout_ns: raw.frame_readout_ns,
        iso: raw.iso,
        focal_length_mm: f64::from(raw.focal_length_mm),
        est_focal_length_pix: f64::from(raw.est_focal_length_pix),
        focus_distance_diopters: f64::from(raw.focus_distance_diopters),
        focus_locked: raw.focus_locked,
        ois_samples,
    })
}

fn convert_imu_sample(index: usize, raw: proto::ImuData) -> Result<ImuSample> {
    let context = || format!("imu[{index}]");
    Ok(ImuSample {
        time_ns: to_time_ns(raw.time_ns, &context)?,
        accel: vec3(&raw.accel, "accel", &context)?,
        gyro: vec3(&raw.gyro, "gyro", &context)?,
        accel_accuracy: raw.accel_accuracy,
        gyro_accuracy: raw.gyro_accuracy,
        accel_bias: optional_vec3(&raw.accel_bias, "accel_bias", &context)?,
        gyro_drift: optional_vec3(&raw.gyro_drift, "gyro_drift", &context)?,
        mag: optional_vec3(&raw.mag, "mag", &context)?,
    })
}

fn to_time_ns(value: i64, context: &dyn Fn() -> String) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| VidimuError::decode(context(), format!("negative time_ns {value}")))
}

/// Recording start as signed nanoseconds since the epoch.
fn timestamp_ns(time: prost_types::Timestamp) -> Result<i64> {
    time.seconds
        .checked_mul(NSECS_IN_SEC as i64)
        .and_then(|ns| ns.checked_add(i64::from(time.nanos)))
        .ok_or_else(|| {
            VidimuError::decode(
                "VideoCaptureData.time",
                format!(
                    "timestamp {}s {}ns does not fit in i64 nanoseconds",
                    time.seconds, time.nanos
                ),
            )
        })
}

fn vec3(values: &[f32], field: &str, context: &dyn Fn() -> String) -> Result<[f64; 3]> {
    if values.len() != 3 {
        return Err(VidimuError::decode(
            context(),
            format!("{field} has {} values, expected 3", values.len()),
        ));
    }
    Ok(to_array(values))
}

fn optional_vec3(
    values: &[f32],
    field: &str,
    context: &dyn Fn() -> String,
) -> Result<Option<[f64; 3]>> {
    if values.is_empty() {
        Ok(None)
    } else {
        vec3(values, field, context).map(Some)
    }
}

fn to_array<const N: usize>(values: &[f32]) -> [f64; N] {
    let mut out = [0.0; N];
    for (dst, &src) in out.iter_mut().zip(values) {
        *dst = f64::from(src);
    }
    out
}
