// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Pipeline configuration.
//!
//! Every option of a conversion run lives here, loaded from TOML. Fields
//! missing from the file take their defaults.
//!
//! ```toml
//! subsample = 3
//! resize = { width = 960, height = 540 }
//! image_encoding = "raw"
//! bag_compression = "bz2"
//!
//! [topics]
//! camera = "/cam0/image_raw"
//! imu = "/imu0"
//!
//! [target]
//! tagSize = 0.03
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::align::AlignOptions;
use crate::core::{Resolution, Result, VidimuError};
use crate::geometry::descriptor::{DescriptorOptions, ImuNoise};
use crate::geometry::{QuaternionPolicy, TargetGrid, DEFAULT_QUATERNION_TOLERANCE};
use crate::io::formats::bag::{BagCompression, BagSinkOptions, ImageEncoding};
use crate::metadata::DecodeOptions;

/// Output topic names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub camera: String,
    pub imu: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            camera: "/cam0/image_raw".to_string(),
            imu: "/imu0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep every n-th video frame
    pub subsample: u32,
    /// Resize emitted frames
    pub resize: Option<Resolution>,
    pub image_encoding: ImageEncoding,
    pub bag_compression: BagCompression,
    pub quaternion: QuaternionPolicy,
    pub quaternion_tolerance: f64,
    pub require_zero_reserved_intrinsic: bool,
    /// Warn when decoder timestamps drift from metadata by more than this
    pub frame_time_tolerance_ns: Option<u64>,
    pub topics: Topics,
    pub imu_noise: ImuNoise,
    pub target: TargetGrid,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subsample: 1,
            resize: None,
            image_encoding: ImageEncoding::default(),
            bag_compression: BagCompression::default(),
            quaternion: QuaternionPolicy::default(),
            quaternion_tolerance: DEFAULT_QUATERNION_TOLERANCE,
            require_zero_reserved_intrinsic: true,
            frame_time_tolerance_ns: None,
            topics: Topics::default(),
            imu_noise: ImuNoise::default(),
            target: TargetGrid::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| VidimuError::config("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VidimuError::io("config", format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VidimuError::config("toml", e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.align_options().validate()?;
        if !(self.quaternion_tolerance > 0.0 && self.quaternion_tolerance.is_finite()) {
            return Err(VidimuError::config(
                "quaternion_tolerance",
                format!("must be a positive number, got {}", self.quaternion_tolerance),
            ));
        }
        if self.topics.camera.is_empty() || self.topics.imu.is_empty() {
            return Err(VidimuError::config("topics", "topic names must not be empty"));
        }
        if self.target.tag_cols == 0 || self.target.tag_rows == 0 {
            return Err(VidimuError::config("target", "grid needs at least one tag"));
        }
        Ok(())
    }

    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            subsample: self.subsample,
            resize: self.resize,
            frame_time_tolerance_ns: self.frame_time_tolerance_ns,
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            require_zero_reserved_intrinsic: self.require_zero_reserved_intrinsic,
        }
    }

    pub fn descriptor_options(&self) -> DescriptorOptions {
        DescriptorOptions {
            quaternion: self.quaternion,
            quaternion_tolerance: self.quaternion_tolerance,
            rostopic: self.topics.camera.clone(),
        }
    }

    pub fn bag_sink_options(&self) -> BagSinkOptions {
        BagSinkOptions {
            camera_topic: self.topics.camera.clone(),
            imu_topic: self.topics.imu.clone(),
            image_encoding: self.image_encoding,
            compression: self.bag_compression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_parse_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            subsample = 3
            resize = { width = 960, height = 540 }
            image_encoding = "raw"
            bag_compression = "bz2"
            quaternion = "normalize"

            [topics]
            imu = "/imu1"

            [target]
            tagSize = 0.03
            "#,
        )
        .unwrap();
        assert_eq!(config.subsample, 3);
        assert_eq!(config.resize, Some(Resolution::new(960, 540)));
        assert_eq!(config.image_encoding, ImageEncoding::Raw);
        assert_eq!(config.bag_compression, BagCompression::Bz2);
        assert_eq!(config.quaternion, QuaternionPolicy::Normalize);
        assert_eq!(config.topics.camera, "/cam0/image_raw");
        assert_eq!(config.topics.imu, "/imu1");
        assert_eq!(config.target.tag_size, 0.03);
        assert_eq!(config.target.tag_cols, 6);
    }

    #[test]
    fn test_rejects_bad_values() {
        for text in [
            "subsample = 0",
            "resize = { width = 0, height = 540 }",
            "quaternion_tolerance = -1.0",
            "quaternion = \"maybe\"",
        ] {
            assert!(
                matches!(PipelineConfig::from_toml_str(text), Err(VidimuError::Config { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig {
            subsample: 2,
            resize: Some(Resolution::new(640, 360)),
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }
}
