// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Kalibr configuration files.
//!
//! `camchain.yaml`, `imu.yaml` and `target.yaml` as read by Kalibr's
//! camera/IMU calibration. Key names are fixed by Kalibr.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::yaml::{self, YamlFlavor};
use crate::core::{Resolution, Result, VidimuError};
use crate::geometry::{CalibrationDescriptor, ImuCalibration, TargetGrid, Transform};
use crate::io::traits::CalibrationSink;

pub const CAMCHAIN_FILE: &str = "camchain.yaml";
pub const IMU_FILE: &str = "imu.yaml";
pub const TARGET_FILE: &str = "target.yaml";

const CAMERA_KEY: &str = "cam0";
const CAMERA_MODEL: &str = "pinhole";
const DISTORTION_MODEL: &str = "radtan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CameraEntry {
    camera_model: String,
    intrinsics: Vec<f64>,
    distortion_model: String,
    distortion_coeffs: Vec<f64>,
    #[serde(rename = "T_cam_imu")]
    t_cam_imu: Vec<Vec<f64>>,
    #[serde(default)]
    timeshift_cam_imu: f64,
    #[serde(default)]
    rostopic: String,
    resolution: [u32; 2],
    #[serde(default)]
    cam_overlaps: Vec<u32>,
}

impl From<&CalibrationDescriptor> for CameraEntry {
    fn from(desc: &CalibrationDescriptor) -> Self {
        Self {
            camera_model: CAMERA_MODEL.to_string(),
            intrinsics: desc.intrinsics.to_vec(),
            distortion_model: DISTORTION_MODEL.to_string(),
            distortion_coeffs: desc.distortion.to_vec(),
            t_cam_imu: desc.extrinsics.iter().map(|row| row.to_vec()).collect(),
            timeshift_cam_imu: desc.timeshift_cam_imu,
            rostopic: desc.rostopic.clone(),
            resolution: [desc.resolution.width, desc.resolution.height],
            cam_overlaps: Vec::new(),
        }
    }
}

impl TryFrom<CameraEntry> for CalibrationDescriptor {
    type Error = VidimuError;

    fn try_from(entry: CameraEntry) -> Result<Self> {
        if entry.camera_model != CAMERA_MODEL {
            return Err(VidimuError::validation(
                "camera_model is pinhole",
                format!("got '{}'", entry.camera_model),
            ));
        }
        if entry.distortion_model != DISTORTION_MODEL {
            return Err(VidimuError::validation(
                "distortion_model is radtan",
                format!("got '{}'", entry.distortion_model),
            ));
        }
        let intrinsics = fixed::<4>("intrinsics", &entry.intrinsics)?;
        let distortion = fixed::<4>("distortion_coeffs", &entry.distortion_coeffs)?;
        if entry.t_cam_imu.len() != 4 {
            return Err(VidimuError::decode(
                "T_cam_imu",
                format!("expected 4 rows, got {}", entry.t_cam_imu.len()),
            ));
        }
        let mut extrinsics: Transform = [[0.0; 4]; 4];
        for (row, values) in extrinsics.iter_mut().zip(&entry.t_cam_imu) {
            *row = fixed::<4>("T_cam_imu", values)?;
        }
        Ok(Self {
            intrinsics,
            distortion,
            extrinsics,
            resolution: Resolution::new(entry.resolution[0], entry.resolution[1]),
            rostopic: entry.rostopic,
            timeshift_cam_imu: entry.timeshift_cam_imu,
        })
    }
}

fn fixed<const N: usize>(key: &str, values: &[f64]) -> Result<[f64; N]> {
    values.try_into().map_err(|_| {
        VidimuError::decode(key, format!("expected {N} values, got {}", values.len()))
    })
}

impl CalibrationDescriptor {
    /// Render as a Kalibr camchain document.
    pub fn to_camchain_string(&self, flavor: YamlFlavor) -> Result<String> {
        let chain = BTreeMap::from([(CAMERA_KEY, CameraEntry::from(self))]);
        yaml::to_string(&chain, flavor)
    }

    /// Parse `cam0` of a camchain document in either flavor.
    pub fn from_camchain_str(text: &str) -> Result<Self> {
        let mut chain: BTreeMap<String, CameraEntry> = yaml::from_str(text)?;
        let entry = chain.remove(CAMERA_KEY).ok_or_else(|| {
            VidimuError::decode("camchain", format!("missing '{CAMERA_KEY}' entry"))
        })?;
        entry.try_into()
    }

    pub fn load_camchain<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VidimuError::io("camchain", format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_camchain_str(&text)
    }
}

/// Writes a descriptor as a camchain file.
pub struct CamchainFileSink {
    path: PathBuf,
    flavor: YamlFlavor,
    written: bool,
}

impl CamchainFileSink {
    pub fn new<P: Into<PathBuf>>(path: P, flavor: YamlFlavor) -> Self {
        Self {
            path: path.into(),
            flavor,
            written: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationSink for CamchainFileSink {
    fn write_descriptor(&mut self, descriptor: &CalibrationDescriptor) -> Result<()> {
        if self.written {
            return Err(VidimuError::sink(
                "CamchainFileSink",
                format!("{} already written", self.path.display()),
            ));
        }
        let text = descriptor.to_camchain_string(self.flavor)?;
        std::fs::write(&self.path, text).map_err(|e| {
            VidimuError::sink(
                "CamchainFileSink",
                format!("Failed to write {}: {e}", self.path.display()),
            )
        })?;
        self.written = true;
        tracing::info!(
            path = %self.path.display(),
            resolution = %descriptor.resolution,
            "Wrote camera calibration"
        );
        Ok(())
    }
}

/// Paths of a written Kalibr configuration set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KalibrFiles {
    pub camchain: PathBuf,
    pub imu: PathBuf,
    pub target: PathBuf,
}

/// Write `camchain.yaml`, `imu.yaml` and `target.yaml` into `dir`.
pub fn write_config_set(
    dir: &Path,
    descriptor: &CalibrationDescriptor,
    imu: &ImuCalibration,
    target: &TargetGrid,
) -> Result<KalibrFiles> {
    let files = KalibrFiles {
        camchain: dir.join(CAMCHAIN_FILE),
        imu: dir.join(IMU_FILE),
        target: dir.join(TARGET_FILE),
    };
    CamchainFileSink::new(&files.camchain, YamlFlavor::Kalibr).write_descriptor(descriptor)?;
    write_imu_and_target(dir, imu, target)?;
    Ok(files)
}

/// Write `imu.yaml` and `target.yaml` into `dir`.
pub fn write_imu_and_target(
    dir: &Path,
    imu: &ImuCalibration,
    target: &TargetGrid,
) -> Result<(PathBuf, PathBuf)> {
    let imu_path = dir.join(IMU_FILE);
    let target_path = dir.join(TARGET_FILE);
    yaml::write_file(&imu_path, imu, YamlFlavor::Kalibr)?;
    yaml::write_file(&target_path, target, YamlFlavor::Kalibr)?;
    Ok((imu_path, target_path))
}
