// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Summary statistics of a recording.
//!
//! Each per-frame and per-sample quantity is reduced to
//! count/min/max/mean/std, keyed by series name. Empty series are left out.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::core::{Result, VidimuError};
use crate::metadata::RecordingMetadata;

pub const STATISTICS_FILE: &str = "statistics.json";

/// Summary of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

/// Welford accumulator.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn summary(&self) -> Option<SeriesSummary> {
        (self.count > 0).then(|| SeriesSummary {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean,
            std: (self.m2 / self.count as f64).sqrt(),
        })
    }
}

/// Summarize a series of values.
pub fn summarize<I: IntoIterator<Item = f64>>(values: I) -> Option<SeriesSummary> {
    let mut acc = Accumulator::default();
    values.into_iter().for_each(|v| acc.push(v));
    acc.summary()
}

/// Statistics of a whole recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingStatistics {
    pub frame_count: usize,
    pub imu_sample_count: usize,
    /// Span of frame timestamps in seconds
    pub video_duration_s: f64,
    /// Sample rate implied by IMU timestamps
    pub imu_rate_hz: Option<f64>,
    pub video: BTreeMap<String, SeriesSummary>,
    pub ois: BTreeMap<String, SeriesSummary>,
    pub imu: BTreeMap<String, SeriesSummary>,
}

impl RecordingStatistics {
    pub fn from_metadata(metadata: &RecordingMetadata) -> Self {
        let frames = &metadata.video_frames;
        let samples = &metadata.imu_samples;

        let mut video = BTreeMap::new();
        insert(&mut video, "exposure_time_ns", frames.iter().map(|f| f.exposure_time_ns as f64));
        insert(&mut video, "frame_duration_ns", frames.iter().map(|f| f.frame_duration_ns as f64));
        insert(&mut video, "frame_readout_ns", frames.iter().map(|f| f.frame_readout_ns as f64));
        insert(&mut video, "est_focal_length_pix", frames.iter().map(|f| f.est_focal_length_pix));
        insert(
            &mut video,
            "focus_locked",
            frames.iter().map(|f| f64::from(u8::from(f.focus_locked))),
        );
        insert(
            &mut video,
            "timestamp_diff_ms",
            frames.windows(2).map(|w| diff_ms(w[0].time_ns, w[1].time_ns)),
        );

        let mut ois = BTreeMap::new();
        let ois_samples = || frames.iter().flat_map(|f| f.ois_samples.iter());
        insert(&mut ois, "x_shift", ois_samples().map(|s| s.x_shift));
        insert(&mut ois, "y_shift", ois_samples().map(|s| s.y_shift));

        let mut imu = BTreeMap::new();
        insert(&mut imu, "gyro_accuracy", samples.iter().map(|s| f64::from(s.gyro_accuracy)));
        insert(&mut imu, "accel_accuracy", samples.iter().map(|s| f64::from(s.accel_accuracy)));
        for axis in 0..3 {
            insert(&mut imu, &format!("accel_{axis}"), samples.iter().map(|s| s.accel[axis]));
            insert(&mut imu, &format!("gyro_{axis}"), samples.iter().map(|s| s.gyro[axis]));
        }
        let imu_diffs = summarize(samples.windows(2).map(|w| diff_ms(w[0].time_ns, w[1].time_ns)));
        if let Some(diffs) = imu_diffs {
            imu.insert("timestamp_diff_ms".to_string(), diffs);
        }

        let video_duration_s = match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => last.time_ns.saturating_sub(first.time_ns) as f64 * 1e-9,
            _ => 0.0,
        };
        let imu_rate_hz = imu_diffs
            .filter(|d| d.mean > 0.0)
            .map(|d| 1e3 / d.mean);

        Self {
            frame_count: frames.len(),
            imu_sample_count: samples.len(),
            video_duration_s,
            imu_rate_hz,
            video,
            ois,
            imu,
        }
    }

    /// Write as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| VidimuError::sink("statistics", format!("Failed to serialize: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            VidimuError::sink("statistics", format!("Failed to write {}: {e}", path.display()))
        })
    }
}

fn insert<I: IntoIterator<Item = f64>>(
    map: &mut BTreeMap<String, SeriesSummary>,
    name: &str,
    values: I,
) {
    if let Some(summary) = summarize(values) {
        map.insert(name.to_string(), summary);
    }
}

fn diff_ms(earlier: u64, later: u64) -> f64 {
    (later as f64 - earlier as f64) * 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let s = summarize([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.count, 8);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_series() {
        assert!(summarize(std::iter::empty()).is_none());
    }

    #[test]
    fn test_single_value_has_zero_std() {
        let s = summarize([3.5]).unwrap();
        assert_eq!(s.std, 0.0);
        assert_eq!(s.min, s.max);
    }
}
