// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! One parameterized conversion run.
//!
//! [`Pipeline`] wires the decoder, aligner, multiplexer, geometry and
//! exporters together according to a [`PipelineConfig`]. Each export takes
//! ownership of its frame source and drops it before returning, on success
//! and on failure alike. Event sinks are finished exactly once, and only
//! after the whole timeline was written.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use vidimu::pipeline::{Pipeline, PipelineConfig, Recording};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let recording = Recording::open("session", &pipeline)?;
//! let report = pipeline.export_bag(
//!     recording.metadata(),
//!     recording.frame_source()?,
//!     "session/rosbag/recording.bag",
//! )?;
//! println!("{} frames, {} IMU samples", report.frames_emitted, report.imu_samples);
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use config::{PipelineConfig, Topics};

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::align::ffmpeg::{probe_frame_times, probe_resolution};
use crate::align::resize::resize_area;
use crate::align::{
    align, AlignStats, FfmpegFrameSource, Frame, FrameSource, PartialAlignmentWarning,
    PixelFormat,
};
use crate::core::{Resolution, Result, VidimuError};
use crate::geometry::descriptor::MatlabCalibration;
use crate::geometry::{CalibrationDescriptor, ImuCalibration};
use crate::io::formats::bag::BagEventSink;
use crate::io::formats::images::PngDirectorySink;
use crate::io::formats::kalibr::{self, CamchainFileSink, KalibrFiles, CAMCHAIN_FILE};
use crate::io::formats::lth::{self, LthFiles};
use crate::io::formats::yaml::YamlFlavor;
use crate::io::traits::{CalibrationSink, EventSink, ImageSink};
use crate::metadata::{MetadataDecoder, RecordingMetadata};
use crate::stats::{RecordingStatistics, STATISTICS_FILE};
use crate::timeline::{multiplex_into, MuxStats};

/// Metadata container inside a recording directory.
pub const METADATA_FILE: &str = "video_meta.pb3";
/// Video stream inside a recording directory.
pub const VIDEO_FILE: &str = "video_recording.mp4";
/// Bag written by the rosbag export.
pub const RECORDING_BAG: &str = "recording.bag";
/// Bag written by the Kalibr export.
pub const KALIBR_BAG: &str = "kalibr.bag";

/// Outcome of one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    /// Frames pulled from the video source
    pub frames_decoded: usize,
    /// Frames written to the output
    pub frames_emitted: usize,
    /// IMU samples written to the output
    pub imu_samples: u64,
    pub output_resolution: Option<Resolution>,
    pub warning: Option<PartialAlignmentWarning>,
    /// Frames whose decoder timestamp drifted from the metadata
    pub time_mismatches: usize,
    /// Frames the timestamp cross-check could not verify
    pub untimed_frames: usize,
    /// Files written besides the main output
    pub files: Vec<PathBuf>,
}

impl ExportReport {
    fn from_alignment(stats: &AlignStats, mux: MuxStats) -> Self {
        Self {
            frames_decoded: stats.pulled,
            frames_emitted: stats.emitted,
            imu_samples: mux.imu_events,
            time_mismatches: stats.time_mismatches,
            untimed_frames: stats.untimed_frames,
            ..Default::default()
        }
    }
}

/// A recording directory with decoded metadata.
#[derive(Debug, Clone)]
pub struct Recording {
    data_dir: PathBuf,
    metadata: RecordingMetadata,
    /// Probe decoder timestamps for the frame time cross-check
    frame_times: bool,
}

impl Recording {
    /// Decode `<data_dir>/video_meta.pb3`.
    pub fn open<P: AsRef<Path>>(data_dir: P, pipeline: &Pipeline) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let meta_path = data_dir.join(METADATA_FILE);
        let bytes = std::fs::read(&meta_path).map_err(|e| {
            VidimuError::io(
                "Recording::open",
                format!("Failed to read {}: {e}", meta_path.display()),
            )
        })?;
        let metadata = MetadataDecoder::new(pipeline.config.decode_options()).decode(&bytes)?;
        tracing::info!(
            path = %data_dir.display(),
            frames = metadata.video_frames.len(),
            imu_samples = metadata.imu_samples.len(),
            resolution = %metadata.camera.resolution,
            "Opened recording"
        );
        Ok(Self {
            data_dir,
            metadata,
            frame_times: pipeline.config.frame_time_tolerance_ns.is_some(),
        })
    }

    pub fn from_metadata<P: Into<PathBuf>>(data_dir: P, metadata: RecordingMetadata) -> Self {
        Self {
            data_dir: data_dir.into(),
            metadata,
            frame_times: false,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata(&self) -> &RecordingMetadata {
        &self.metadata
    }

    pub fn video_path(&self) -> PathBuf {
        self.data_dir.join(VIDEO_FILE)
    }

    /// `<data_dir>/<name>`, the default result directory of an export.
    pub fn result_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Start decoding the video as RGB frames.
    ///
    /// The stream resolution comes from `ffprobe`, or from the metadata when
    /// probing fails. When the pipeline cross-checks frame times, packet
    /// timestamps are probed as well and attached to the frames.
    pub fn frame_source(&self) -> Result<FfmpegFrameSource> {
        let video = self.video_path();
        let resolution = probe_resolution(&video).unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                fallback = %self.metadata.camera.resolution,
                "Could not probe video resolution"
            );
            self.metadata.camera.resolution
        });
        let source = FfmpegFrameSource::open_with_resolution(&video, PixelFormat::Rgb8, resolution)?;
        if !self.frame_times {
            return Ok(source);
        }
        match probe_frame_times(&video) {
            Ok(times) => Ok(source.with_frame_times(times)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not probe frame times");
                Ok(source)
            }
        }
    }
}

/// Conversion runs sharing one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Align `source` with the metadata and stream the merged timeline into
    /// `sink`, finishing it on success.
    ///
    /// On failure the sink is left unfinished for its owner to discard.
    pub fn run_timeline<S, K>(
        &self,
        metadata: &RecordingMetadata,
        source: S,
        sink: &mut K,
    ) -> Result<ExportReport>
    where
        S: FrameSource,
        K: EventSink + ?Sized,
    {
        let mut aligner = align(&metadata.video_frames, source, self.config.align_options())?;
        let mux = multiplex_into(&mut aligner, metadata.imu_samples.iter().cloned(), sink)?;
        let output_resolution = aligner.output_resolution();
        let (stats, warning) = aligner.finish();
        sink.finish()?;

        let report = ExportReport {
            output_resolution,
            warning,
            ..ExportReport::from_alignment(&stats, mux)
        };
        tracing::info!(
            frames_decoded = report.frames_decoded,
            frames_emitted = report.frames_emitted,
            imu_samples = report.imu_samples,
            events = sink.events_written(),
            "Timeline written"
        );
        Ok(report)
    }

    /// Write the merged timeline as a ROS bag at `path`.
    pub fn export_bag<S, P>(
        &self,
        metadata: &RecordingMetadata,
        source: S,
        path: P,
    ) -> Result<ExportReport>
    where
        S: FrameSource,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        ensure_parent(path)?;
        let mut sink = BagEventSink::create(path, &self.config.bag_sink_options())?;
        self.run_timeline(metadata, source, &mut sink)
    }

    /// Camera calibration at capture resolution.
    pub fn calibration_descriptor(
        &self,
        metadata: &RecordingMetadata,
        matlab: Option<&MatlabCalibration>,
    ) -> Result<CalibrationDescriptor> {
        CalibrationDescriptor::from_metadata(metadata, &self.config.descriptor_options(), matlab)
    }

    /// Copy an existing camchain into `dir`, plus a copy adjusted to the
    /// configured resize.
    pub fn copy_calibration(&self, calibration: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
        let name = calibration.file_name().ok_or_else(|| {
            VidimuError::config("calibration", format!("{} is not a file", calibration.display()))
        })?;
        let target = dir.join(name);
        copy_file(calibration, &target)?;
        let mut files = vec![target];
        if self.config.resize.is_some() {
            let descriptor = CalibrationDescriptor::load_camchain(calibration)?;
            files.extend(self.write_resized_camchain(&descriptor, dir)?);
        }
        Ok(files)
    }

    /// Write `camchain_<w>x<h>.yaml` when a resize is configured and
    /// changes the resolution.
    fn write_resized_camchain(
        &self,
        descriptor: &CalibrationDescriptor,
        dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(target) = self.config.resize else {
            return Ok(None);
        };
        if target == descriptor.resolution {
            return Ok(None);
        }
        let resized = descriptor.with_resolution(target)?;
        let path = dir.join(format!("camchain_{target}.yaml"));
        CamchainFileSink::new(&path, YamlFlavor::Kalibr).write_descriptor(&resized)?;
        Ok(Some(path))
    }

    /// Bag plus Kalibr configuration files in `dir`.
    ///
    /// `kalibr_calibration` is copied byte for byte as `camchain.yaml`
    /// instead of deriving one from the metadata, whatever camera and
    /// distortion model it uses. It is parsed only when a resize needs a
    /// resolution-adjusted copy. `matlab` overrides the device intrinsics.
    /// The calibration is resolved before any video is decoded.
    pub fn export_kalibr<S: FrameSource>(
        &self,
        metadata: &RecordingMetadata,
        source: S,
        dir: &Path,
        matlab: Option<&MatlabCalibration>,
        kalibr_calibration: Option<&Path>,
    ) -> Result<ExportReport> {
        let camchain = match kalibr_calibration {
            Some(path) => {
                if !path.is_file() {
                    return Err(VidimuError::io(
                        "export_kalibr",
                        format!("{} is not a file", path.display()),
                    ));
                }
                let parsed = match self.config.resize {
                    Some(_) => Some(CalibrationDescriptor::load_camchain(path)?),
                    None => None,
                };
                Camchain::Existing { path, parsed }
            }
            None => Camchain::Derived(self.calibration_descriptor(metadata, matlab)?),
        };
        let imu = ImuCalibration::from_metadata(
            metadata,
            &self.config.imu_noise,
            &self.config.topics.imu,
        );

        create_dir(dir)?;
        let mut report = self.export_bag(metadata, source, dir.join(KALIBR_BAG))?;

        let files = match &camchain {
            Camchain::Existing { path, .. } => {
                let camchain = dir.join(CAMCHAIN_FILE);
                copy_file(path, &camchain)?;
                let (imu, target) = kalibr::write_imu_and_target(dir, &imu, &self.config.target)?;
                KalibrFiles {
                    camchain,
                    imu,
                    target,
                }
            }
            Camchain::Derived(descriptor) => {
                kalibr::write_config_set(dir, descriptor, &imu, &self.config.target)?
            }
        };
        report.files.extend([files.camchain, files.imu, files.target]);
        if let Some(descriptor) = camchain.descriptor() {
            report.files.extend(self.write_resized_camchain(descriptor, dir)?);
        }
        Ok(report)
    }

    /// Write kept frames as `<index>.png` into `dir`.
    ///
    /// Frames are numbered by stream position and written in parallel, so
    /// files appear out of order. The metadata is not consulted.
    pub fn export_images<S>(&self, source: S, dir: &Path) -> Result<ExportReport>
    where
        S: FrameSource + Send,
    {
        let sink = PngDirectorySink::create(dir)?;
        let subsample = self.config.subsample as usize;
        let resize = self.config.resize;

        let mut frames = KeptFrames {
            source,
            subsample,
            index: 0,
            failed: false,
        };

        (&mut frames).par_bridge().try_for_each(|item| -> Result<()> {
            let (index, frame) = item?;
            match resize {
                Some(target) if target != frame.resolution() => {
                    let channels = frame.format.channels();
                    let pixels = resize_area(&frame.pixels, frame.resolution(), target, channels);
                    sink.write_image(index, &pixels, target.width, target.height, frame.format)
                }
                _ => {
                    sink.write_image(index, &frame.pixels, frame.width, frame.height, frame.format)
                }
            }
        })?;

        let emitted = sink.images_written() as usize;
        tracing::info!(dir = %dir.display(), emitted, "Wrote images");
        Ok(ExportReport {
            frames_decoded: frames.index,
            frames_emitted: emitted,
            output_resolution: resize,
            ..Default::default()
        })
    }

    /// LTH-vision data files, plus an OpenCV copy of a Kalibr calibration.
    pub fn export_lth(
        &self,
        metadata: &RecordingMetadata,
        dir: &Path,
        kalibr_calibration: Option<&Path>,
    ) -> Result<ExportReport> {
        create_dir(dir)?;
        let LthFiles { video, imu, sync } = lth::write_lth(dir, metadata)?;
        let mut files = vec![video, imu, sync];
        if let Some(path) = kalibr_calibration {
            files.push(lth::copy_calibration(path, dir)?);
        }
        Ok(ExportReport {
            imu_samples: metadata.imu_samples.len() as u64,
            files,
            ..Default::default()
        })
    }

    /// `statistics.json` in `dir`.
    pub fn export_statistics(
        &self,
        metadata: &RecordingMetadata,
        dir: &Path,
    ) -> Result<RecordingStatistics> {
        create_dir(dir)?;
        let statistics = RecordingStatistics::from_metadata(metadata);
        statistics.write_json(&dir.join(STATISTICS_FILE))?;
        Ok(statistics)
    }
}

/// Where the Kalibr export's `camchain.yaml` comes from.
enum Camchain<'a> {
    /// An existing file, parsed only when a resized copy is needed
    Existing {
        path: &'a Path,
        parsed: Option<CalibrationDescriptor>,
    },
    /// Built from the recording metadata
    Derived(CalibrationDescriptor),
}

impl Camchain<'_> {
    fn descriptor(&self) -> Option<&CalibrationDescriptor> {
        match self {
            Camchain::Existing { parsed, .. } => parsed.as_ref(),
            Camchain::Derived(descriptor) => Some(descriptor),
        }
    }
}

/// Every `subsample`-th source frame, tagged with its stream position.
///
/// Dropped frames go through [`FrameSource::skip_frame`]. Stops after an
/// error.
struct KeptFrames<S> {
    source: S,
    subsample: usize,
    /// Frames pulled so far
    index: usize,
    failed: bool,
}

impl<S: FrameSource> KeptFrames<S> {
    fn pull(&mut self) -> Result<Option<(usize, Frame)>> {
        while self.index % self.subsample != 0 {
            if !self.source.skip_frame()? {
                return Ok(None);
            }
            self.index += 1;
        }
        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        Ok(Some((index, frame)))
    }
}

impl<S: FrameSource> Iterator for KeptFrames<S> {
    type Item = Result<(usize, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.pull() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Copy a file, leaving it alone when source and target are the same file.
fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let (Ok(a), Ok(b)) = (from.canonicalize(), to.canonicalize()) {
        if a == b {
            return Ok(());
        }
    }
    std::fs::copy(from, to).map_err(|e| {
        VidimuError::sink(
            "pipeline",
            format!("Failed to copy {} to {}: {e}", from.display(), to.display()),
        )
    })?;
    Ok(())
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        VidimuError::sink("pipeline", format!("Failed to create {}: {e}", dir.display()))
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir(parent),
        _ => Ok(()),
    }
}
