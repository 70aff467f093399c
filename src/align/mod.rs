// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Frame/metadata alignment.
//!
//! [`FrameAligner`] pulls frames from a [`FrameSource`] in stream order and
//! pairs frame *i* with `video_frames[i]`. There is no timestamp-based
//! re-matching: correspondence is purely positional, so every frame is
//! pulled from the source (decoded, or skipped where the source can do so
//! without losing its position) even when subsampling drops it.
//!
//! - [`source`] - Frame source trait and in-memory/image-directory sources
//! - [`ffmpeg`] - FFmpeg subprocess source
//! - [`resize`] - Area-averaging resampling

pub mod ffmpeg;
pub mod resize;
pub mod source;

pub use ffmpeg::FfmpegFrameSource;
pub use source::{Frame, FrameSource, ImageDirSource, PixelFormat, VecFrameSource};

use serde::Serialize;

use crate::core::{Resolution, Result, VidimuError};
use crate::metadata::VideoFrameMeta;

/// Options for [`FrameAligner`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignOptions {
    /// Keep every n-th frame (n >= 1)
    pub subsample: u32,
    /// Resize emitted frames to this resolution
    pub resize: Option<Resolution>,
    /// Warn when decoder timestamps drift from metadata by more than this
    pub frame_time_tolerance_ns: Option<u64>,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            subsample: 1,
            resize: None,
            frame_time_tolerance_ns: None,
        }
    }
}

impl AlignOptions {
    pub fn with_subsample(mut self, subsample: u32) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_resize(mut self, resize: Option<Resolution>) -> Self {
        self.resize = resize;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.subsample == 0 {
            return Err(VidimuError::config("subsample", "must be at least 1"));
        }
        if self.resize.is_some_and(|r| r.is_empty()) {
            return Err(VidimuError::config("resize", "width and height must be non-zero"));
        }
        Ok(())
    }
}

/// A video frame paired with its metadata timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    /// Position in the video stream (and in `video_frames`)
    pub sequence_index: usize,
    pub time_ns: u64,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl AlignedFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Convert to 8-bit luminance.
    pub fn to_gray(&self) -> Vec<u8> {
        source::to_gray(&self.pixels, self.format)
    }
}

/// Which side ran out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shortfall {
    /// The video yielded fewer frames than the metadata lists
    SourceExhausted,
    /// The video has frames beyond the last metadata entry
    MetadataExhausted,
}

/// Non-fatal frame-count/metadata-count mismatch.
///
/// Alignment stops at the shorter length; only paired frames are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialAlignmentWarning {
    pub kind: Shortfall,
    /// Number of entries in `video_frames`
    pub metadata_frames: usize,
    /// Frames pulled from the source (a lower bound when the source is longer)
    pub source_frames_seen: usize,
    /// Frames that had a metadata counterpart
    pub paired: usize,
}

impl std::fmt::Display for PartialAlignmentWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Shortfall::SourceExhausted => write!(
                f,
                "video ended after {} frames but metadata lists {}; truncated to {}",
                self.source_frames_seen, self.metadata_frames, self.paired
            ),
            Shortfall::MetadataExhausted => write!(
                f,
                "video has more than {} frames; trailing frames have no metadata",
                self.metadata_frames
            ),
        }
    }
}

/// Counters collected while aligning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignStats {
    /// Frames pulled from the source (kept or dropped)
    pub pulled: usize,
    /// Frames emitted downstream
    pub emitted: usize,
    /// Frames pulled but dropped by subsampling
    pub dropped: usize,
    /// Emitted frames whose decoder timestamp disagreed with the metadata
    pub time_mismatches: usize,
    /// Emitted frames the cross-check could not verify (no decoder timestamp)
    pub untimed_frames: usize,
}

/// Lazy, forward-only sequence of [`AlignedFrame`]s.
///
/// Created by [`align`]. Frames are pulled from the source only as the
/// iterator is advanced. After the iterator returns `None`, [`warning`]
/// reports any length mismatch.
///
/// [`warning`]: FrameAligner::warning
pub struct FrameAligner<'m, S> {
    frames: &'m [VideoFrameMeta],
    source: S,
    options: AlignOptions,
    output_resolution: Option<Resolution>,
    next_index: usize,
    done: bool,
    stats: AlignStats,
    warning: Option<PartialAlignmentWarning>,
    pts_origin: Option<(u64, u64)>,
}

/// Pair metadata entries with frames from `source`.
///
/// # Example
///
/// ```
/// use vidimu::align::{align, AlignOptions, Frame, PixelFormat, VecFrameSource};
/// # use vidimu::metadata::VideoFrameMeta;
/// # fn meta(t: u64) -> VideoFrameMeta { VideoFrameMeta { time_ns: t, frame_number: 0,
/// #   exposure_time_ns: 0, frame_duration_ns: 0, frame_readout_ns: 0, iso: 0,
/// #   focal_length_mm: 0.0, est_focal_length_pix: 0.0, focus_distance_diopters: 0.0,
/// #   focus_locked: false, ois_samples: vec![] } }
///
/// let metadata = vec![meta(0), meta(33), meta(66)];
/// let frames = (0..3)
///     .map(|_| Frame::new(vec![0; 4], 2, 2, PixelFormat::Gray8).unwrap())
///     .collect();
/// let options = AlignOptions::default().with_subsample(2);
/// let aligned = align(&metadata, VecFrameSource::new(frames), options).unwrap();
/// let times: Vec<u64> = aligned.map(|f| f.unwrap().time_ns).collect();
/// assert_eq!(times, vec![0, 66]);
/// ```
pub fn align<S: FrameSource>(
    frames: &[VideoFrameMeta],
    source: S,
    options: AlignOptions,
) -> Result<FrameAligner<'_, S>> {
    options.validate()?;
    let output_resolution = options.resize.or_else(|| source.resolution());
    Ok(FrameAligner {
        frames,
        source,
        options,
        output_resolution,
        next_index: 0,
        done: false,
        stats: AlignStats::default(),
        warning: None,
        pts_origin: None,
    })
}

impl<'m, S: FrameSource> FrameAligner<'m, S> {
    /// Resolution of emitted frames.
    ///
    /// Known up front when resizing or when the source reports its
    /// resolution; otherwise set by the first emitted frame.
    pub fn output_resolution(&self) -> Option<Resolution> {
        self.output_resolution
    }

    /// Length mismatch detected so far.
    pub fn warning(&self) -> Option<&PartialAlignmentWarning> {
        self.warning.as_ref()
    }

    pub fn stats(&self) -> &AlignStats {
        &self.stats
    }

    /// Release the frame source and return the alignment outcome.
    pub fn finish(self) -> (AlignStats, Option<PartialAlignmentWarning>) {
        (self.stats, self.warning)
    }

    fn record_shortfall(&mut self, kind: Shortfall) {
        let source_frames_seen = match kind {
            Shortfall::SourceExhausted => self.stats.pulled,
            Shortfall::MetadataExhausted => self.stats.pulled + 1,
        };
        let warning = PartialAlignmentWarning {
            kind,
            metadata_frames: self.frames.len(),
            source_frames_seen,
            paired: self.next_index,
        };
        tracing::warn!(
            context = "frame_alignment",
            metadata_frames = warning.metadata_frames,
            source_frames_seen = warning.source_frames_seen,
            paired = warning.paired,
            "{warning}"
        );
        self.warning = Some(warning);
    }

    fn check_frame_time(&mut self, index: usize, pts_ns: Option<u64>, time_ns: u64) {
        let Some(tolerance) = self.options.frame_time_tolerance_ns else {
            return;
        };
        let Some(pts) = pts_ns else {
            self.stats.untimed_frames += 1;
            if self.stats.untimed_frames == 1 {
                tracing::warn!(
                    context = "frame_alignment",
                    index,
                    "Frame source gives no timestamps; cross-check skipped"
                );
            }
            return;
        };
        let (pts0, time0) = *self.pts_origin.get_or_insert((pts, time_ns));
        let video_elapsed = pts.abs_diff(pts0);
        let meta_elapsed = time_ns.abs_diff(time0);
        let drift = video_elapsed.abs_diff(meta_elapsed);
        if drift > tolerance {
            self.stats.time_mismatches += 1;
            if self.stats.time_mismatches == 1 {
                tracing::warn!(
                    context = "frame_alignment",
                    index,
                    drift_ns = drift,
                    tolerance_ns = tolerance,
                    "Decoder timestamp disagrees with metadata; positional pairing may be off"
                );
            }
        }
    }

    fn emit(&mut self, index: usize, frame: Frame) -> AlignedFrame {
        let time_ns = self.frames[index].time_ns;
        self.check_frame_time(index, frame.pts_ns, time_ns);

        let (pixels, width, height) = match self.options.resize {
            Some(target) if target != frame.resolution() => {
                let pixels = resize::resize_area(
                    &frame.pixels,
                    frame.resolution(),
                    target,
                    frame.format.channels(),
                );
                (pixels, target.width, target.height)
            }
            _ => (frame.pixels, frame.width, frame.height),
        };

        if self.output_resolution.is_none() {
            self.output_resolution = Some(Resolution::new(width, height));
        }
        self.stats.emitted += 1;

        AlignedFrame {
            sequence_index: index,
            time_ns,
            pixels,
            width,
            height,
            format: frame.format,
        }
    }
}

impl<'m, S: FrameSource> Iterator for FrameAligner<'m, S> {
    type Item = Result<AlignedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let index = self.next_index;

            if index >= self.frames.len() {
                self.done = true;
                // One probe tells whether the video is longer than the metadata.
                return match self.source.skip_frame() {
                    Ok(true) => {
                        self.record_shortfall(Shortfall::MetadataExhausted);
                        None
                    }
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                };
            }

            if index % self.options.subsample as usize != 0 {
                match self.source.skip_frame() {
                    Ok(true) => {
                        self.stats.pulled += 1;
                        self.stats.dropped += 1;
                        self.next_index += 1;
                        continue;
                    }
                    Ok(false) => {
                        self.done = true;
                        self.record_shortfall(Shortfall::SourceExhausted);
                        return None;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            return match self.source.next_frame() {
                Ok(Some(frame)) => {
                    self.stats.pulled += 1;
                    self.next_index += 1;
                    Some(Ok(self.emit(index, frame)))
                }
                Ok(None) => {
                    self.done = true;
                    self.record_shortfall(Shortfall::SourceExhausted);
                    None
                }
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }
    }
}

impl<'m, S: FrameSource> std::iter::FusedIterator for FrameAligner<'m, S> {}
