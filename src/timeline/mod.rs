// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Timeline multiplexing of video frames and IMU samples.
//!
//! [`Multiplexer`] is a two-pointer merge of two streams that are each
//! already sorted by `time_ns`. It holds at most one pending element per
//! stream, so a session of any length is streamed without buffering.
//!
//! Ordering contract:
//! - Output is non-decreasing in `time_ns`.
//! - Within a stream, input order is preserved (stable merge).
//! - At equal timestamps the video event is emitted first.

use serde::Serialize;

use crate::align::AlignedFrame;
use crate::core::{Result, VidimuError};
use crate::io::traits::EventSink;
use crate::metadata::ImuSample;

/// One entry of the merged timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    Video(AlignedFrame),
    Imu(ImuSample),
}

impl TimelineEvent {
    pub fn time_ns(&self) -> u64 {
        match self {
            TimelineEvent::Video(frame) => frame.time_ns,
            TimelineEvent::Imu(sample) => sample.time_ns,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, TimelineEvent::Video(_))
    }

    /// Topic tag of the event's stream.
    pub fn stream(&self) -> &'static str {
        match self {
            TimelineEvent::Video(_) => "video",
            TimelineEvent::Imu(_) => "imu",
        }
    }
}

/// Event counts of a multiplexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MuxStats {
    pub video_events: u64,
    pub imu_events: u64,
}

impl MuxStats {
    pub fn total(&self) -> u64 {
        self.video_events + self.imu_events
    }
}

/// Tracks the last timestamp of one input stream.
#[derive(Debug, Default)]
struct StreamCursor {
    last_ns: Option<u64>,
    position: usize,
    exhausted: bool,
}

impl StreamCursor {
    fn admit(&mut self, stream: &str, time_ns: u64) -> Result<()> {
        if let Some(last) = self.last_ns {
            if time_ns < last {
                return Err(VidimuError::validation(
                    format!("{stream} time_ns is non-decreasing"),
                    format!(
                        "element {} at {time_ns} ns precedes previous {last} ns",
                        self.position
                    ),
                ));
            }
        }
        self.last_ns = Some(time_ns);
        self.position += 1;
        Ok(())
    }
}

/// Lazy merge of an aligned-frame stream and an IMU-sample stream.
///
/// Yields `Err` and then stops if the frame stream fails or if either
/// stream goes backwards in time.
pub struct Multiplexer<F, I> {
    frames: F,
    imu: I,
    pending_frame: Option<AlignedFrame>,
    pending_imu: Option<ImuSample>,
    video: StreamCursor,
    imu_cursor: StreamCursor,
    failed: bool,
    stats: MuxStats,
}

/// Merge `frames` and `imu` into one time-ordered sequence.
pub fn multiplex<F, I>(frames: F, imu: I) -> Multiplexer<F::IntoIter, I::IntoIter>
where
    F: IntoIterator<Item = Result<AlignedFrame>>,
    I: IntoIterator<Item = ImuSample>,
{
    Multiplexer {
        frames: frames.into_iter(),
        imu: imu.into_iter(),
        pending_frame: None,
        pending_imu: None,
        video: StreamCursor::default(),
        imu_cursor: StreamCursor::default(),
        failed: false,
        stats: MuxStats::default(),
    }
}

/// Stream the merged timeline into `sink`.
///
/// Stops pulling from both inputs at the first error, whether it comes from
/// an input stream or from the sink, and returns that error. The sink is not
/// finished here; its owner closes it.
pub fn multiplex_into<F, I, S>(frames: F, imu: I, sink: &mut S) -> Result<MuxStats>
where
    F: IntoIterator<Item = Result<AlignedFrame>>,
    I: IntoIterator<Item = ImuSample>,
    S: EventSink + ?Sized,
{
    let mut mux = multiplex(frames, imu);
    for event in mux.by_ref() {
        let event = event?;
        sink.write_event(&event)?;
    }
    Ok(mux.stats())
}

impl<F, I> Multiplexer<F, I>
where
    F: Iterator<Item = Result<AlignedFrame>>,
    I: Iterator<Item = ImuSample>,
{
    /// Events emitted so far.
    pub fn stats(&self) -> MuxStats {
        self.stats
    }

    fn fill_frame(&mut self) -> Result<()> {
        if self.pending_frame.is_some() || self.video.exhausted {
            return Ok(());
        }
        match self.frames.next() {
            Some(frame) => {
                let frame = frame?;
                self.video.admit("video", frame.time_ns)?;
                self.pending_frame = Some(frame);
            }
            None => self.video.exhausted = true,
        }
        Ok(())
    }

    fn fill_imu(&mut self) -> Result<()> {
        if self.pending_imu.is_some() || self.imu_cursor.exhausted {
            return Ok(());
        }
        match self.imu.next() {
            Some(sample) => {
                self.imu_cursor.admit("imu", sample.time_ns)?;
                self.pending_imu = Some(sample);
            }
            None => self.imu_cursor.exhausted = true,
        }
        Ok(())
    }

    fn take_video(&mut self) -> Option<TimelineEvent> {
        self.stats.video_events += 1;
        self.pending_frame.take().map(TimelineEvent::Video)
    }

    fn take_imu(&mut self) -> Option<TimelineEvent> {
        self.stats.imu_events += 1;
        self.pending_imu.take().map(TimelineEvent::Imu)
    }
}

impl<F, I> Iterator for Multiplexer<F, I>
where
    F: Iterator<Item = Result<AlignedFrame>>,
    I: Iterator<Item = ImuSample>,
{
    type Item = Result<TimelineEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(e) = self.fill_frame().and_then(|_| self.fill_imu()) {
            self.failed = true;
            self.pending_frame = None;
            self.pending_imu = None;
            return Some(Err(e));
        }

        let video_first = match (&self.pending_frame, &self.pending_imu) {
            (Some(frame), Some(sample)) => frame.time_ns <= sample.time_ns,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        let event = if video_first {
            self.take_video()
        } else {
            self.take_imu()
        };
        event.map(Ok)
    }
}

impl<F, I> std::iter::FusedIterator for Multiplexer<F, I>
where
    F: Iterator<Item = Result<AlignedFrame>>,
    I: Iterator<Item = ImuSample>,
{
}
