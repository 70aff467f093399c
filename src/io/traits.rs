// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core traits for export sinks.
//!
//! These traits are the seams between the pipeline and its persisted
//! outputs. Every sink reports failures as
//! [`VidimuError::SinkWrite`](crate::core::VidimuError::SinkWrite).

use crate::align::PixelFormat;
use crate::core::Result;
use crate::geometry::CalibrationDescriptor;
use crate::timeline::TimelineEvent;

/// Ordered consumer of timeline events.
///
/// Events must be persisted in the order they are passed in.
///
/// # Example
///
/// ```no_run
/// use vidimu::io::traits::EventSink;
/// use vidimu::timeline::TimelineEvent;
///
/// fn write_all<S: EventSink>(sink: &mut S, events: &[TimelineEvent]) -> vidimu::Result<()> {
///     for event in events {
///         sink.write_event(event)?;
///     }
///     sink.finish()
/// }
/// ```
pub trait EventSink {
    /// Persist one event after all previously written ones.
    fn write_event(&mut self, event: &TimelineEvent) -> Result<()>;

    /// Flush buffered data and close the sink.
    ///
    /// Calling it a second time is an error.
    fn finish(&mut self) -> Result<()>;

    /// Number of events written so far.
    fn events_written(&self) -> u64;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn write_event(&mut self, event: &TimelineEvent) -> Result<()> {
        (**self).write_event(event)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn events_written(&self) -> u64 {
        (**self).events_written()
    }
}

/// Writer of independent image artifacts.
///
/// Calls are self-contained and may arrive in any order and from several
/// threads at once.
pub trait ImageSink: Sync {
    fn write_image(
        &self,
        index: usize,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<()>;
}

/// Consumer of one calibration descriptor per run.
pub trait CalibrationSink {
    fn write_descriptor(&mut self, descriptor: &CalibrationDescriptor) -> Result<()>;
}
