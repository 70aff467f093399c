// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Timeline events into a ROS1 bag.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::messages::{self, CompressedImage, Image, Imu};
use super::writer::{BagCompression, BagMessage, BagWriter, BagWriterOptions};
use crate::align::PixelFormat;
use crate::core::{Result, VidimuError};
use crate::io::formats::images::encode_png;
use crate::io::traits::EventSink;
use crate::timeline::TimelineEvent;

/// How video frames are stored in the bag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// `sensor_msgs/CompressedImage` holding a grayscale PNG
    #[default]
    Png,
    /// `sensor_msgs/Image` with `mono8` pixels
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagSinkOptions {
    pub camera_topic: String,
    pub imu_topic: String,
    pub image_encoding: ImageEncoding,
    pub compression: BagCompression,
}

impl Default for BagSinkOptions {
    fn default() -> Self {
        Self {
            camera_topic: "/cam0/image_raw".to_string(),
            imu_topic: "/imu0".to_string(),
            image_encoding: ImageEncoding::Png,
            compression: BagCompression::None,
        }
    }
}

/// [`EventSink`] writing video events to the camera topic and IMU events
/// to the IMU topic, in arrival order.
///
/// Frames are converted to grayscale. The bag only appears at its final
/// path once [`finish`](EventSink::finish) succeeds.
pub struct BagEventSink {
    writer: Option<BagWriter>,
    camera_conn: u32,
    imu_conn: u32,
    image_encoding: ImageEncoding,
    events: u64,
}

impl BagEventSink {
    pub fn create<P: AsRef<Path>>(path: P, options: &BagSinkOptions) -> Result<Self> {
        let mut writer = BagWriter::create_with(
            path,
            BagWriterOptions {
                compression: options.compression,
                ..Default::default()
            },
        )?;
        let image_type = match options.image_encoding {
            ImageEncoding::Png => messages::COMPRESSED_IMAGE,
            ImageEncoding::Raw => messages::IMAGE,
        };
        let camera_conn = writer.add_connection(&options.camera_topic, &image_type)?;
        let imu_conn = writer.add_connection(&options.imu_topic, &messages::IMU)?;

        Ok(Self {
            writer: Some(writer),
            camera_conn,
            imu_conn,
            image_encoding: options.image_encoding,
            events: 0,
        })
    }

    fn serialize(&self, event: &TimelineEvent) -> Result<BagMessage> {
        let message = match event {
            TimelineEvent::Video(frame) => {
                let gray = frame.to_gray();
                let data = match self.image_encoding {
                    ImageEncoding::Png => CompressedImage::png(
                        frame.time_ns,
                        encode_png(&gray, frame.width, frame.height, PixelFormat::Gray8)?,
                    )
                    .serialize(),
                    ImageEncoding::Raw => {
                        Image::mono8(frame.time_ns, frame.width, frame.height, gray).serialize()
                    }
                };
                BagMessage::new(self.camera_conn, frame.time_ns, data)
            }
            TimelineEvent::Imu(sample) => BagMessage::new(
                self.imu_conn,
                sample.time_ns,
                Imu::new(sample.time_ns, sample.gyro, sample.accel).serialize(),
            ),
        };
        Ok(message)
    }
}

impl EventSink for BagEventSink {
    fn write_event(&mut self, event: &TimelineEvent) -> Result<()> {
        let message = self.serialize(event)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| VidimuError::sink("BagEventSink", "Sink already finished"))?;
        writer.write_message(&message)?;
        self.events += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| VidimuError::sink("BagEventSink", "Sink already finished"))?;
        writer.finish()
    }

    fn events_written(&self) -> u64 {
        self.events
    }
}
