// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! BAG format implementation.
//!
//! ROS1 bag v2.0 output for the merged timeline:
//! - [`writer`] - Chunked bag writer with optional bz2 compression
//! - [`reader`] - Sequential reader yielding records in file order
//! - [`messages`] - `sensor_msgs` serialization
//! - [`sink`] - [`EventSink`](crate::io::traits::EventSink) over a bag

pub mod messages;
pub mod reader;
pub mod sink;
pub mod writer;

pub use reader::{BagConnection, BagHeader, BagReader, BagRecord};
pub use sink::{BagEventSink, BagSinkOptions, ImageEncoding};
pub use writer::{BagCompression, BagMessage, BagWriter, BagWriterOptions};
