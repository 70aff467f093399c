// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Export sinks and the file formats behind them.

pub mod formats;
pub mod traits;

pub use formats::bag::{BagEventSink, BagReader, BagSinkOptions, BagWriter};
pub use formats::images::PngDirectorySink;
pub use formats::kalibr::CamchainFileSink;
pub use formats::yaml::YamlFlavor;
pub use traits::{CalibrationSink, EventSink, ImageSink};
