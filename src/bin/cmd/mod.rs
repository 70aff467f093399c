// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod bag;
mod images;
mod inspect;
mod kalibr;
mod lth;
mod stats;

pub use bag::BagCmd;
pub use images::ImagesCmd;
pub use inspect::InspectCmd;
pub use kalibr::KalibrCmd;
pub use lth::LthCmd;
pub use stats::StatsCmd;
