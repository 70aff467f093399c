// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout vidimu.
//!
//! - [`VidimuError`] - Error taxonomy for a conversion run
//! - [`Resolution`] - Image dimensions in pixels
//! - [`split_time_ns`] - Nanosecond timestamp to (sec, nsec)

pub mod error;

pub use error::{Result, VidimuError};

use serde::{Deserialize, Serialize};

/// Nanoseconds per second.
pub const NSECS_IN_SEC: u64 = 1_000_000_000;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when parsing a `Resolution` from string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResolutionError {
    input: String,
}

impl std::fmt::Display for ParseResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid resolution '{}', expected WIDTHxHEIGHT (e.g. 960x540)",
            self.input
        )
    }
}

impl std::error::Error for ParseResolutionError {}

impl std::str::FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || ParseResolutionError {
            input: s.to_string(),
        };
        let (w, h) = s
            .split_once(['x', 'X'])
            .or_else(|| s.split_once(','))
            .ok_or_else(err)?;
        let width = w.trim().parse::<u32>().map_err(|_| err())?;
        let height = h.trim().parse::<u32>().map_err(|_| err())?;
        Ok(Resolution { width, height })
    }
}

/// Latest instant a ROS1 `time` can hold (u32 seconds, early 2106).
pub const MAX_ROS_TIME_NS: u64 = u32::MAX as u64 * NSECS_IN_SEC + (NSECS_IN_SEC - 1);

/// Split a nanosecond timestamp into ROS-style (sec, nsec).
///
/// `sec = time_ns div 1e9`, `nsec = time_ns mod 1e9`. Times past
/// [`MAX_ROS_TIME_NS`] do not fit the u32 seconds field and are rejected.
pub fn split_time_ns(time_ns: u64) -> Result<(u32, u32)> {
    let sec = u32::try_from(time_ns / NSECS_IN_SEC).map_err(|_| {
        VidimuError::validation(
            "timestamp fits ROS1 time",
            format!("{time_ns} ns is past the u32 seconds range"),
        )
    })?;
    let nsec = (time_ns % NSECS_IN_SEC) as u32;
    Ok((sec, nsec))
}
