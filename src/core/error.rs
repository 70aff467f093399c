// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for vidimu.
//!
//! The taxonomy follows the stages of a conversion run:
//! - Decoding the recording metadata container
//! - Validating invariants of the decoded data
//! - Writing to downstream sinks
//! - Input-side I/O and configuration problems

use thiserror::Error;

/// Errors that can occur while demultiplexing a recording.
///
/// Every variant is fatal for the run that produced it. Non-fatal conditions
/// such as a frame count mismatch are reported as values (see
/// [`PartialAlignmentWarning`](crate::align::PartialAlignmentWarning)).
#[derive(Debug, Clone, Error)]
pub enum VidimuError {
    /// Malformed or truncated metadata container
    #[error("Decode error in {context}: {message}")]
    Decode {
        /// What was being decoded
        context: String,
        /// Error message
        message: String,
    },

    /// A data invariant does not hold
    #[error("Validation failed for '{invariant}': {detail}")]
    Validation {
        /// The invariant that was violated
        invariant: String,
        /// What was found instead
        detail: String,
    },

    /// Downstream sink failed to persist data
    #[error("{sink} write error: {message}")]
    SinkWrite {
        /// Sink identifier (e.g., "BagWriter", "PngDirectorySink")
        sink: String,
        /// Error message
        message: String,
    },

    /// Input-side I/O failure (opening files, spawning the frame decoder)
    #[error("I/O error in {context}: {message}")]
    Io {
        /// Operation that failed
        context: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration '{key}': {message}")]
    Config {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },
}

impl VidimuError {
    /// Create a decode error.
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        VidimuError::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(invariant: impl Into<String>, detail: impl Into<String>) -> Self {
        VidimuError::Validation {
            invariant: invariant.into(),
            detail: detail.into(),
        }
    }

    /// Create a sink write error.
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        VidimuError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create an input I/O error.
    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        VidimuError::Io {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        VidimuError::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a downstream sink.
    pub fn is_sink_error(&self) -> bool {
        matches!(self, VidimuError::SinkWrite { .. })
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            VidimuError::Decode { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            VidimuError::Validation { invariant, detail } => {
                vec![("invariant", invariant.clone()), ("detail", detail.clone())]
            }
            VidimuError::SinkWrite { sink, message } => {
                vec![("sink", sink.clone()), ("message", message.clone())]
            }
            VidimuError::Io { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            VidimuError::Config { key, message } => {
                vec![("key", key.clone()), ("message", message.clone())]
            }
        }
    }
}

impl From<prost::DecodeError> for VidimuError {
    fn from(err: prost::DecodeError) -> Self {
        VidimuError::decode("VideoCaptureData", err.to_string())
    }
}

/// Result type for vidimu operations.
pub type Result<T> = std::result::Result<T, VidimuError>;
