// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the backlight source
//!
//! Backlight readings come from sysfs and every failure mode here is a
//! configuration error: fatal, surfaced to the process boundary, never retried.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading the hardware backlight state
#[derive(Error, Debug)]
pub enum BacklightError {
    /// The sysfs file is missing or unreadable
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sysfs file does not contain a base-10 integer
    #[error("Failed to parse {}: expected an integer, got {value:?}", .path.display())]
    Malformed { path: PathBuf, value: String },

    /// The device reports a maximum brightness of zero
    #[error("{} reports a maximum brightness of 0", .path.display())]
    ZeroMax { path: PathBuf },
}

/// Result type alias for BacklightError
pub type Result<T> = std::result::Result<T, BacklightError>;
