// SPDX-License-Identifier: GPL-3.0-only
//! Hardware backlight readings from sysfs
//!
//! The kernel exposes the authoritative brightness of a backlight device as
//! two small files under `/sys/class/backlight/<device>/`. The level changes
//! behind our back (hardware hotkeys), so both files are re-read on every
//! tick.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BacklightError, Result};

/// File holding the highest level the device supports
const MAX_BRIGHTNESS: &str = "max_brightness";

/// File holding the level currently in effect
const ACTUAL_BRIGHTNESS: &str = "actual_brightness";

/// Reads the two brightness files of one sysfs backlight device.
pub struct BacklightSource {
    max_path: PathBuf,
    actual_path: PathBuf,
}

impl BacklightSource {
    pub fn new(directory: &Path) -> Self {
        Self {
            max_path: directory.join(MAX_BRIGHTNESS),
            actual_path: directory.join(ACTUAL_BRIGHTNESS),
        }
    }

    /// Take a fresh sample of both values.
    ///
    /// A maximum of zero is rejected here so that the factor computation can
    /// never divide by zero.
    pub fn read(&self) -> Result<BacklightReading> {
        let max = read_level(&self.max_path)?;
        if max == 0 {
            return Err(BacklightError::ZeroMax {
                path: self.max_path.clone(),
            });
        }
        let actual = read_level(&self.actual_path)?;
        Ok(BacklightReading { max, actual })
    }
}

/// One sample of the hardware brightness state.
#[derive(Debug, Clone, Copy)]
pub struct BacklightReading {
    pub max: u32,
    pub actual: u32,
}

impl BacklightReading {
    /// Hardware brightness as a fraction of the maximum.
    pub fn factor(&self) -> f64 {
        f64::from(self.actual) / f64::from(self.max)
    }
}

/// Read one newline-padded base-10 integer from a sysfs file.
fn read_level(path: &Path) -> Result<u32> {
    let content = fs::read_to_string(path).map_err(|source| BacklightError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    content.trim().parse().map_err(|_| BacklightError::Malformed {
        path: path.to_path_buf(),
        value: content.trim().to_string(),
    })
}
